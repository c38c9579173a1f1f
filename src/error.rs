use thiserror::Error;

/// Errors raised by the optimization core.
///
/// Glue code (loading, CLI, web) wraps these in `anyhow::Error`; the core itself
/// never retries or swallows them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizerError {
    #[error("Insufficient data: need at least 2 price rows and 1 asset, got {rows} rows and {assets} assets")]
    InsufficientData { rows: usize, assets: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Numerical instability: portfolio variance {variance:e} is negative beyond tolerance or not finite")]
    NumericalInstability { variance: f64 },

    #[error("Cannot select optimal portfolios from an empty result set")]
    EmptyResultSet,
}

pub type Result<T> = std::result::Result<T, OptimizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = OptimizerError::InsufficientData { rows: 1, assets: 3 };
        assert!(err.to_string().contains("1 rows"));

        let err = OptimizerError::InvalidParameter("trial count 999".to_string());
        assert_eq!(err.to_string(), "Invalid parameter: trial count 999");

        let err = OptimizerError::EmptyResultSet;
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_core_error_converts_into_anyhow() {
        fn failing() -> anyhow::Result<()> {
            Err(OptimizerError::NumericalInstability { variance: -1.0 })?;
            Ok(())
        }
        let err = failing().unwrap_err();
        assert!(err.downcast_ref::<OptimizerError>().is_some());
    }
}
