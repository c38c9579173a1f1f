use crate::config::ExecutionStrategy;
use crate::data::PriceSource;
use crate::error::OptimizerError;
use crate::portfolio::{self, OptimizationReport};
use crate::simulation::SimulationParams;
use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Portfolio Optimization</title></head>
<body>
<h1>Portfolio Optimization</h1>
<p>POST <code>/api/optimize</code> with JSON <code>{"rf_rate": 0.0, "num_port": 5000, "seed": 42}</code>.</p>
<p>The response contains the maximum risk-adjusted return portfolio, the minimum risk portfolio
and every simulated portfolio's risk, return and score for plotting an efficient frontier.</p>
</body>
</html>
"#;

#[derive(Clone)]
struct WebState {
    source: Arc<PriceSource>,
    defaults: SimulationParams,
}

#[derive(Clone, Debug, Serialize)]
struct ApiError {
    error: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct OptimizeRequest {
    rf_rate: Option<f64>,
    num_port: Option<usize>,
    seed: Option<u64>,
}

pub async fn run_webui_server(port: u16, source: PriceSource, defaults: SimulationParams) -> Result<()> {
    let app = router(WebState {
        source: Arc::new(source),
        defaults,
    });

    let addr = format!("0.0.0.0:{}", port);
    info!("WebUI listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/optimize", post(optimize))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

async fn optimize(
    State(state): State<WebState>,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<OptimizationReport>, (StatusCode, Json<ApiError>)> {
    let params = SimulationParams {
        trial_count: req.num_port.unwrap_or(state.defaults.trial_count),
        risk_free_rate: req.rf_rate.unwrap_or(state.defaults.risk_free_rate),
        seed: req.seed.unwrap_or(state.defaults.seed),
        execution: ExecutionStrategy::Auto,
        ..state.defaults
    };

    let report = portfolio::run_portfolio_optimization(&state.source, params)
        .await
        .map_err(optimization_err)?;

    Ok(Json(report))
}

fn api_err(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: message.to_string(),
        }),
    )
}

fn optimization_err(err: anyhow::Error) -> (StatusCode, Json<ApiError>) {
    let status = match err.downcast_ref::<OptimizerError>() {
        Some(OptimizerError::InvalidParameter(_)) => StatusCode::BAD_REQUEST,
        Some(OptimizerError::InsufficientData { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!("Optimization request failed: {}", err);
    api_err(status, &format!("Error during optimization: {}", err))
}
