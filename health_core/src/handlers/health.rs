//! Health endpoint handlers

use crate::{
    error::{AppError, Result},
    health::{HealthReport, ProbeContext},
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{info, warn};

/// Aggregated report: 200 when every dependency is healthy, 503 otherwise.
/// The body is the entry list in both cases.
pub async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthReport>> {
    info!("GET /health - Checking {} dependencies", state.aggregator.len());

    let ctx = ProbeContext::with_timeout(state.check_timeout);
    let report = state.aggregator.health_check(&ctx).await.map_err(|e| {
        if let AppError::ServiceUnavailable(report) = &e {
            warn!("System health is unhealthy: {}", report.summary());
        }
        e
    })?;

    Ok(Json(report))
}

pub async fn handle_dependency_health(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    info!("GET /health/{} - Checking single dependency", name);

    let ctx = ProbeContext::with_timeout(state.check_timeout);
    let outcome = state
        .aggregator
        .check_dependency(&ctx, &name)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Dependency '{}' not found", name)))?;

    let status_code = if outcome.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok((status_code, Json(outcome.to_entry())))
}

/// Liveness only; never touches dependencies.
pub async fn handle_liveness(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "service": state.app_name,
            "version": state.version,
            "environment": state.environment,
            "timestamp": chrono::Utc::now().timestamp(),
        })),
    )
}
