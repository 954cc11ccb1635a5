//! Route table for the health API

use super::health::{handle_dependency_health, handle_health, handle_liveness};
use crate::AppState;
use axum::{routing::get, Router};

pub const API_PREFIX: &str = "/health-api/v1";

pub fn create_routes() -> Router<AppState> {
    Router::new().nest(
        API_PREFIX,
        Router::new()
            .route("/health", get(handle_health))
            .route("/health/:name", get(handle_dependency_health))
            .route("/live", get(handle_liveness)),
    )
}
