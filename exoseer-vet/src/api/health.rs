//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// Module name ("exoseer-vet")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Advisor model in use, or "disabled"
    pub advisor: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let advisor = state
        .pipeline
        .advisor()
        .map(|session| session.name().to_string())
        .unwrap_or_else(|| "disabled".to_string());

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "exoseer-vet".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        advisor,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
