//! Target lookup and light curve retrieval handlers
//!
//! POST /api/targets/search, GET /api/targets/:name/details,
//! GET /api/lightcurves/:name

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::types::{Candidate, LightCurveSeries};
use crate::AppState;

/// Maximum candidates returned by a search; `total_found` counts all matches
const SEARCH_RESULT_LIMIT: usize = 20;

/// POST /api/targets/search request
#[derive(Debug, Deserialize)]
pub struct TargetSearchRequest {
    pub target_name: String,
    #[serde(default = "default_search_type")]
    pub search_type: String,
}

fn default_search_type() -> String {
    "name".to_string()
}

/// POST /api/targets/search response
#[derive(Debug, Serialize)]
pub struct TargetSearchResponse {
    pub target_name: String,
    pub candidates: Vec<Candidate>,
    pub total_found: usize,
    pub search_type: String,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/targets/:name/details response
#[derive(Debug, Serialize)]
pub struct TargetDetailsResponse {
    pub target_name: String,
    pub details: Candidate,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/lightcurves/:name query
#[derive(Debug, Deserialize)]
pub struct LightCurveQuery {
    #[serde(default = "default_mission")]
    pub mission: String,
    pub sector: Option<u32>,
}

pub(crate) fn default_mission() -> String {
    "TESS".to_string()
}

/// GET /api/lightcurves/:name response
#[derive(Debug, Serialize)]
pub struct LightCurveResponse {
    pub target_name: String,
    pub mission: String,
    pub sector: Option<u32>,
    pub light_curve: LightCurveSeries,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/targets/search
pub async fn search_targets(
    State(state): State<AppState>,
    Json(request): Json<TargetSearchRequest>,
) -> ApiResult<Json<TargetSearchResponse>> {
    let target_name = request.target_name.trim();
    if target_name.is_empty() {
        return Err(ApiError::BadRequest("target_name must not be empty".to_string()));
    }

    let mut candidates = state.catalog.search(target_name).await?;
    let total_found = candidates.len();
    candidates.truncate(SEARCH_RESULT_LIMIT);
    info!(target_name = %target_name, found = total_found, "Target search complete");

    Ok(Json(TargetSearchResponse {
        target_name: request.target_name.clone(),
        total_found,
        candidates,
        search_type: request.search_type,
        timestamp: Utc::now(),
    }))
}

/// GET /api/targets/:name/details
pub async fn target_details(
    State(state): State<AppState>,
    Path(target_name): Path<String>,
) -> ApiResult<Json<TargetDetailsResponse>> {
    let details = state.catalog.details(&target_name).await?;

    Ok(Json(TargetDetailsResponse {
        target_name,
        details,
        timestamp: Utc::now(),
    }))
}

/// GET /api/lightcurves/:name?mission=TESS&sector=
pub async fn light_curve(
    State(state): State<AppState>,
    Path(target_name): Path<String>,
    Query(query): Query<LightCurveQuery>,
) -> ApiResult<Json<LightCurveResponse>> {
    let light_curve = state
        .photometry
        .fetch(&target_name, &query.mission, query.sector)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No {} light curve for {}",
                query.mission, target_name
            ))
        })?;

    Ok(Json(LightCurveResponse {
        target_name,
        mission: query.mission,
        sector: query.sector,
        light_curve,
        timestamp: Utc::now(),
    }))
}

/// Build target and light curve routes
pub fn target_routes() -> Router<AppState> {
    Router::new()
        .route("/api/targets/search", post(search_targets))
        .route("/api/targets/:name/details", get(target_details))
        .route("/api/lightcurves/:name", get(light_curve))
}
