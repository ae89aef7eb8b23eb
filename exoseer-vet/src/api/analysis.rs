//! Analysis handlers
//!
//! POST /api/analyze/complete runs the full pipeline; POST /api/analyze/transit
//! runs the fit, refinement and physics validation chain only.

use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::targets::default_mission;
use crate::error::{ApiError, ApiResult};
use crate::types::{Candidate, CandidateParameters, LightCurveSeries};
use crate::workflow::{AnalysisReport, TransitReport};
use crate::AppState;

/// POST /api/analyze/complete request
#[derive(Debug, Deserialize)]
pub struct CompleteAnalysisRequest {
    pub target_name: String,
    /// Candidate metadata; looked up in the catalog when absent
    #[serde(default)]
    pub candidate: Option<Candidate>,
    /// Inline series; fetched from the photometry service when absent
    #[serde(default)]
    pub light_curve: Option<LightCurveSeries>,
    #[serde(default = "default_mission")]
    pub mission: String,
    #[serde(default)]
    pub sector: Option<u32>,
}

/// POST /api/analyze/transit request
#[derive(Debug, Deserialize)]
pub struct TransitAnalysisRequest {
    pub target_name: String,
    #[serde(alias = "light_curve_data")]
    pub light_curve: LightCurveSeries,
    #[serde(default)]
    pub candidate_params: CandidateParameters,
}

/// POST /api/analyze/transit response
#[derive(Debug, Serialize)]
pub struct TransitAnalysisResponse {
    pub target_name: String,
    #[serde(flatten)]
    pub report: TransitReport,
    pub timestamp: DateTime<Utc>,
}

/// Attach the request's target name to an inline series that lacks one
fn inline_series(mut series: LightCurveSeries, target_name: &str) -> LightCurveSeries {
    if series.target_name.is_empty() {
        series.target_name = target_name.to_string();
    }
    series.length = series.time.len();
    series
}

/// POST /api/analyze/complete
pub async fn analyze_complete(
    State(state): State<AppState>,
    Json(request): Json<CompleteAnalysisRequest>,
) -> ApiResult<Json<AnalysisReport>> {
    let target_name = request.target_name.trim().to_string();
    if target_name.is_empty() {
        return Err(ApiError::BadRequest("target_name must not be empty".to_string()));
    }

    let candidate = match request.candidate {
        Some(candidate) => candidate,
        None => state
            .catalog
            .search(&target_name)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ApiError::NotFound(format!("No candidates found for {}", target_name))
            })?,
    };

    let series = match request.light_curve {
        Some(series) => inline_series(series, &target_name),
        None => state
            .photometry
            .fetch(&target_name, &request.mission, request.sector)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "No {} light curve for {}",
                    request.mission, target_name
                ))
            })?,
    };

    info!(
        target_name = %target_name,
        candidate = %candidate.name,
        samples = series.time.len(),
        "Running complete analysis"
    );

    let report = state.pipeline.run(&series, &candidate).await;
    Ok(Json(report))
}

/// POST /api/analyze/transit
pub async fn analyze_transit(
    State(state): State<AppState>,
    Json(request): Json<TransitAnalysisRequest>,
) -> ApiResult<Json<TransitAnalysisResponse>> {
    let series = inline_series(request.light_curve, &request.target_name);
    let report = state
        .pipeline
        .analyze_transit(&series, &request.candidate_params)
        .await;

    Ok(Json(TransitAnalysisResponse {
        target_name: request.target_name,
        report,
        timestamp: Utc::now(),
    }))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analyze/complete", post(analyze_complete))
        .route("/api/analyze/transit", post(analyze_transit))
}
