//! exoseer-vet library interface
//!
//! Transit vetting pipeline: a numeric transit fit, parameter refinement,
//! physics validation, centroid motion analysis, uncertainty quantification
//! and an ensemble decision, each degrading to a named default on failure.
//! Exposed both as a library and over HTTP.

pub mod advisor;
pub mod api;
pub mod error;
pub mod services;
pub mod stages;
pub mod types;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use services::{CatalogService, ExplanationService, PhotometryService};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use workflow::Pipeline;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub catalog: Arc<dyn CatalogService>,
    pub photometry: Arc<dyn PhotometryService>,
    pub explanation: Arc<ExplanationService>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Explanations share the pipeline's advisor session
    pub fn new(
        pipeline: Pipeline,
        catalog: Arc<dyn CatalogService>,
        photometry: Arc<dyn PhotometryService>,
    ) -> Self {
        let explanation = ExplanationService::new(pipeline.advisor().cloned());
        Self {
            pipeline: Arc::new(pipeline),
            catalog,
            photometry,
            explanation: Arc::new(explanation),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::target_routes())
        .merge(api::analysis_routes())
        .merge(api::explain_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
