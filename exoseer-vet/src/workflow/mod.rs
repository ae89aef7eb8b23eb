//! Analysis workflow
//!
//! The pipeline is a fixed acyclic composition of the stages:
//! 1. Transit fit
//! 2. Refinement → physics validation, concurrently with centroid analysis
//! 3. Uncertainty quantification
//! 4. Ensemble decision
//!
//! Results are assembled into an [`AnalysisReport`]. Stages that fell back to
//! their defaults are listed in `degradations`.

pub mod pipeline;

pub use pipeline::{Pipeline, PipelineConfig};

use crate::types::{
    Candidate, CentroidAnalysis, EnsembleResult, StageDegradation, TransitAnalysis,
    UncertaintyQuantification,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result envelope of a full analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis_id: Uuid,
    pub target_name: String,
    pub timestamp: DateTime<Utc>,
    pub candidate: Candidate,
    pub transit_analysis: TransitAnalysis,
    pub centroid_analysis: CentroidAnalysis,
    pub uncertainty_analysis: UncertaintyQuantification,
    pub ensemble_predictions: EnsembleResult,
    pub degradations: Vec<StageDegradation>,
}

impl AnalysisReport {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Result of the fit → refine → validate chain alone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitReport {
    pub transit_analysis: TransitAnalysis,
    pub degradations: Vec<StageDegradation>,
}
