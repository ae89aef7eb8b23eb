//! Event types for pipeline progress reporting

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Analysis stages in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    TransitFit,
    Refinement,
    PhysicsValidation,
    CentroidMotion,
    UncertaintyQuantification,
    EnsembleDecision,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::TransitFit => "transit_fit",
            Stage::Refinement => "refinement",
            Stage::PhysicsValidation => "physics_validation",
            Stage::CentroidMotion => "centroid_motion",
            Stage::UncertaintyQuantification => "uncertainty_quantification",
            Stage::EnsembleDecision => "ensemble_decision",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline progress events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Analysis accepted and started
    AnalysisStarted {
        analysis_id: Uuid,
        target_name: String,
        sample_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A stage returned (possibly with its default payload)
    StageCompleted {
        analysis_id: Uuid,
        stage: Stage,
        degraded: bool,
        reason: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Final verdict assembled
    AnalysisCompleted {
        analysis_id: Uuid,
        decision: String,
        overall_confidence: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PipelineEvent {
    pub fn analysis_id(&self) -> Uuid {
        match self {
            PipelineEvent::AnalysisStarted { analysis_id, .. }
            | PipelineEvent::StageCompleted { analysis_id, .. }
            | PipelineEvent::AnalysisCompleted { analysis_id, .. } => *analysis_id,
        }
    }
}
