//! Ensemble decision engine
//!
//! Fuses all stage outputs into a verdict. The qualitative layer (decision,
//! confidence label, evidence lists) comes from the advisor or a conservative
//! default; the quantitative overlay is always computed deterministically from
//! the validation score and the transit SNR.

use crate::advisor::decode::{check_unit, Validate};
use crate::advisor::{prompts, AdvisorSession};
use crate::stages::uncertainty::STANDARD_ANALYSIS;
use crate::types::{
    Candidate, CentroidAnalysis, ConfidenceLevel, Decision, EnsembleResult, StageOutcome,
    TransitAnalysis, UncertaintyQuantification, ValidationMetrics,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Validation score assumed when the upstream score is unusable
const NEUTRAL_VALIDATION_SCORE: f64 = 0.5;

/// Upstream stage outputs consumed by the ensemble
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EnsembleInputs<'a> {
    pub transit_analysis: &'a TransitAnalysis,
    pub centroid_analysis: &'a CentroidAnalysis,
    pub uncertainty_analysis: &'a UncertaintyQuantification,
}

/// Advisor classification reply
#[derive(Debug, Deserialize)]
struct EnsembleReply {
    planet_probability: f64,
    #[serde(default)]
    false_positive_probability: Option<f64>,
    #[serde(alias = "decision_recommendation")]
    decision: Decision,
    confidence_level: ConfidenceLevel,
    #[serde(default)]
    key_evidence: Vec<String>,
    #[serde(default)]
    concerns: Vec<String>,
    #[serde(default)]
    follow_up_recommendations: Vec<String>,
}

impl Validate for EnsembleReply {
    fn validate(&self) -> Result<(), String> {
        check_unit("planet_probability", self.planet_probability)?;
        if let Some(fpp) = self.false_positive_probability {
            check_unit("false_positive_probability", fpp)?;
        }
        Ok(())
    }
}

/// Deterministic numeric overlay
pub fn quantitative_overlay(validation_score: f64, snr: f64) -> ValidationMetrics {
    let validation_score = if validation_score.is_finite() {
        validation_score.clamp(0.0, 1.0)
    } else {
        NEUTRAL_VALIDATION_SCORE
    };
    let snr_score = if snr.is_finite() && snr > 0.0 {
        (snr / 10.0).min(1.0)
    } else {
        0.0
    };

    ValidationMetrics {
        snr_score,
        validation_score,
        combined_score: (validation_score + snr_score) / 2.0,
    }
}

/// Physics, centroid and reliability flags raised upstream, in stage order
pub fn upstream_flags(inputs: &EnsembleInputs<'_>) -> Vec<String> {
    let mut flags: Vec<String> = Vec::new();
    let all = inputs
        .transit_analysis
        .physics_validation
        .flags
        .iter()
        .chain(inputs.centroid_analysis.flags.iter())
        .chain(inputs.uncertainty_analysis.reliability_flags.iter());
    for flag in all {
        if flag != STANDARD_ANALYSIS && !flags.contains(flag) {
            flags.push(flag.clone());
        }
    }
    flags
}

/// Verdict used when no qualitative assessment is available
pub fn default_assessment(upstream: Vec<String>, metrics: ValidationMetrics) -> EnsembleResult {
    let mut concerns = vec!["Requires additional validation".to_string()];
    concerns.extend(upstream);

    EnsembleResult {
        planet_probability: 0.65,
        false_positive_probability: 0.35,
        decision: Decision::Candidate,
        confidence_level: ConfidenceLevel::Medium,
        key_evidence: vec![
            "Transit detection".to_string(),
            "Reasonable parameters".to_string(),
        ],
        concerns,
        follow_up_recommendations: vec!["Obtain additional observations".to_string()],
        overall_confidence: metrics.combined_score,
        validation_metrics: metrics,
    }
}

/// Apply the advisor verdict, never confirming over upstream flags
fn reconcile(reply: EnsembleReply, upstream: Vec<String>, metrics: ValidationMetrics) -> EnsembleResult {
    let mut decision = reply.decision;
    let mut concerns = reply.concerns;

    if !upstream.is_empty() {
        if decision == Decision::Confirm {
            debug!(flags = upstream.len(), "Downgrading confirm to candidate over upstream flags");
            decision = Decision::Candidate;
        }
        for flag in upstream {
            if !concerns.contains(&flag) {
                concerns.push(flag);
            }
        }
    }

    EnsembleResult {
        planet_probability: reply.planet_probability,
        false_positive_probability: reply
            .false_positive_probability
            .unwrap_or(1.0 - reply.planet_probability),
        decision,
        confidence_level: reply.confidence_level,
        key_evidence: reply.key_evidence,
        concerns,
        follow_up_recommendations: reply.follow_up_recommendations,
        overall_confidence: metrics.combined_score,
        validation_metrics: metrics,
    }
}

#[derive(Serialize)]
struct CandidateSummary<'a> {
    name: &'a str,
    host_star: &'a str,
    status: &'a str,
    orbital_period: Option<f64>,
    star_temperature: Option<f64>,
    star_radius: Option<f64>,
    star_mass: Option<f64>,
    radius_earth: Option<f64>,
    discovery_method: Option<&'a str>,
}

fn ensemble_prompt(inputs: &EnsembleInputs<'_>, candidate: &Candidate) -> Result<String, String> {
    let analyses = serde_json::to_string_pretty(inputs).map_err(|e| e.to_string())?;
    let summary = CandidateSummary {
        name: &candidate.name,
        host_star: &candidate.host_star,
        status: &candidate.status,
        orbital_period: candidate.parameters.orbital_period,
        star_temperature: candidate.parameters.star_temperature,
        star_radius: candidate.parameters.star_radius,
        star_mass: candidate.parameters.star_mass,
        radius_earth: candidate.radius_earth,
        discovery_method: candidate.parameters.discovery_method.as_deref(),
    };
    let candidate = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    Ok(prompts::ensemble(&analyses, &candidate))
}

/// Decide on a candidate from all upstream outputs
pub async fn decide(
    inputs: &EnsembleInputs<'_>,
    candidate: &Candidate,
    advisor: Option<&AdvisorSession>,
) -> StageOutcome<EnsembleResult> {
    let metrics = quantitative_overlay(
        inputs.uncertainty_analysis.validation_score,
        inputs.transit_analysis.snr,
    );
    let upstream = upstream_flags(inputs);

    let Some(session) = advisor else {
        debug!("No advisor configured, using default assessment");
        return StageOutcome::degraded(
            default_assessment(upstream, metrics),
            "no advisor configured, default assessment",
        );
    };

    let prompt = match ensemble_prompt(inputs, candidate) {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!(error = %e, "Could not serialize analyses for the advisor");
            return StageOutcome::degraded(default_assessment(upstream, metrics), e);
        }
    };

    match session.consult::<EnsembleReply>(prompt).await {
        Ok(reply) => {
            let result = reconcile(reply, upstream, metrics);
            debug!(
                decision = %result.decision,
                planet_probability = result.planet_probability,
                overall_confidence = result.overall_confidence,
                "Ensemble decision complete"
            );
            StageOutcome::Ok(result)
        }
        Err(e) => {
            warn!(advisor = session.name(), error = %e, "Advisor assessment unusable, using default");
            StageOutcome::degraded(default_assessment(upstream, metrics), e.to_string())
        }
    }
}
