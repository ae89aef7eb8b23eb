//! Uncertainty quantifier
//!
//! Combines a per-parameter uncertainty estimate (advisor or default) with
//! rule-based reliability flags.

use crate::advisor::decode::{check_non_negative, check_unit, Validate};
use crate::advisor::{prompts, AdvisorSession};
use crate::types::{
    CandidateParameters, CentroidAnalysis, Interval, StageOutcome, TransitAnalysis,
    UncertaintyQuantification,
};
use exoseer_common::config::ReliabilityThresholds;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const LOW_SNR: &str = "Low SNR transit detection";
pub const CENTROID_CORRELATION: &str = "Significant centroid correlation";
pub const DEEP_TRANSIT: &str = "Unusually deep transit";
/// Placeholder flag carried by the default estimate
pub const STANDARD_ANALYSIS: &str = "Standard analysis";

/// Estimate reported when nothing better is available
pub fn default_uncertainty() -> UncertaintyQuantification {
    UncertaintyQuantification {
        parameter_uncertainties: BTreeMap::from([
            ("period".to_string(), 0.1),
            ("depth".to_string(), 0.0001),
            ("duration".to_string(), 0.2),
        ]),
        reliability_flags: vec![STANDARD_ANALYSIS.to_string()],
        confidence_intervals: BTreeMap::from([
            ("period".to_string(), Interval { min: 9.5, max: 10.5 }),
            (
                "depth".to_string(),
                Interval {
                    min: 0.0008,
                    max: 0.0012,
                },
            ),
        ]),
        validation_score: 0.6,
    }
}

/// Advisor uncertainty reply
#[derive(Debug, Deserialize)]
struct UncertaintyReply {
    parameter_uncertainties: BTreeMap<String, f64>,
    #[serde(default)]
    reliability_flags: Vec<String>,
    #[serde(default)]
    confidence_intervals: BTreeMap<String, Interval>,
    validation_score: f64,
}

impl Validate for UncertaintyReply {
    fn validate(&self) -> Result<(), String> {
        for (name, value) in &self.parameter_uncertainties {
            check_non_negative(name, *value)?;
        }
        for (name, interval) in &self.confidence_intervals {
            if !(interval.min.is_finite() && interval.max.is_finite() && interval.min <= interval.max)
            {
                return Err(format!(
                    "interval {} = [{}, {}] is not ordered",
                    name, interval.min, interval.max
                ));
            }
        }
        check_unit("validation_score", self.validation_score)
    }
}

impl From<UncertaintyReply> for UncertaintyQuantification {
    fn from(reply: UncertaintyReply) -> Self {
        Self {
            parameter_uncertainties: reply.parameter_uncertainties,
            reliability_flags: reply.reliability_flags,
            confidence_intervals: reply.confidence_intervals,
            validation_score: reply.validation_score,
        }
    }
}

/// Rule-based reliability flags, or `None` when the inputs cannot be judged
pub fn reliability_flags(
    transit: &TransitAnalysis,
    centroid: &CentroidAnalysis,
    thresholds: &ReliabilityThresholds,
) -> Option<Vec<String>> {
    let (snr, depth, correlation) = (transit.snr, transit.depth, centroid.motion_correlation);
    if ![snr, depth, correlation].iter().all(|v| v.is_finite()) {
        return None;
    }

    let mut flags = Vec::new();
    if snr < thresholds.min_snr {
        flags.push(LOW_SNR.to_string());
    }
    if correlation > thresholds.max_motion_correlation {
        flags.push(CENTROID_CORRELATION.to_string());
    }
    if depth > thresholds.max_depth {
        flags.push(DEEP_TRANSIT.to_string());
    }
    Some(flags)
}

/// Quantify uncertainty for a transit and centroid analysis
pub async fn quantify(
    transit: &TransitAnalysis,
    centroid: &CentroidAnalysis,
    candidate: &CandidateParameters,
    advisor: Option<&AdvisorSession>,
    thresholds: &ReliabilityThresholds,
) -> StageOutcome<UncertaintyQuantification> {
    let Some(rule_flags) = reliability_flags(transit, centroid, thresholds) else {
        warn!(
            snr = transit.snr,
            depth = transit.depth,
            "Non-finite transit or centroid metrics, using default uncertainty"
        );
        return StageOutcome::degraded(
            default_uncertainty(),
            "non-finite snr, depth or motion correlation",
        );
    };

    let (mut estimate, degraded) = match advisor {
        Some(session) => {
            let prompt = prompts::uncertainty(transit, centroid, candidate);
            match session.consult::<UncertaintyReply>(prompt).await {
                Ok(reply) => (UncertaintyQuantification::from(reply), None),
                Err(e) => {
                    warn!(advisor = session.name(), error = %e, "Advisor uncertainty estimate unusable, using default");
                    (default_uncertainty(), Some(e.to_string()))
                }
            }
        }
        None => (
            default_uncertainty(),
            Some("no advisor configured, default uncertainty estimate".to_string()),
        ),
    };

    for flag in rule_flags {
        if !estimate.reliability_flags.contains(&flag) {
            estimate.reliability_flags.push(flag);
        }
    }

    debug!(
        flags = estimate.reliability_flags.len(),
        validation_score = estimate.validation_score,
        "Uncertainty quantification complete"
    );

    match degraded {
        None => StageOutcome::Ok(estimate),
        Some(reason) => StageOutcome::degraded(estimate, reason),
    }
}
