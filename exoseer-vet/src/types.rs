//! Core data model for transit vetting
//!
//! All types are plain value structs created fresh per analysis request and
//! threaded through the stages by the caller. Everything is JSON-serializable
//! so stage outputs can be handed to the explanation service or an HTTP client
//! unchanged.

use exoseer_common::events::Stage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Inputs
// ============================================================================

/// Photometric time series as delivered by the photometry service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightCurveSeries {
    pub time: Vec<f64>,
    pub flux: Vec<f64>,
    #[serde(default)]
    pub flux_err: Option<Vec<f64>>,
    #[serde(default = "unknown_mission")]
    pub mission: String,
    #[serde(default)]
    pub target_name: String,
    #[serde(default)]
    pub sector: Option<u32>,
    #[serde(default)]
    pub quarter: Option<u32>,
    /// Sample count (kept in sync with `time.len()` by the constructors)
    #[serde(default)]
    pub length: usize,
}

fn unknown_mission() -> String {
    "unknown".to_string()
}

/// Summary of a series handed to the refiner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMeta {
    pub mission: String,
    pub length: usize,
    /// Time span covered by the series (time units of the series, days)
    pub baseline: f64,
}

impl LightCurveSeries {
    pub fn new(
        target_name: impl Into<String>,
        mission: impl Into<String>,
        time: Vec<f64>,
        flux: Vec<f64>,
        flux_err: Option<Vec<f64>>,
    ) -> Self {
        let length = time.len();
        Self {
            time,
            flux,
            flux_err,
            mission: mission.into(),
            target_name: target_name.into(),
            sector: None,
            quarter: None,
            length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Describe why the series cannot be analyzed, if it cannot
    pub fn defect(&self) -> Option<String> {
        if self.time.is_empty() {
            return Some("series has no samples".to_string());
        }
        if self.flux.len() != self.time.len() {
            return Some(format!(
                "time has {} samples but flux has {}",
                self.time.len(),
                self.flux.len()
            ));
        }
        if let Some(err) = &self.flux_err {
            if err.len() != self.time.len() {
                return Some(format!(
                    "time has {} samples but flux_err has {}",
                    self.time.len(),
                    err.len()
                ));
            }
        }
        if self.time.iter().chain(self.flux.iter()).any(|v| !v.is_finite()) {
            return Some("series contains non-finite time or flux values".to_string());
        }
        if self.time.windows(2).any(|w| w[1] <= w[0]) {
            return Some("time is not strictly increasing".to_string());
        }
        None
    }

    pub fn is_well_formed(&self) -> bool {
        self.defect().is_none()
    }

    /// Time span between first and last sample
    pub fn baseline(&self) -> f64 {
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) if last > first => last - first,
            _ => 0.0,
        }
    }

    pub fn meta(&self) -> SeriesMeta {
        SeriesMeta {
            mission: self.mission.clone(),
            length: self.time.len(),
            baseline: self.baseline(),
        }
    }

    /// Drop non-finite samples, clip flux outliers beyond `sigma` standard
    /// deviations of the median and normalize flux (and errors) by the median.
    pub fn cleaned(&self, sigma: f64) -> Self {
        let errors = self.flux_err.as_ref();
        let mut samples: Vec<(f64, f64, Option<f64>)> = self
            .time
            .iter()
            .zip(self.flux.iter())
            .enumerate()
            .map(|(i, (t, f))| (*t, *f, errors.and_then(|e| e.get(i).copied())))
            .filter(|(t, f, e)| t.is_finite() && f.is_finite() && e.map_or(true, f64::is_finite))
            .collect();

        let fluxes: Vec<f64> = samples.iter().map(|s| s.1).collect();
        let center = median(&fluxes);
        let spread = std_about(&fluxes, center);
        if spread > 0.0 && sigma > 0.0 {
            samples.retain(|(_, f, _)| (f - center).abs() <= sigma * spread);
        }

        let scale = if center.is_finite() && center != 0.0 { center } else { 1.0 };
        let has_errors = errors.is_some();

        let time: Vec<f64> = samples.iter().map(|s| s.0).collect();
        let flux = samples.iter().map(|s| s.1 / scale).collect();
        let flux_err = has_errors.then(|| {
            samples
                .iter()
                .map(|s| s.2.unwrap_or(0.0) / scale.abs())
                .collect()
        });

        Self {
            length: time.len(),
            time,
            flux,
            flux_err,
            mission: self.mission.clone(),
            target_name: self.target_name.clone(),
            sector: self.sector,
            quarter: self.quarter,
        }
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn std_about(values: &[f64], center: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - center).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Known or assumed physical attributes of a target; every field may be absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateParameters {
    /// Orbital period (days)
    #[serde(default)]
    pub orbital_period: Option<f64>,
    /// Effective temperature (K)
    #[serde(default)]
    pub star_temperature: Option<f64>,
    /// Stellar radius (solar radii)
    #[serde(default)]
    pub star_radius: Option<f64>,
    /// Stellar mass (solar masses)
    #[serde(default)]
    pub star_mass: Option<f64>,
    #[serde(default)]
    pub discovery_method: Option<String>,
}

/// Catalog entry: identity plus candidate parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    #[serde(default)]
    pub host_star: String,
    #[serde(flatten)]
    pub parameters: CandidateParameters,
    #[serde(default)]
    pub discovery_year: Option<i32>,
    #[serde(default)]
    pub radius_earth: Option<f64>,
    #[serde(default)]
    pub mass_earth: Option<f64>,
    #[serde(default)]
    pub semi_major_axis: Option<f64>,
    #[serde(default)]
    pub transit_depth: Option<f64>,
    #[serde(default)]
    pub ra: Option<f64>,
    #[serde(default)]
    pub dec: Option<f64>,
    #[serde(default)]
    pub tic_id: Option<u64>,
    /// Catalog completeness score (0.0-1.0)
    #[serde(default)]
    pub confidence_score: Option<f64>,
    /// "confirmed" or "candidate"
    #[serde(default = "candidate_status")]
    pub status: String,
}

fn candidate_status() -> String {
    "candidate".to_string()
}

impl Candidate {
    /// Candidate carrying only a name, for series analyzed without catalog data
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            host_star: name.clone(),
            name,
            parameters: CandidateParameters::default(),
            discovery_year: None,
            radius_earth: None,
            mass_earth: None,
            semi_major_axis: None,
            transit_depth: None,
            ra: None,
            dec: None,
            tic_id: None,
            confidence_score: None,
            status: candidate_status(),
        }
    }

    pub fn with_parameters(mut self, parameters: CandidateParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

// ============================================================================
// Stage outputs
// ============================================================================

/// Coarse transit fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitFit {
    /// Orbital period (days)
    pub period: f64,
    /// Fractional flux drop, in (0, 1)
    pub depth: f64,
    /// Transit duration (hours)
    pub duration: f64,
    pub snr: f64,
    pub chi_squared: f64,
}

impl TransitFit {
    /// Check the fit invariants: depth in (0, 1), positive duration and period, finite values
    pub fn is_valid(&self) -> bool {
        [self.period, self.depth, self.duration, self.snr, self.chi_squared]
            .iter()
            .all(|v| v.is_finite())
            && self.period > 0.0
            && self.depth > 0.0
            && self.depth < 1.0
            && self.duration > 0.0
    }
}

/// Where refined parameters came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSource {
    Advisor,
    Physics,
    Default,
}

/// Transit fit plus uncertainties and derived physical quantities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinedParameters {
    #[serde(flatten)]
    pub fit: TransitFit,
    pub period_uncertainty: f64,
    pub depth_uncertainty: f64,
    pub duration_uncertainty: f64,
    /// g/cm³
    pub stellar_density: f64,
    /// Earth radii
    pub planet_radius: f64,
    pub impact_parameter: f64,
    /// Degrees
    pub orbital_inclination: f64,
    pub source: ParameterSource,
}

/// Physics plausibility flags and the derived confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsValidation {
    pub flags: Vec<String>,
    pub overall_confidence: f64,
    pub physics_score: f64,
}

/// Fitter → Refiner → Validator envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitAnalysis {
    pub period: f64,
    pub period_uncertainty: f64,
    pub depth: f64,
    pub depth_uncertainty: f64,
    pub duration: f64,
    pub duration_uncertainty: f64,
    pub snr: f64,
    pub chi_squared: f64,
    pub fitted_parameters: RefinedParameters,
    pub physics_validation: PhysicsValidation,
    pub confidence_score: f64,
}

impl TransitAnalysis {
    pub fn from_stages(refined: RefinedParameters, physics: PhysicsValidation) -> Self {
        Self {
            period: refined.fit.period,
            period_uncertainty: refined.period_uncertainty,
            depth: refined.fit.depth,
            depth_uncertainty: refined.depth_uncertainty,
            duration: refined.fit.duration,
            duration_uncertainty: refined.duration_uncertainty,
            snr: refined.fit.snr,
            chi_squared: refined.fit.chi_squared,
            confidence_score: physics.overall_confidence,
            fitted_parameters: refined,
            physics_validation: physics,
        }
    }
}

/// Centroid motion metrics and flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidAnalysis {
    /// Centroid offset (milliarcseconds, non-negative)
    pub offset_mas: f64,
    pub offset_uncertainty: f64,
    pub snr_ratio: f64,
    /// In [0, 1]
    pub motion_correlation: f64,
    /// Offset in units of the reference uncertainty (sigma)
    #[serde(alias = "centroid_shift_significance")]
    pub significance: f64,
    pub raw_offset_x: f64,
    pub raw_offset_y: f64,
    pub flags: Vec<String>,
}

/// Closed confidence interval for one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

/// Parameter uncertainties, reliability flags and the validation score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyQuantification {
    pub parameter_uncertainties: BTreeMap<String, f64>,
    pub reliability_flags: Vec<String>,
    pub confidence_intervals: BTreeMap<String, Interval>,
    /// In [0, 1]
    pub validation_score: f64,
}

/// Final verdict label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    #[serde(alias = "Confirm", alias = "CONFIRM", alias = "confirmed")]
    Confirm,
    #[serde(alias = "Candidate", alias = "CANDIDATE")]
    Candidate,
    #[serde(alias = "Reject", alias = "REJECT", alias = "rejected")]
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Confirm => "confirm",
            Decision::Candidate => "candidate",
            Decision::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative confidence label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    #[serde(alias = "High", alias = "HIGH")]
    High,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "Low", alias = "LOW")]
    Low,
}

/// Deterministic numeric overlay attached to every ensemble result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub snr_score: f64,
    pub validation_score: f64,
    pub combined_score: f64,
}

/// Fused verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub planet_probability: f64,
    pub false_positive_probability: f64,
    pub decision: Decision,
    pub confidence_level: ConfidenceLevel,
    pub key_evidence: Vec<String>,
    pub concerns: Vec<String>,
    pub follow_up_recommendations: Vec<String>,
    pub overall_confidence: f64,
    pub validation_metrics: ValidationMetrics,
}

// ============================================================================
// Stage outcome
// ============================================================================

/// Result of a stage that never fails
///
/// `Degraded` carries a value built from the stage's named default together
/// with the reason the primary computation was not used.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Ok(T),
    Degraded { value: T, reason: String },
}

impl<T> StageOutcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        StageOutcome::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Ok(value) | StageOutcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            StageOutcome::Ok(value) | StageOutcome::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            StageOutcome::Ok(_) => None,
            StageOutcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutcome<U> {
        match self {
            StageOutcome::Ok(value) => StageOutcome::Ok(f(value)),
            StageOutcome::Degraded { value, reason } => StageOutcome::Degraded {
                value: f(value),
                reason,
            },
        }
    }
}

/// A stage that fell back to its default during an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDegradation {
    pub stage: Stage,
    pub reason: String,
}
