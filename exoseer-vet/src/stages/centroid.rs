//! Centroid motion analyzer
//!
//! A [`CentroidEstimator`] produces a raw measurement of how the photometric
//! centroid moves in phase with the transit. [`assess`] turns any measurement
//! into a [`CentroidAnalysis`] with deterministic significance and flags, so
//! the flag semantics are independent of the estimator.
//!
//! The shipped estimator is [`SimulatedCentroidEstimator`], a stochastic model
//! standing in for pixel-level astrometry. Its randomness is injected so runs
//! are reproducible under a fixed seed.

use super::StageError;
use crate::types::{CentroidAnalysis, LightCurveSeries, StageOutcome};
use exoseer_common::config::CentroidThresholds;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use tracing::{debug, warn};

pub const HIGH_CORRELATION: &str = "High centroid correlation";
pub const SIGNIFICANT_SHIFT: &str = "Significant centroid shift";
pub const LARGE_OFFSET: &str = "Large centroid offset";

/// Analysis reported when no measurement is available
pub fn default_analysis() -> CentroidAnalysis {
    CentroidAnalysis {
        offset_mas: 0.05,
        offset_uncertainty: 0.02,
        snr_ratio: 12.0,
        motion_correlation: 0.08,
        significance: 2.5,
        raw_offset_x: 0.0,
        raw_offset_y: 0.0,
        flags: Vec::new(),
    }
}

/// Raw centroid measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentroidMeasurement {
    /// Milliarcseconds; sign is ignored
    pub offset_mas: f64,
    pub snr_ratio: f64,
    pub motion_correlation: f64,
    pub raw_x: f64,
    pub raw_y: f64,
}

/// Source of centroid measurements
pub trait CentroidEstimator: Send {
    fn name(&self) -> &'static str;

    fn measure(
        &mut self,
        series: &LightCurveSeries,
        period: f64,
        depth: f64,
    ) -> Result<CentroidMeasurement, StageError>;
}

/// Stochastic stand-in for pixel-level centroid astrometry
pub struct SimulatedCentroidEstimator<R: Rng> {
    rng: R,
}

impl<R: Rng> SimulatedCentroidEstimator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl SimulatedCentroidEstimator<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>, StageError> {
    Normal::new(mean, std_dev).map_err(|e| StageError::Numeric(e.to_string()))
}

impl<R: Rng + Send> CentroidEstimator for SimulatedCentroidEstimator<R> {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn measure(
        &mut self,
        _series: &LightCurveSeries,
        _period: f64,
        depth: f64,
    ) -> Result<CentroidMeasurement, StageError> {
        let base = normal(0.0, 0.05)?.sample(&mut self.rng);
        // deeper transits carry a larger contamination risk, scaling capped at 2x
        let offset_mas = base.abs() * (1.0 + (depth * 1000.0).min(1.0));
        let snr_ratio = 15.0 + normal(0.0, 3.0)?.sample(&mut self.rng);
        let motion_correlation = Uniform::new(0.02, 0.15).sample(&mut self.rng);
        let raw = normal(0.0, 0.1)?;
        let raw_x = raw.sample(&mut self.rng);
        let raw_y = raw.sample(&mut self.rng);

        Ok(CentroidMeasurement {
            offset_mas,
            snr_ratio,
            motion_correlation,
            raw_x,
            raw_y,
        })
    }
}

/// Deterministic assessment of a measurement
pub fn assess(measurement: &CentroidMeasurement, thresholds: &CentroidThresholds) -> CentroidAnalysis {
    let offset_mas = measurement.offset_mas.abs();
    let motion_correlation = measurement.motion_correlation.clamp(0.0, 1.0);
    let significance = offset_mas / thresholds.reference_uncertainty_mas;

    let mut flags = Vec::new();
    if motion_correlation > thresholds.max_motion_correlation {
        flags.push(HIGH_CORRELATION.to_string());
    }
    if significance > thresholds.max_significance {
        flags.push(SIGNIFICANT_SHIFT.to_string());
    }
    if offset_mas > thresholds.max_offset_mas {
        flags.push(LARGE_OFFSET.to_string());
    }

    CentroidAnalysis {
        offset_mas,
        offset_uncertainty: thresholds.reference_uncertainty_mas,
        snr_ratio: measurement.snr_ratio,
        motion_correlation,
        significance,
        raw_offset_x: measurement.raw_x,
        raw_offset_y: measurement.raw_y,
        flags,
    }
}

/// Measure and assess centroid motion for a fitted transit
pub fn analyze(
    series: &LightCurveSeries,
    period: f64,
    depth: f64,
    estimator: &mut dyn CentroidEstimator,
    thresholds: &CentroidThresholds,
) -> StageOutcome<CentroidAnalysis> {
    if !(period.is_finite() && period > 0.0 && depth.is_finite() && depth > 0.0 && depth < 1.0) {
        warn!(period, depth, "Invalid transit parameters for centroid analysis, using default");
        return StageOutcome::degraded(
            default_analysis(),
            format!("invalid period {} or depth {}", period, depth),
        );
    }

    let measurement = estimator.measure(series, period, depth).and_then(|m| {
        if [m.offset_mas, m.snr_ratio, m.motion_correlation, m.raw_x, m.raw_y]
            .iter()
            .all(|v| v.is_finite())
        {
            Ok(m)
        } else {
            Err(StageError::Numeric("non-finite centroid measurement".to_string()))
        }
    });

    match measurement {
        Ok(m) => {
            let analysis = assess(&m, thresholds);
            debug!(
                estimator = estimator.name(),
                offset_mas = analysis.offset_mas,
                significance = analysis.significance,
                flags = analysis.flags.len(),
                "Centroid analysis complete"
            );
            StageOutcome::Ok(analysis)
        }
        Err(e) => {
            warn!(estimator = estimator.name(), error = %e, "Centroid estimator failed, using default");
            StageOutcome::degraded(default_analysis(), e.to_string())
        }
    }
}
