//! Parameter refiner
//!
//! Adds uncertainties and derived physical quantities to a coarse fit.
//! Attempts, in order: advisor estimate, physics derivation from standard
//! transit relations, fixed default set.

use super::StageError;
use crate::advisor::decode::{check_non_negative, Validate};
use crate::advisor::{prompts, AdvisorSession};
use crate::types::{
    CandidateParameters, ParameterSource, RefinedParameters, SeriesMeta, StageOutcome, TransitFit,
};
use serde::Deserialize;
use std::f64::consts::PI;
use tracing::{debug, warn};

/// Gravitational constant (cgs)
const G_CGS: f64 = 6.674e-8;
const SOLAR_RADIUS_CM: f64 = 6.957e10;
const SOLAR_MASS_G: f64 = 1.989e33;
const EARTH_RADII_PER_SOLAR_RADIUS: f64 = 109.076;
const SECONDS_PER_DAY: f64 = 86_400.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Refined values used when nothing better is available: a Sun-like host
/// with an Earth-sized planet on a near-central transit
pub fn default_parameters(fit: TransitFit) -> RefinedParameters {
    RefinedParameters {
        fit,
        period_uncertainty: 0.1,
        depth_uncertainty: 0.0001,
        duration_uncertainty: 0.2,
        stellar_density: 1.4,
        planet_radius: 1.2,
        impact_parameter: 0.3,
        orbital_inclination: 89.5,
        source: ParameterSource::Default,
    }
}

/// Advisor refinement reply
#[derive(Debug, Deserialize)]
struct RefinementReply {
    period_uncertainty: f64,
    depth_uncertainty: f64,
    duration_uncertainty: f64,
    stellar_density: f64,
    #[serde(alias = "planet_radius_earth")]
    planet_radius: f64,
    impact_parameter: f64,
    orbital_inclination: f64,
}

impl Validate for RefinementReply {
    fn validate(&self) -> Result<(), String> {
        check_non_negative("period_uncertainty", self.period_uncertainty)?;
        check_non_negative("depth_uncertainty", self.depth_uncertainty)?;
        check_non_negative("duration_uncertainty", self.duration_uncertainty)?;
        check_non_negative("impact_parameter", self.impact_parameter)?;
        if !(self.stellar_density.is_finite() && self.stellar_density > 0.0) {
            return Err(format!("stellar_density = {} must be positive", self.stellar_density));
        }
        if !(self.planet_radius.is_finite() && self.planet_radius > 0.0) {
            return Err(format!("planet_radius = {} must be positive", self.planet_radius));
        }
        if !(self.orbital_inclination.is_finite()
            && (0.0..=180.0).contains(&self.orbital_inclination))
        {
            return Err(format!(
                "orbital_inclination = {} is outside [0, 180]",
                self.orbital_inclination
            ));
        }
        Ok(())
    }
}

impl RefinementReply {
    fn into_parameters(self, fit: TransitFit) -> RefinedParameters {
        RefinedParameters {
            fit,
            period_uncertainty: self.period_uncertainty,
            depth_uncertainty: self.depth_uncertainty,
            duration_uncertainty: self.duration_uncertainty,
            stellar_density: self.stellar_density,
            planet_radius: self.planet_radius,
            impact_parameter: self.impact_parameter,
            orbital_inclination: self.orbital_inclination,
            source: ParameterSource::Advisor,
        }
    }
}

/// Refine a fit
pub async fn refine(
    fit: &TransitFit,
    candidate: &CandidateParameters,
    meta: &SeriesMeta,
    advisor: Option<&AdvisorSession>,
) -> StageOutcome<RefinedParameters> {
    if let Some(session) = advisor {
        let prompt = prompts::refinement(fit, candidate, meta);
        match session.consult::<RefinementReply>(prompt).await {
            Ok(reply) => {
                debug!(advisor = session.name(), "Refinement taken from advisor");
                return StageOutcome::Ok(reply.into_parameters(*fit));
            }
            Err(e) => {
                warn!(advisor = session.name(), error = %e, "Advisor refinement unusable, deriving from physics");
            }
        }
    }

    match derive_physical(fit, candidate, meta) {
        Ok(refined) => StageOutcome::Ok(refined),
        Err(e) => {
            warn!(error = %e, "Parameter refinement failed, using default parameters");
            StageOutcome::degraded(default_parameters(*fit), e.to_string())
        }
    }
}

/// Derive uncertainties and physical quantities from the fit and stellar parameters
pub fn derive_physical(
    fit: &TransitFit,
    candidate: &CandidateParameters,
    meta: &SeriesMeta,
) -> Result<RefinedParameters, StageError> {
    if !fit.is_valid() {
        return Err(StageError::Implausible("fit violates invariants".to_string()));
    }
    if fit.snr <= 0.0 {
        return Err(StageError::Numeric(format!("non-positive snr {}", fit.snr)));
    }

    let star_radius = candidate
        .star_radius
        .filter(|r| r.is_finite() && *r > 0.0)
        .ok_or(StageError::MissingParameter("star_radius"))?;

    let k = fit.depth.sqrt();
    let period_s = fit.period * SECONDS_PER_DAY;
    let period_h = fit.period * HOURS_PER_DAY;

    let stellar_density = match candidate.star_mass.filter(|m| m.is_finite() && *m > 0.0) {
        Some(mass) => {
            let radius_cm = star_radius * SOLAR_RADIUS_CM;
            mass * SOLAR_MASS_G / (4.0 / 3.0 * PI * radius_cm.powi(3))
        }
        None => {
            // central transit: duration fixes a/R*
            let a_over_r = (1.0 + k) * period_h / (PI * fit.duration);
            3.0 * PI * a_over_r.powi(3) / (G_CGS * period_s.powi(2))
        }
    };

    let a_over_r = (G_CGS * stellar_density * period_s.powi(2) / (3.0 * PI)).cbrt();
    let chord = PI * fit.duration * a_over_r / period_h;
    let impact_parameter = ((1.0 + k).powi(2) - chord.powi(2)).max(0.0).sqrt();
    let orbital_inclination = (impact_parameter / a_over_r).acos().to_degrees();
    let planet_radius = k * star_radius * EARTH_RADII_PER_SOLAR_RADIUS;

    let depth_uncertainty = fit.depth / fit.snr;
    let duration_uncertainty = std::f64::consts::SQRT_2 * fit.duration / fit.snr;
    let transits = (meta.baseline / fit.period).floor().max(1.0);
    let period_uncertainty = duration_uncertainty / HOURS_PER_DAY / transits;

    let refined = RefinedParameters {
        fit: *fit,
        period_uncertainty,
        depth_uncertainty,
        duration_uncertainty,
        stellar_density,
        planet_radius,
        impact_parameter,
        orbital_inclination,
        source: ParameterSource::Physics,
    };

    let derived = [
        period_uncertainty,
        depth_uncertainty,
        duration_uncertainty,
        stellar_density,
        planet_radius,
        impact_parameter,
        orbital_inclination,
    ];
    if derived.iter().any(|v| !v.is_finite()) {
        return Err(StageError::Numeric(format!(
            "non-finite derived quantity (a/R*={:.3}, b={:.3})",
            a_over_r, impact_parameter
        )));
    }

    Ok(refined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::ScriptedAdvisor;
    use std::sync::Arc;
    use std::time::Duration;

    fn fit() -> TransitFit {
        TransitFit {
            period: 10.0,
            depth: 0.0001,
            duration: 1.0,
            snr: 10.0,
            chi_squared: 1.2,
        }
    }

    fn meta(baseline: f64) -> SeriesMeta {
        SeriesMeta {
            mission: "TESS".to_string(),
            length: 1000,
            baseline,
        }
    }

    fn sun_like() -> CandidateParameters {
        CandidateParameters {
            star_radius: Some(1.0),
            star_mass: Some(1.0),
            star_temperature: Some(5778.0),
            ..CandidateParameters::default()
        }
    }

    #[tokio::test]
    async fn test_missing_stellar_radius_uses_default() {
        let outcome = refine(&fit(), &CandidateParameters::default(), &meta(27.0), None).await;
        assert!(outcome.is_degraded());
        assert!(outcome.reason().unwrap().contains("star_radius"));
        assert_eq!(outcome.into_value(), default_parameters(fit()));
    }

    #[tokio::test]
    async fn test_physics_derivation_for_sun_like_star() {
        let outcome = refine(&fit(), &sun_like(), &meta(27.0), None).await;
        assert!(!outcome.is_degraded());

        let refined = outcome.into_value();
        assert_eq!(refined.source, ParameterSource::Physics);
        assert!((refined.stellar_density - 1.41).abs() < 0.01);
        assert!((refined.planet_radius - 1.09076).abs() < 1e-6);
        assert!(refined.orbital_inclination > 85.0 && refined.orbital_inclination < 90.0);
        assert!((refined.depth_uncertainty - 1e-5).abs() < 1e-12);
        // two full transits in a 27-day baseline
        let expected = std::f64::consts::SQRT_2 * 1.0 / 10.0 / 24.0 / 2.0;
        assert!((refined.period_uncertainty - expected).abs() < 1e-12);
    }

    #[test]
    fn test_density_from_transit_shape_without_mass() {
        let candidate = CandidateParameters {
            star_radius: Some(1.0),
            ..CandidateParameters::default()
        };
        let refined = derive_physical(&fit(), &candidate, &meta(27.0)).unwrap();
        // central transit by construction
        assert!(refined.impact_parameter < 1e-3);
        assert!(refined.stellar_density > 0.0);
    }

    #[tokio::test]
    async fn test_advisor_reply_preferred() {
        let advisor = ScriptedAdvisor::new().with_reply(
            r#"{"period_uncertainty": 0.002, "depth_uncertainty": 0.00002,
                "duration_uncertainty": 0.1, "stellar_density": 1.2,
                "planet_radius_earth": 2.1, "impact_parameter": 0.4,
                "orbital_inclination": 88.9}"#,
        );
        let session = AdvisorSession::new(Arc::new(advisor), Duration::from_secs(1), 0.3);

        let refined = refine(&fit(), &CandidateParameters::default(), &meta(27.0), Some(&session))
            .await
            .into_value();
        assert_eq!(refined.source, ParameterSource::Advisor);
        assert_eq!(refined.planet_radius, 2.1);
    }

    #[tokio::test]
    async fn test_implausible_advisor_reply_falls_through_to_physics() {
        let advisor = ScriptedAdvisor::new().with_reply(
            r#"{"period_uncertainty": 0.002, "depth_uncertainty": 0.00002,
                "duration_uncertainty": 0.1, "stellar_density": -1.0,
                "planet_radius": 2.1, "impact_parameter": 0.4,
                "orbital_inclination": 88.9}"#,
        );
        let session = AdvisorSession::new(Arc::new(advisor), Duration::from_secs(1), 0.3);

        let refined = refine(&fit(), &sun_like(), &meta(27.0), Some(&session))
            .await
            .into_value();
        assert_eq!(refined.source, ParameterSource::Physics);
    }
}
