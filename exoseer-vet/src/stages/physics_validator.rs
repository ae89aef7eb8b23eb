//! Physics constraint validator
//!
//! Checks refined parameters against plausibility bounds. Every rule is
//! evaluated; flags accumulate in rule order and the confidence is a step
//! function of the flag count.

use crate::types::{PhysicsValidation, RefinedParameters, StageOutcome};
use exoseer_common::config::PhysicsThresholds;
use tracing::{debug, warn};

pub const UNUSUAL_DENSITY: &str = "Unusual stellar density";
pub const LARGE_PLANET: &str = "Implausibly large planet";
pub const SMALL_PLANET: &str = "Implausibly small planet";
pub const UNUSUAL_INCLINATION: &str = "Unusual orbital inclination";
pub const INCOMPLETE: &str = "Physics validation incomplete";

/// Confidence reported when validation could not be completed
const INCOMPLETE_CONFIDENCE: f64 = 0.5;

/// Confidence for a given number of flags
pub fn confidence_for(flag_count: usize, thresholds: &PhysicsThresholds) -> f64 {
    match flag_count {
        0 => thresholds.clean_confidence,
        1 | 2 => thresholds.flagged_confidence,
        _ => thresholds.suspect_confidence,
    }
}

fn incomplete() -> PhysicsValidation {
    PhysicsValidation {
        flags: vec![INCOMPLETE.to_string()],
        overall_confidence: INCOMPLETE_CONFIDENCE,
        physics_score: INCOMPLETE_CONFIDENCE,
    }
}

/// Validate refined parameters
pub fn validate(
    refined: &RefinedParameters,
    thresholds: &PhysicsThresholds,
) -> StageOutcome<PhysicsValidation> {
    let density = refined.stellar_density;
    let radius = refined.planet_radius;
    let inclination = refined.orbital_inclination;

    if ![density, radius, inclination].iter().all(|v| v.is_finite()) {
        warn!(density, radius, inclination, "Non-finite physical parameters, validation incomplete");
        return StageOutcome::degraded(
            incomplete(),
            "non-finite density, radius or inclination",
        );
    }

    let mut flags = Vec::new();

    if density < thresholds.min_stellar_density || density > thresholds.max_stellar_density {
        flags.push(UNUSUAL_DENSITY.to_string());
    }

    if radius > thresholds.max_planet_radius {
        flags.push(LARGE_PLANET.to_string());
    } else if radius < thresholds.min_planet_radius {
        flags.push(SMALL_PLANET.to_string());
    }

    if inclination < thresholds.min_inclination || inclination > thresholds.max_inclination {
        flags.push(UNUSUAL_INCLINATION.to_string());
    }

    let confidence = confidence_for(flags.len(), thresholds);
    debug!(flags = flags.len(), confidence, "Physics validation complete");

    StageOutcome::Ok(PhysicsValidation {
        flags,
        overall_confidence: confidence,
        physics_score: confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::refiner::default_parameters;
    use crate::stages::transit_fitter::FALLBACK_FIT;

    fn refined(density: f64, radius: f64, inclination: f64) -> RefinedParameters {
        RefinedParameters {
            stellar_density: density,
            planet_radius: radius,
            orbital_inclination: inclination,
            ..default_parameters(FALLBACK_FIT)
        }
    }

    fn run(density: f64, radius: f64, inclination: f64) -> PhysicsValidation {
        validate(&refined(density, radius, inclination), &PhysicsThresholds::default()).into_value()
    }

    #[test]
    fn test_default_parameters_are_clean() {
        let result = run(1.4, 1.2, 89.5);
        assert!(result.flags.is_empty());
        assert_eq!(result.overall_confidence, 0.85);
        assert_eq!(result.physics_score, 0.85);
    }

    #[test]
    fn test_radius_flags_are_exclusive() {
        let large = run(1.4, 25.0, 89.5);
        assert_eq!(large.flags, vec![LARGE_PLANET]);

        let small = run(1.4, 0.05, 89.5);
        assert_eq!(small.flags, vec![SMALL_PLANET]);
        assert_eq!(small.overall_confidence, 0.65);
    }

    #[test]
    fn test_confidence_steps_by_flag_count() {
        assert_eq!(run(20.0, 1.2, 60.0).overall_confidence, 0.65);

        let all = run(0.01, 30.0, 120.0);
        assert_eq!(all.flags, vec![UNUSUAL_DENSITY, LARGE_PLANET, UNUSUAL_INCLINATION]);
        assert_eq!(all.overall_confidence, 0.35);
    }

    #[test]
    fn test_confidence_is_monotonic() {
        let t = PhysicsThresholds::default();
        let steps: Vec<f64> = (0..6).map(|n| confidence_for(n, &t)).collect();
        assert!(steps.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_bounds_are_exclusive() {
        for (density, radius, inclination) in [
            (0.1, 1.2, 89.5),
            (10.0, 1.2, 89.5),
            (1.4, 20.0, 89.5),
            (1.4, 0.1, 89.5),
            (1.4, 1.2, 70.0),
            (1.4, 1.2, 110.0),
        ] {
            let result = run(density, radius, inclination);
            assert!(
                result.flags.is_empty(),
                "({}, {}, {}) flagged {:?}",
                density,
                radius,
                inclination,
                result.flags
            );
        }
    }

    #[test]
    fn test_just_past_bounds_flags() {
        assert_eq!(run(0.099, 1.2, 89.5).flags, vec![UNUSUAL_DENSITY]);
        assert_eq!(run(10.001, 1.2, 89.5).flags, vec![UNUSUAL_DENSITY]);
        assert_eq!(run(1.4, 20.001, 89.5).flags, vec![LARGE_PLANET]);
        assert_eq!(run(1.4, 0.099, 89.5).flags, vec![SMALL_PLANET]);
        assert_eq!(run(1.4, 1.2, 69.999).flags, vec![UNUSUAL_INCLINATION]);
        assert_eq!(run(1.4, 1.2, 110.001).flags, vec![UNUSUAL_INCLINATION]);
    }

    #[test]
    fn test_non_finite_values_degrade() {
        let outcome = validate(&refined(f64::NAN, 1.0, 89.0), &PhysicsThresholds::default());
        assert!(outcome.is_degraded());
        let result = outcome.into_value();
        assert_eq!(result.flags, vec![INCOMPLETE]);
        assert_eq!(result.overall_confidence, 0.5);
    }
}
