//! Test Helper Utilities
//!
//! Shared fixtures for exoseer-vet integration tests

#![allow(dead_code)]

use exoseer_vet::services::{StaticCatalog, StaticPhotometry};
use exoseer_vet::types::{Candidate, CandidateParameters, LightCurveSeries};
use exoseer_vet::workflow::PipelineConfig;

/// Six samples of flat flux with a single 0.1% dip
pub fn six_sample_series() -> LightCurveSeries {
    LightCurveSeries::new(
        "TEST-6",
        "TESS",
        vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
        vec![1.0, 1.0, 1.0, 0.999, 1.0, 1.0],
        None,
    )
}

/// Candidate with only an expected period (no stellar parameters)
pub fn period_only_candidate(name: &str, period: f64) -> Candidate {
    Candidate::named(name).with_parameters(CandidateParameters {
        orbital_period: Some(period),
        ..CandidateParameters::default()
    })
}

/// Candidate around a Sun-like host
pub fn sun_like_candidate(name: &str) -> Candidate {
    Candidate::named(name).with_parameters(CandidateParameters {
        orbital_period: Some(10.0),
        star_temperature: Some(5778.0),
        star_radius: Some(1.0),
        star_mass: Some(1.0),
        discovery_method: Some("Transit".to_string()),
    })
}

/// Pipeline configuration with a fixed centroid seed
pub fn seeded_config(seed: u64) -> PipelineConfig {
    PipelineConfig {
        centroid_seed: Some(seed),
        ..PipelineConfig::default()
    }
}

/// Catalog with two planets around TOI-700 and one Kepler planet
pub fn test_catalog() -> StaticCatalog {
    let mut toi_700_d = period_only_candidate("TOI-700 d", 37.42);
    toi_700_d.host_star = "TOI-700".to_string();
    toi_700_d.status = "confirmed".to_string();

    let mut toi_700_e = period_only_candidate("TOI-700 e", 27.81);
    toi_700_e.host_star = "TOI-700".to_string();

    let mut kepler_22_b = sun_like_candidate("Kepler-22 b");
    kepler_22_b.host_star = "Kepler-22".to_string();

    StaticCatalog::new(vec![toi_700_d, toi_700_e, kepler_22_b])
}

/// Photometry holding the six-sample series under TOI-700 d (TESS)
pub fn test_photometry() -> StaticPhotometry {
    let mut series = six_sample_series();
    series.target_name = "TOI-700 d".to_string();
    StaticPhotometry::new().with_series(series)
}

pub const REFINEMENT_REPLY: &str = r#"{
    "period_uncertainty": 0.002,
    "depth_uncertainty": 0.00005,
    "duration_uncertainty": 0.1,
    "stellar_density": 1.3,
    "planet_radius_earth": 1.1,
    "impact_parameter": 0.2,
    "orbital_inclination": 89.7
}"#;

pub const UNCERTAINTY_REPLY: &str = r#"Here is my assessment:
{
    "parameter_uncertainties": {"period": 0.002, "depth": 0.00005},
    "reliability_flags": [],
    "confidence_intervals": {"period": {"min": 9.99, "max": 10.01}},
    "validation_score": 0.9
}"#;

pub const CONFIRM_REPLY: &str = r#"{
    "planet_probability": 0.92,
    "decision_recommendation": "CONFIRM",
    "confidence_level": "HIGH",
    "key_evidence": ["Consistent transit shape"],
    "concerns": [],
    "follow_up_recommendations": ["Radial velocity follow-up"]
}"#;
