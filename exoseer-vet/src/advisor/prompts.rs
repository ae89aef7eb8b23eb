//! Prompt text for each advisor consultation

use crate::types::{CandidateParameters, CentroidAnalysis, SeriesMeta, TransitAnalysis, TransitFit};

pub const SYSTEM_PROMPT: &str = "You are an expert in exoplanet detection and characterization. \
Answer with a single JSON object and no other text unless asked otherwise.";

fn describe(value: Option<f64>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| format!("{}", v))
}

/// Parameter refinement request
pub fn refinement(fit: &TransitFit, parameters: &CandidateParameters, meta: &SeriesMeta) -> String {
    format!(
        "Refine the parameters of this transit detection.\n\n\
         Initial fit:\n\
         - period: {period} days\n\
         - depth: {depth}\n\
         - duration: {duration} hours\n\
         - SNR: {snr}\n\n\
         Host star:\n\
         - effective temperature: {teff} K\n\
         - radius: {radius} solar radii\n\
         - mass: {mass} solar masses\n\n\
         Light curve: {length} points from {mission} spanning {baseline:.2} days.\n\n\
         Reply with JSON fields: period_uncertainty (days), depth_uncertainty, \
         duration_uncertainty (hours), stellar_density (g/cm^3), planet_radius (Earth radii), \
         impact_parameter, orbital_inclination (degrees).",
        period = fit.period,
        depth = fit.depth,
        duration = fit.duration,
        snr = fit.snr,
        teff = describe(parameters.star_temperature),
        radius = describe(parameters.star_radius),
        mass = describe(parameters.star_mass),
        length = meta.length,
        mission = meta.mission,
        baseline = meta.baseline,
    )
}

/// Uncertainty and reliability assessment request
pub fn uncertainty(
    transit: &TransitAnalysis,
    centroid: &CentroidAnalysis,
    parameters: &CandidateParameters,
) -> String {
    format!(
        "Assess the uncertainty and reliability of this exoplanet detection.\n\n\
         Transit:\n\
         - period: {period} +/- {period_unc} days\n\
         - depth: {depth} +/- {depth_unc}\n\
         - SNR: {snr}\n\
         - physics flags: {physics_flags:?}\n\n\
         Centroid:\n\
         - offset: {offset} mas\n\
         - motion correlation: {correlation}\n\
         - flags: {centroid_flags:?}\n\n\
         Host star radius: {radius} solar radii\n\n\
         Reply with JSON fields: parameter_uncertainties (object of name -> value), \
         reliability_flags (array of strings), confidence_intervals (object of name -> \
         {{\"min\": number, \"max\": number}}), validation_score (0 to 1).",
        period = transit.period,
        period_unc = transit.period_uncertainty,
        depth = transit.depth,
        depth_unc = transit.depth_uncertainty,
        snr = transit.snr,
        physics_flags = transit.physics_validation.flags,
        offset = centroid.offset_mas,
        correlation = centroid.motion_correlation,
        centroid_flags = centroid.flags,
        radius = describe(parameters.star_radius),
    )
}

/// Final classification request; `analyses` and `candidate` are JSON documents
pub fn ensemble(analyses: &str, candidate: &str) -> String {
    format!(
        "Decide whether this exoplanet candidate should be confirmed, kept as a candidate, \
         or rejected as a false positive.\n\n\
         Analyses:\n{analyses}\n\n\
         Candidate:\n{candidate}\n\n\
         Weigh transit signal quality, physical plausibility, centroid motion (background \
         contamination) and the uncertainty assessment.\n\n\
         Reply with JSON fields: planet_probability (0 to 1), false_positive_probability \
         (0 to 1), decision (\"confirm\", \"candidate\" or \"reject\"), confidence_level \
         (\"high\", \"medium\" or \"low\"), key_evidence, concerns, follow_up_recommendations \
         (arrays of strings)."
    )
}

/// Scientific explanation request; `context` is a JSON document
pub fn explanation(question: &str, context: &str, history: &str) -> String {
    format!(
        "Answer this question about exoplanet science in clear, accurate language.\n\n\
         Question: {question}\n\n\
         Context:\n{context}\n\n\
         Recent conversation:\n{history}\n\n\
         Reply with JSON fields: explanation (text), confidence (0 to 1), references, \
         key_equations, observational_notes (arrays of strings)."
    )
}
