//! Analysis stages
//!
//! Each stage is a function from typed inputs to a [`StageOutcome`]. Stages
//! never fail: internal errors are logged and replaced by the stage's named
//! default, marked `Degraded` with the reason.
//!
//! [`StageOutcome`]: crate::types::StageOutcome

pub mod centroid;
pub mod ensemble;
pub mod physics_validator;
pub mod refiner;
pub mod transit_fitter;
pub mod uncertainty;

use crate::advisor::ConsultError;
use thiserror::Error;

/// Internal stage failure, converted into a degraded outcome at the stage boundary
#[derive(Debug, Error)]
pub enum StageError {
    #[error("malformed light curve: {0}")]
    MalformedSeries(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("numeric failure: {0}")]
    Numeric(String),

    #[error("implausible result: {0}")]
    Implausible(String),

    #[error(transparent)]
    Consult(#[from] ConsultError),
}

/// Population mean and standard deviation
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}
