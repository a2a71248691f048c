//! Observational error pre-processing.
//!
//! Before any comparison, each observation's errors are:
//!
//! 1. repaired where they fall below [`TOLERANCE`] (see [`ZeroErrorPolicy`])
//! 2. combined with a systematic floor:
//!
//! ```text
//! adjusted = sqrt(error² + (flux · systematic_deviation)²)
//! ```
//!
//! The function never mutates its inputs.

use crate::domain::{ErrorAdjustment, TOLERANCE, ZeroErrorPolicy};
use crate::error::FitError;

/// Adjust the errors of one observation.
pub fn adjust_errors(flux: &[f64], error: &[f64], settings: &ErrorAdjustment) -> Result<Vec<f64>, FitError> {
    if flux.len() != error.len() {
        return Err(FitError::shape("flux and error arrays", flux.len(), error.len()));
    }

    let adjusted = flux
        .iter()
        .zip(error)
        .map(|(&f, &e)| {
            let e = if e < TOLERANCE {
                match settings.zero_error_policy {
                    ZeroErrorPolicy::ScaleError => settings.default_error_factor * e,
                    ZeroErrorPolicy::FluxFraction => settings.default_error_factor * f,
                }
            } else {
                e
            };
            let systematic = f * settings.systematic_deviation;
            (e * e + systematic * systematic).sqrt()
        })
        .collect();

    Ok(adjusted)
}
