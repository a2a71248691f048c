//! Probability-weighted mean and standard deviation.

use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Weighted estimate of one quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedEstimate {
    pub mean: f64,
    pub std: f64,
}

/// Weighted mean and (biased) standard deviation.
///
/// ```text
/// mean = Σ w·v / Σ w
/// std  = sqrt(Σ w·(v - mean)² / Σ w)
/// ```
///
/// Returns [`FitError::ZeroTotalWeight`] when the weights sum to zero; callers
/// are expected to check the total weight first and report the condition.
pub fn weighted_mean_std(values: &[f64], weights: &[f64]) -> Result<WeightedEstimate, FitError> {
    if values.len() != weights.len() {
        return Err(FitError::shape("values and weights", values.len(), weights.len()));
    }

    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return Err(FitError::ZeroTotalWeight);
    }

    let mean = values.iter().zip(weights).map(|(v, w)| w * v).sum::<f64>() / total;
    let variance = values
        .iter()
        .zip(weights)
        .map(|(v, w)| w * (v - mean) * (v - mean))
        .sum::<f64>()
        / total;

    Ok(WeightedEstimate {
        mean,
        std: variance.sqrt(),
    })
}

/// Unweighted arithmetic mean (`NaN` for an empty slice).
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
