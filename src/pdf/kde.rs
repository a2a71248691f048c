//! Gaussian kernel density estimate over a pseudo-resampled sample.
//!
//! Each value is given an integer multiplicity `round(100 · probability)`
//! (ties to even) and the pooled sample is smoothed with a Gaussian kernel
//! using Scott's bandwidth `h = σ · n^(-1/5)`, where `σ` is the sample
//! standard deviation (`n - 1` normalisation) of the pooled sample.
//!
//! The pooled sample is never materialised: multiplicities act as integer
//! weights, which gives the same estimate.

use std::f64::consts::PI;

use crate::error::FitError;
use crate::pdf::DensityPoint;

/// Multiplicity given to a probability of 1.
pub const PROBABILITY_RESOLUTION: f64 = 100.0;

/// Gaussian kernel density estimate on integer-weighted centres.
#[derive(Debug, Clone)]
pub struct GaussianKde {
    centers: Vec<f64>,
    counts: Vec<f64>,
    norm: f64,
    inv_bandwidth: f64,
}

impl GaussianKde {
    /// Build the estimate, or `None` when the pooled sample has fewer than two
    /// points or zero variance (singular kernel covariance).
    pub fn from_counts(samples: &[(f64, u64)]) -> Option<Self> {
        let n: f64 = samples.iter().map(|&(_, k)| k as f64).sum();
        if n < 2.0 {
            return None;
        }

        let mean = samples.iter().map(|&(v, k)| k as f64 * v).sum::<f64>() / n;
        let variance = samples
            .iter()
            .map(|&(v, k)| k as f64 * (v - mean) * (v - mean))
            .sum::<f64>()
            / (n - 1.0);
        if !(variance.is_finite() && variance > 0.0) {
            return None;
        }

        let bandwidth = variance.sqrt() * n.powf(-0.2);
        Some(Self {
            centers: samples.iter().map(|&(v, _)| v).collect(),
            counts: samples.iter().map(|&(_, k)| k as f64).collect(),
            norm: n * bandwidth * (2.0 * PI).sqrt(),
            inv_bandwidth: 1.0 / bandwidth,
        })
    }

    pub fn bandwidth(&self) -> f64 {
        1.0 / self.inv_bandwidth
    }

    pub fn density(&self, x: f64) -> f64 {
        let sum: f64 = self
            .centers
            .iter()
            .zip(&self.counts)
            .map(|(c, k)| {
                let z = (x - c) * self.inv_bandwidth;
                k * (-0.5 * z * z).exp()
            })
            .sum();
        sum / self.norm
    }
}

/// Kernel-density PDF of `values` weighted by `probabilities`, evaluated on
/// `grid_points` linearly spaced points spanning `[min(values), max(values)]`.
///
/// Returns `Ok(None)` when the estimate cannot be computed.
pub fn kde_pdf(
    values: &[f64],
    probabilities: &[f64],
    grid_points: usize,
) -> Result<Option<Vec<DensityPoint>>, FitError> {
    if values.len() != probabilities.len() {
        return Err(FitError::shape("PDF values and probabilities", values.len(), probabilities.len()));
    }
    if grid_points < 2 {
        return Err(FitError::InvalidArgument("KDE grid needs at least 2 points".to_string()));
    }

    let samples: Vec<(f64, u64)> = values
        .iter()
        .zip(probabilities)
        .filter(|(v, _)| v.is_finite())
        .filter_map(|(&v, &p)| {
            let k = (PROBABILITY_RESOLUTION * p).round_ties_even();
            (k >= 1.0).then_some((v, k as u64))
        })
        .collect();

    let Some(kde) = GaussianKde::from_counts(&samples) else {
        return Ok(None);
    };

    let (lo, hi) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    let step = (hi - lo) / (grid_points - 1) as f64;
    let points = (0..grid_points)
        .map(|i| {
            let x = if i + 1 == grid_points { hi } else { lo + step * i as f64 };
            DensityPoint {
                value: x,
                density: kde.density(x),
            }
        })
        .collect();

    Ok(Some(points))
}
