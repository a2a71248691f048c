//! Evenly populated binning.
//!
//! Bin boundaries are the `bins + 1` sample quantiles at linearly spaced
//! fractions `0, 1/bins, ..., 1`. Quantiles use the plotting positions
//! `alphap = betap = 0.4` (approximately unbiased for normal samples), so the
//! first boundary is the minimum and the last one the maximum.
//!
//! Digitisation treats the last boundary as inclusive: the maximum lands in
//! the last bin, never past it.

use crate::error::FitError;

const ALPHAP: f64 = 0.4;
const BETAP: f64 = 0.4;

/// Result of [`bin_evenly`].
#[derive(Debug, Clone, PartialEq)]
pub struct Binning {
    /// `bins + 1` boundaries, non-decreasing.
    pub boundaries: Vec<f64>,
    /// 1-based bin index for each input value.
    pub digits: Vec<usize>,
}

impl Binning {
    pub fn n_bins(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    /// Indices of the values that fall into `bin` (1-based).
    pub fn members(&self, bin: usize) -> impl Iterator<Item = usize> + '_ {
        self.digits
            .iter()
            .enumerate()
            .filter_map(move |(i, &d)| (d == bin).then_some(i))
    }
}

/// Split `values` into `min(max_bins, values.len())` evenly populated bins.
pub fn bin_evenly(values: &[f64], max_bins: usize) -> Result<Binning, FitError> {
    if values.is_empty() {
        return Err(FitError::InvalidArgument("cannot bin an empty value set".to_string()));
    }
    if max_bins == 0 {
        return Err(FitError::InvalidArgument("max_bins must be >= 1".to_string()));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(FitError::InvalidArgument("cannot bin non-finite values".to_string()));
    }

    let bins = max_bins.min(values.len());

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let boundaries: Vec<f64> = (0..=bins)
        .map(|i| quantile_sorted(&sorted, i as f64 / bins as f64))
        .collect();

    // Only the lower edges take part in the search: anything at or above the
    // last lower edge belongs to the last bin.
    let lower_edges = &boundaries[..bins];
    let digits = values
        .iter()
        .map(|&v| lower_edges.partition_point(|&edge| edge <= v))
        .collect();

    Ok(Binning { boundaries, digits })
}

/// Sample quantile of already sorted data with `alphap = betap = 0.4`.
fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let m = ALPHAP + p * (1.0 - ALPHAP - BETAP);
    let aleph = n as f64 * p + m;
    let k = aleph.clamp(1.0, (n - 1) as f64).floor();
    let gamma = (aleph - k).clamp(0.0, 1.0);
    let k = k as usize;
    (1.0 - gamma) * sorted[k - 1] + gamma * sorted[k]
}
