//! Histogram-style PDF over evenly populated bins.

use crate::error::FitError;
use crate::math::{bin_evenly, mean, weighted_mean_std};
use crate::pdf::PdfBin;

/// Binned PDF of `values` weighted by `probabilities`.
///
/// The number of bins is `min(max_bins, number of distinct values)`. Each bin
/// carries the sum of its members' probabilities and, as representative value,
/// their probability-weighted mean; a bin with zero mass uses the unweighted
/// mean of all values instead.
///
/// Non-finite values are left out together with their probabilities; when no
/// finite value remains the PDF is `Ok(None)`.
pub fn binned_pdf(
    values: &[f64],
    probabilities: &[f64],
    max_bins: usize,
) -> Result<Option<Vec<PdfBin>>, FitError> {
    if values.len() != probabilities.len() {
        return Err(FitError::shape("PDF values and probabilities", values.len(), probabilities.len()));
    }

    let (values, probabilities): (Vec<f64>, Vec<f64>) = values
        .iter()
        .zip(probabilities)
        .filter(|(v, _)| v.is_finite())
        .map(|(&v, &p)| (v, p))
        .unzip();
    if values.is_empty() {
        return Ok(None);
    }

    let bins = max_bins.min(distinct_count(&values));
    let binning = bin_evenly(&values, bins)?;
    let fallback = mean(&values);

    let pdf = (1..=binning.n_bins())
        .map(|bin| {
            let (bin_values, bin_probs): (Vec<f64>, Vec<f64>) = binning
                .members(bin)
                .map(|i| (values[i], probabilities[i]))
                .unzip();
            let mass: f64 = bin_probs.iter().sum();
            let value = if mass != 0.0 {
                weighted_mean_std(&bin_values, &bin_probs)?.mean
            } else {
                fallback
            };
            Ok(PdfBin {
                bin_start: binning.boundaries[bin - 1],
                bin_end: binning.boundaries[bin],
                value,
                probability: mass,
            })
        })
        .collect::<Result<Vec<_>, FitError>>()?;

    Ok(Some(pdf))
}

fn distinct_count(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_values_collapse_to_one_bin() {
        let values = [3.5; 6];
        let probs = [0.1, 0.2, 0.05, 0.3, 0.0, 0.15];
        let pdf = binned_pdf(&values, &probs, 50).unwrap().unwrap();

        assert_eq!(pdf.len(), 1);
        assert!((pdf[0].value - 3.5).abs() < 1e-12);
        assert_eq!((pdf[0].bin_start, pdf[0].bin_end), (3.5, 3.5));
        assert!((pdf[0].probability - probs.iter().sum::<f64>()).abs() < 1e-12);
    }

    #[test]
    fn mass_is_conserved_and_values_are_weighted() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let probs = [0.0, 0.0, 0.1, 0.3, 0.0, 0.0, 0.2, 0.2, 0.1, 0.1];
        let pdf = binned_pdf(&values, &probs, 5).unwrap().unwrap();

        assert_eq!(pdf.len(), 5);
        let total: f64 = pdf.iter().map(|b| b.probability).sum();
        assert!((total - 1.0).abs() < 1e-12);

        // Bin 2 holds {3, 4} with probabilities {0.1, 0.3}.
        assert!((pdf[1].value - 3.75).abs() < 1e-12);
        assert!((pdf[1].probability - 0.4).abs() < 1e-12);
    }

    #[test]
    fn zero_mass_bin_uses_global_mean() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let probs = [0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let pdf = binned_pdf(&values, &probs, 5).unwrap().unwrap();

        assert_eq!(pdf[0].probability, 0.0);
        assert!((pdf[0].value - 5.5).abs() < 1e-12);
    }

    #[test]
    fn bins_are_contiguous() {
        let values = [0.3, 1.7, 2.2, 0.9, 5.4, 3.3, 4.1, 2.8];
        let probs = [0.125; 8];
        let pdf = binned_pdf(&values, &probs, 4).unwrap().unwrap();
        for pair in pdf.windows(2) {
            assert_eq!(pair[0].bin_end, pair[1].bin_start);
        }
        assert_eq!(pdf[0].bin_start, 0.3);
        assert_eq!(pdf[pdf.len() - 1].bin_end, 5.4);
    }

    #[test]
    fn non_finite_values_are_left_out() {
        let values = [f64::INFINITY, 3.0, 3.0];
        let probs = [0.0, 0.5, 0.5];
        let pdf = binned_pdf(&values, &probs, 50).unwrap().unwrap();
        assert_eq!(pdf.len(), 1);
        assert_eq!(pdf[0].value, 3.0);
        assert!((pdf[0].probability - 1.0).abs() < 1e-12);

        assert_eq!(binned_pdf(&[f64::NAN, f64::INFINITY], &[0.5, 0.5], 5).unwrap(), None);
    }
}
