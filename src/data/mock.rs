//! Mock catalogue analysis.
//!
//! The best-fit fluxes of a run are perturbed with Gaussian noise of the
//! adjusted observational errors, the mock catalogue is analysed again, and
//! for every quantity the estimated values (weighted means of the mock run)
//! are regressed against the exact ones (best-fit values of the first run).
//! A good estimator gives a slope close to 1 and an intercept close to 0.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::Serialize;
use tracing::warn;

use crate::domain::{ErrorAdjustment, FilterSet, Observation};
use crate::error::FitError;
use crate::fit::{ObservationAnalysis, prepare_errors};
use crate::math::{LineFit, fit_line};

/// Mock observations built from the best fits of `analyses`.
///
/// Mock `i` keeps the id, redshift and raw errors of observation `i`; its
/// fluxes are the best-fit fluxes plus `N(0, adjusted error)` noise.
pub fn build_mock_catalogue(
    analyses: &[ObservationAnalysis],
    observations: &[Observation],
    filters: &FilterSet,
    adjustment: &ErrorAdjustment,
    seed: u64,
) -> Result<Vec<Observation>, FitError> {
    if analyses.len() != observations.len() {
        return Err(FitError::shape("mock analyses", observations.len(), analyses.len()));
    }
    let errors = prepare_errors(observations, filters, adjustment)?;
    let mut rng = StdRng::seed_from_u64(seed);

    analyses
        .iter()
        .zip(observations)
        .zip(&errors)
        .map(|((analysis, obs), errors)| {
            let best = &analysis.best.fluxes;
            if best.len() != errors.len() {
                return Err(FitError::shape(
                    format!("best fluxes of '{}'", obs.id),
                    errors.len(),
                    best.len(),
                ));
            }
            let fluxes = best
                .iter()
                .zip(errors)
                .map(|(&flux, &sigma)| perturb(&mut rng, flux, sigma))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Observation {
                id: obs.id.clone(),
                redshift: obs.redshift,
                fluxes,
                errors: obs.errors.clone(),
            })
        })
        .collect()
}

fn perturb(rng: &mut StdRng, flux: f64, sigma: f64) -> Result<f64, FitError> {
    if sigma <= 0.0 {
        return Ok(flux);
    }
    let normal = Normal::new(0.0, sigma)
        .map_err(|e| FitError::InvalidArgument(format!("noise distribution error: {e}")))?;
    Ok(flux + normal.sample(rng))
}

/// Exact-versus-estimated regression of one quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MockComparison {
    pub quantity: String,
    pub n: usize,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Regress mock estimates on exact values for every best-fit quantity.
///
/// Observations without an estimate for a quantity (zero total weight) are
/// left out of that quantity's regression. A constant exact column, or fewer
/// than two pairs, gives slope 0, intercept 1 and r² 0.
pub fn compare_mock(exact: &[ObservationAnalysis], mock: &[ObservationAnalysis]) -> Vec<MockComparison> {
    let Some(first) = exact.first() else {
        return Vec::new();
    };

    first
        .best
        .quantities
        .keys()
        .map(|name| {
            let (x, y): (Vec<f64>, Vec<f64>) = exact
                .iter()
                .zip(mock)
                .filter_map(|(e, m)| {
                    let exact_value = e.best.quantities.get(name)?;
                    let estimate = m.estimate(name)?;
                    Some((*exact_value, estimate.mean))
                })
                .unzip();

            let constant = x.windows(2).all(|w| w[0] == w[1]);
            let line = if constant {
                None
            } else {
                fit_line(&x, &y)
            };
            let LineFit {
                slope,
                intercept,
                r_squared,
            } = line.unwrap_or_else(|| {
                warn!(quantity = %name, "exact values are constant; regression is undefined");
                LineFit {
                    slope: 0.0,
                    intercept: 1.0,
                    r_squared: 0.0,
                }
            });

            MockComparison {
                quantity: name.clone(),
                n: x.len(),
                slope,
                intercept,
                r_squared,
            }
        })
        .collect()
}
