//! Model-to-observation flux comparison.
//!
//! For one `(model, observation)` pair we compute:
//!
//! - the normalisation factor `s` minimising `Σ ((obs - s·model) / err)²` in the
//!   unweighted least-squares sense used historically: `s = Σ obs·model / Σ model²`
//! - the χ² of the scaled model, reduced by `n - 1` degrees of freedom and
//!   capped at [`MAX_REDUCED_CHI2`]
//! - a probability derived from the χ² (see [`ProbabilityPolicy`])
//!
//! Filters whose error is below [`TOLERANCE`] are unconstrained and dropped
//! from the comparison.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::domain::{MAX_REDUCED_CHI2, ProbabilityPolicy, TOLERANCE};
use crate::error::FitError;

/// Fit statistics for one `(model, observation)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub reduced_chi2: f64,
    pub normalization_factor: f64,
    pub probability: f64,
}

impl Comparison {
    /// Sentinel for an observation that cannot be fitted: it never wins the
    /// best-fit selection and carries no weight.
    pub const UNFITTABLE: Comparison = Comparison {
        reduced_chi2: MAX_REDUCED_CHI2,
        normalization_factor: 1.0,
        probability: 0.0,
    };

    pub fn is_unfittable(&self) -> bool {
        *self == Self::UNFITTABLE
    }
}

/// Compare model fluxes to observed fluxes and errors.
///
/// With a single constrained filter there are no degrees of freedom left; the
/// pair is reported as a perfect fit (`reduced_chi2 = 0`, `probability = 1`)
/// with `normalization_factor = Σ obs / Σ model`.
///
/// A model whose constrained fluxes cannot be scaled (zero flux everywhere)
/// gets [`Comparison::UNFITTABLE`], so no NaN or infinity reaches the tensor.
pub fn compare_fluxes(
    model_fluxes: &[f64],
    obs_fluxes: &[f64],
    obs_errors: &[f64],
    policy: ProbabilityPolicy,
) -> Result<Comparison, FitError> {
    if model_fluxes.len() != obs_fluxes.len() {
        return Err(FitError::shape(
            "model and observation fluxes",
            obs_fluxes.len(),
            model_fluxes.len(),
        ));
    }
    if obs_errors.len() != obs_fluxes.len() {
        return Err(FitError::shape(
            "observation fluxes and errors",
            obs_fluxes.len(),
            obs_errors.len(),
        ));
    }

    let max_flux = obs_fluxes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max_flux >= TOLERANCE) {
        return Ok(Comparison::UNFITTABLE);
    }
    let min_error_of_detections = obs_fluxes
        .iter()
        .zip(obs_errors)
        .filter(|(f, _)| **f > TOLERANCE)
        .map(|(_, e)| *e)
        .fold(f64::INFINITY, f64::min);
    if min_error_of_detections < TOLERANCE {
        return Ok(Comparison::UNFITTABLE);
    }

    let (model, obs, err) = constrained_filters(model_fluxes, obs_fluxes, obs_errors);
    if model.is_empty() {
        return Ok(Comparison::UNFITTABLE);
    }

    let degrees_of_freedom = model.len() - 1;
    if degrees_of_freedom == 0 {
        let normalization_factor = obs.sum() / model.sum();
        if !normalization_factor.is_finite() {
            return Ok(Comparison::UNFITTABLE);
        }
        return Ok(Comparison {
            reduced_chi2: 0.0,
            normalization_factor,
            probability: 1.0,
        });
    }

    // A model without flux in any constrained filter cannot be scaled.
    let normalization_factor = obs.dot(&model) / model.norm_squared();
    if !normalization_factor.is_finite() {
        return Ok(Comparison::UNFITTABLE);
    }
    let residuals = (&obs - &model * normalization_factor).component_div(&err);
    let chi2 = residuals.norm_squared();
    let reduced_chi2 = chi2 / degrees_of_freedom as f64;

    let probability = match policy {
        ProbabilityPolicy::ExpHalfChi2 => (-chi2 / 2.0).exp(),
        ProbabilityPolicy::ExpHalfReducedChi2 => (-reduced_chi2 / 2.0).exp(),
    };

    Ok(Comparison {
        reduced_chi2: reduced_chi2.min(MAX_REDUCED_CHI2),
        normalization_factor,
        probability,
    })
}

/// Keep only the filters whose error is above tolerance, in lockstep.
fn constrained_filters(
    model_fluxes: &[f64],
    obs_fluxes: &[f64],
    obs_errors: &[f64],
) -> (DVector<f64>, DVector<f64>, DVector<f64>) {
    let mut model = Vec::with_capacity(model_fluxes.len());
    let mut obs = Vec::with_capacity(obs_fluxes.len());
    let mut err = Vec::with_capacity(obs_errors.len());
    for ((&m, &o), &e) in model_fluxes.iter().zip(obs_fluxes).zip(obs_errors) {
        if e > TOLERANCE {
            model.push(m);
            obs.push(o);
            err.push(e);
        }
    }
    (DVector::from_vec(model), DVector::from_vec(obs), DVector::from_vec(err))
}
