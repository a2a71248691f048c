//! Per-observation aggregation of a filled results tensor.
//!
//! For each observation:
//!
//! - the best model is the first one with the smallest reduced χ²
//! - every analysed quantity (`galaxy_mass` first, then the configured
//!   variables) gets a probability-weighted mean and standard deviation
//! - optionally, a PDF per quantity
//!
//! Observations whose probabilities are all zero (no model can fit them) get a
//! best fit but no estimates; the condition is reported as an
//! [`AnalysisIssue`] instead of failing the run.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{FilterSet, GALAXY_MASS, Observation, ParameterSet};
use crate::error::FitError;
use crate::fit::evaluator::{AnalysisOptions, evaluate_grid};
use crate::fit::progress::CancelFlag;
use crate::fit::tensor::{FIRST_VARIABLE, NORMALIZATION, PROBABILITY, REDUCED_CHI2, ResultsTensor};
use crate::math::{WeightedEstimate, weighted_mean_std};
use crate::models::SedSynthesizer;
use crate::pdf::{Pdf, estimate_pdf};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestFit {
    pub model_index: usize,
    pub params: ParameterSet,
    pub reduced_chi2: f64,
    pub probability: f64,
    pub normalization_factor: f64,
    /// Tensor values of every analysed quantity for the best model.
    pub quantities: BTreeMap<String, f64>,
    /// Best-model fluxes at the observation redshift, times the normalisation.
    pub fluxes: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantityEstimate {
    pub name: String,
    pub mean: f64,
    pub std: f64,
    pub pdf: Option<Pdf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum AnalysisIssue {
    /// Every model has zero probability; no estimate is possible.
    ZeroTotalWeight,
    PdfUnavailable { variable: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationAnalysis {
    pub id: String,
    pub best: BestFit,
    pub estimates: Vec<QuantityEstimate>,
    pub issues: Vec<AnalysisIssue>,
}

impl ObservationAnalysis {
    pub fn estimate(&self, name: &str) -> Option<&QuantityEstimate> {
        self.estimates.iter().find(|e| e.name == name)
    }
}

/// Tensor and per-observation results of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub tensor: ResultsTensor,
    pub observations: Vec<ObservationAnalysis>,
}

/// Analysed quantities and their tensor columns, `galaxy_mass` first.
pub fn analysed_quantities(opts: &AnalysisOptions) -> Vec<(String, usize)> {
    std::iter::once((GALAXY_MASS.to_string(), NORMALIZATION))
        .chain(
            opts.variables
                .iter()
                .enumerate()
                .map(|(k, name)| (name.clone(), FIRST_VARIABLE + k)),
        )
        .collect()
}

/// Index of the smallest value, first occurrence on ties.
///
/// NaN is skipped, but a filled reduced-χ² column never holds one: the
/// comparator always writes a finite value capped at 99.
pub fn argmin_first(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// `(value, reduced χ²)` of one statistic over all models for one observation.
pub fn chi2_distribution(
    tensor: &ResultsTensor,
    observation: usize,
    statistic: usize,
) -> Result<Vec<(f64, f64)>, FitError> {
    let values = tensor.column(observation, statistic)?;
    let chi2 = tensor.column(observation, REDUCED_CHI2)?;
    Ok(values.into_iter().zip(chi2).collect())
}

/// Aggregate every observation of a filled tensor.
///
/// A tensor without models or observations aggregates to nothing.
pub fn aggregate<S>(
    tensor: &ResultsTensor,
    grid: &[ParameterSet],
    observations: &[Observation],
    synth: &S,
    opts: &AnalysisOptions,
) -> Result<Vec<ObservationAnalysis>, FitError>
where
    S: SedSynthesizer + ?Sized,
{
    if tensor.n_models() == 0 || tensor.n_observations() == 0 {
        return Ok(Vec::new());
    }
    if tensor.n_models() != grid.len() {
        return Err(FitError::shape("tensor models", grid.len(), tensor.n_models()));
    }
    if tensor.n_observations() != observations.len() {
        return Err(FitError::shape(
            "tensor observations",
            observations.len(),
            tensor.n_observations(),
        ));
    }

    let quantities = analysed_quantities(opts);
    observations
        .par_iter()
        .enumerate()
        .map(|(o, obs)| analyse_observation(tensor, grid, o, obs, synth, opts, &quantities))
        .collect()
}

fn analyse_observation<S>(
    tensor: &ResultsTensor,
    grid: &[ParameterSet],
    o: usize,
    obs: &Observation,
    synth: &S,
    opts: &AnalysisOptions,
    quantities: &[(String, usize)],
) -> Result<ObservationAnalysis, FitError>
where
    S: SedSynthesizer + ?Sized,
{
    let chi2 = tensor.column(o, REDUCED_CHI2)?;
    let probabilities = tensor.column(o, PROBABILITY)?;
    let Some(best_index) = argmin_first(&chi2) else {
        return Err(FitError::InvalidArgument(format!(
            "observation '{}' has no evaluated model",
            obs.id
        )));
    };

    let best = best_fit(tensor, grid, o, obs, best_index, synth, quantities)?;
    let mut issues = Vec::new();
    let mut estimates = Vec::with_capacity(quantities.len());

    let total: f64 = probabilities.iter().sum();
    if !total.is_finite() {
        return Err(FitError::NonFiniteWeight(obs.id.clone()));
    }
    if total == 0.0 {
        warn!(observation = %obs.id, "all models have zero probability; skipping estimates");
        issues.push(AnalysisIssue::ZeroTotalWeight);
        return Ok(ObservationAnalysis {
            id: obs.id.clone(),
            best,
            estimates,
            issues,
        });
    }

    for (name, column) in quantities {
        let values = tensor.column(o, *column)?;
        let WeightedEstimate { mean, std } = match weighted_mean_std(&values, &probabilities) {
            Ok(est) => est,
            Err(FitError::ZeroTotalWeight) => {
                issues.push(AnalysisIssue::ZeroTotalWeight);
                continue;
            }
            Err(e) => return Err(e),
        };

        let pdf = match opts.pdf {
            Some(policy) => {
                let pdf = estimate_pdf(&values, &probabilities, policy)?;
                if pdf.is_none() {
                    warn!("Can not compute PDF for observation <{}> and variable <{}>", obs.id, name);
                    issues.push(AnalysisIssue::PdfUnavailable {
                        variable: name.clone(),
                    });
                }
                pdf
            }
            None => None,
        };

        estimates.push(QuantityEstimate {
            name: name.clone(),
            mean,
            std,
            pdf,
        });
    }

    Ok(ObservationAnalysis {
        id: obs.id.clone(),
        best,
        estimates,
        issues,
    })
}

fn best_fit<S>(
    tensor: &ResultsTensor,
    grid: &[ParameterSet],
    o: usize,
    obs: &Observation,
    index: usize,
    synth: &S,
    quantities: &[(String, usize)],
) -> Result<BestFit, FitError>
where
    S: SedSynthesizer + ?Sized,
{
    let normalization_factor = tensor.get(index, o, NORMALIZATION)?;
    let model = synth.synthesize(&grid[index], obs.redshift)?;
    let quantities = quantities
        .iter()
        .map(|(name, column)| Ok((name.clone(), tensor.get(index, o, *column)?)))
        .collect::<Result<BTreeMap<_, _>, FitError>>()?;

    Ok(BestFit {
        model_index: index,
        params: grid[index].clone(),
        reduced_chi2: tensor.get(index, o, REDUCED_CHI2)?,
        probability: tensor.get(index, o, PROBABILITY)?,
        normalization_factor,
        quantities,
        fluxes: model.fluxes.iter().map(|f| f * normalization_factor).collect(),
    })
}

/// Evaluate the grid, then aggregate every observation.
pub fn run_analysis<S>(
    grid: &[ParameterSet],
    observations: &[Observation],
    filters: &FilterSet,
    synth: &S,
    opts: &AnalysisOptions,
    cancel: Option<&CancelFlag>,
) -> Result<Analysis, FitError>
where
    S: SedSynthesizer + ?Sized,
{
    let tensor = evaluate_grid(grid, observations, filters, synth, opts, cancel)?;
    info!(observations = observations.len(), "aggregating results");
    let observations = aggregate(&tensor, grid, observations, synth, opts)?;
    Ok(Analysis { tensor, observations })
}
