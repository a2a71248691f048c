//! Model × observation evaluation.
//!
//! Every model of the grid is compared to every observation and the fit
//! statistics plus the analysed variables are written into a
//! [`ResultsTensor`]. Models are evaluated in parallel; each worker writes the
//! disjoint tensor slice of the model it owns, so no merge step is needed.
//!
//! Within one model the synthesizer is called once per distinct observation
//! redshift.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{
    ErrorAdjustment, FilterSet, Model, Observation, ParameterSet, ProbabilityPolicy, RunConfig,
};
use crate::error::FitError;
use crate::fit::progress::{CancelFlag, ProgressCounter};
use crate::fit::tensor::{FIRST_VARIABLE, NORMALIZATION, PROBABILITY, REDUCED_CHI2, ResultsTensor};
use crate::math::{adjust_errors, compare_fluxes};
use crate::models::SedSynthesizer;
use crate::pdf::PdfPolicy;

/// Options shared by evaluation and aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// Variables written into the tensor after the fit statistics.
    pub variables: Vec<String>,
    /// Subset of `variables` multiplied by the normalisation factor.
    pub mass_proportional: Vec<String>,
    pub error_adjustment: ErrorAdjustment,
    pub probability_policy: ProbabilityPolicy,
    /// `None` skips PDF estimation.
    pub pdf: Option<PdfPolicy>,
    /// Worker threads; `None` uses the global rayon pool.
    pub cores: Option<usize>,
    pub progress_every: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            mass_proportional: Vec::new(),
            error_adjustment: ErrorAdjustment::default(),
            probability_policy: ProbabilityPolicy::default(),
            pdf: None,
            cores: None,
            progress_every: 100,
        }
    }
}

impl AnalysisOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            variables: config.analysed_variables.clone(),
            mass_proportional: config.mass_proportional_variables.clone(),
            error_adjustment: config.error_adjustment,
            probability_policy: config.probability_policy,
            pdf: PdfPolicy::from_config(&config.pdf),
            cores: config.cores,
            progress_every: config.progress_every,
        }
    }

    pub fn is_mass_proportional(&self, variable: &str) -> bool {
        self.mass_proportional.iter().any(|v| v == variable)
    }
}

/// Observations sharing one redshift.
struct RedshiftGroup {
    redshift: f64,
    members: Vec<usize>,
}

fn group_by_redshift(observations: &[Observation]) -> Vec<RedshiftGroup> {
    let mut groups: Vec<RedshiftGroup> = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::new();
    for (o, obs) in observations.iter().enumerate() {
        let key = if obs.redshift == 0.0 { 0.0f64.to_bits() } else { obs.redshift.to_bits() };
        let g = *index.entry(key).or_insert_with(|| {
            groups.push(RedshiftGroup {
                redshift: obs.redshift,
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[g].members.push(o);
    }
    groups
}

/// Adjusted errors of every observation, checked against the filter set.
pub fn prepare_errors(
    observations: &[Observation],
    filters: &FilterSet,
    settings: &ErrorAdjustment,
) -> Result<Vec<Vec<f64>>, FitError> {
    observations
        .iter()
        .map(|obs| {
            if obs.fluxes.len() != filters.len() {
                return Err(FitError::shape(
                    format!("fluxes of observation '{}'", obs.id),
                    filters.len(),
                    obs.fluxes.len(),
                ));
            }
            adjust_errors(&obs.fluxes, &obs.errors, settings)
        })
        .collect()
}

/// Largest divisor of `freq_print` not above 10, so that workers batch their
/// progress updates.
fn increment_frequency(freq_print: usize) -> usize {
    (1..=freq_print.min(10))
        .rev()
        .find(|d| freq_print % d == 0)
        .unwrap_or(1)
}

/// Evaluate every `(model, observation)` pair of the grid.
///
/// An empty grid or an empty observation list yields a zero-extent tensor.
/// A flux length mismatch, a missing analysed variable or a synthesis failure
/// aborts the whole run, as does a raised `cancel` flag.
pub fn evaluate_grid<S>(
    grid: &[ParameterSet],
    observations: &[Observation],
    filters: &FilterSet,
    synth: &S,
    opts: &AnalysisOptions,
    cancel: Option<&CancelFlag>,
) -> Result<ResultsTensor, FitError>
where
    S: SedSynthesizer + ?Sized,
{
    let mut tensor = ResultsTensor::new(grid.len(), observations.len(), &opts.variables);
    if tensor.is_empty() {
        info!(
            models = grid.len(),
            observations = observations.len(),
            "nothing to evaluate"
        );
        return Ok(tensor);
    }

    let errors = prepare_errors(observations, filters, &opts.error_adjustment)?;
    let groups = group_by_redshift(observations);
    let stride = tensor.model_stride();
    let n_statistics = tensor.n_statistics();

    info!(
        models = grid.len(),
        observations = observations.len(),
        redshifts = groups.len(),
        "evaluating model grid"
    );

    let progress = ProgressCounter::new(
        grid.len(),
        increment_frequency(opts.progress_every),
        opts.progress_every,
    )?;

    let ctx = ModelContext {
        observations,
        errors: &errors,
        groups: &groups,
        n_filters: filters.len(),
        n_statistics,
        opts,
    };

    let run = |data: &mut [f64]| -> Result<(), FitError> {
        data.par_chunks_mut(stride)
            .enumerate()
            .try_for_each_init(
                || progress.local(),
                |local, (m, slice)| {
                    if cancel.is_some_and(CancelFlag::is_cancelled) {
                        return Err(FitError::Cancelled);
                    }
                    ctx.evaluate(m, &grid[m], synth, slice)?;
                    local.step();
                    Ok(())
                },
            )
    };

    match opts.cores {
        Some(cores) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(cores)
                .build()
                .map_err(|e| FitError::ThreadPool(e.to_string()))?;
            pool.install(|| run(tensor.data_mut()))?;
        }
        None => run(tensor.data_mut())?,
    }

    progress.finish();
    Ok(tensor)
}

struct ModelContext<'a> {
    observations: &'a [Observation],
    errors: &'a [Vec<f64>],
    groups: &'a [RedshiftGroup],
    n_filters: usize,
    n_statistics: usize,
    opts: &'a AnalysisOptions,
}

impl ModelContext<'_> {
    /// Fill the tensor slice of model `index` (all observations).
    fn evaluate<S>(&self, index: usize, params: &ParameterSet, synth: &S, slice: &mut [f64]) -> Result<(), FitError>
    where
        S: SedSynthesizer + ?Sized,
    {
        for group in self.groups {
            let model = synth.synthesize(params, group.redshift)?;
            debug!(model = index, redshift = group.redshift, "synthesised");
            if model.fluxes.len() != self.n_filters {
                return Err(FitError::shape(
                    format!("fluxes of model {index}"),
                    self.n_filters,
                    model.fluxes.len(),
                ));
            }

            for &o in &group.members {
                let obs = &self.observations[o];
                let cmp = compare_fluxes(&model.fluxes, &obs.fluxes, &self.errors[o], self.opts.probability_policy)?;
                let row = &mut slice[o * self.n_statistics..(o + 1) * self.n_statistics];
                row[REDUCED_CHI2] = cmp.reduced_chi2;
                row[PROBABILITY] = cmp.probability;
                row[NORMALIZATION] = cmp.normalization_factor;
                for (k, name) in self.opts.variables.iter().enumerate() {
                    row[FIRST_VARIABLE + k] = self.variable_value(&model, index, name, cmp.normalization_factor)?;
                }
            }
        }
        Ok(())
    }

    fn variable_value(&self, model: &Model, index: usize, name: &str, norm: f64) -> Result<f64, FitError> {
        let var = model.variables.get(name).ok_or_else(|| FitError::MissingVariable {
            variable: name.to_string(),
            model_index: index,
        })?;
        Ok(if self.opts.is_mass_proportional(name) {
            norm * var.value
        } else {
            var.scaled(norm)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelVariable;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fluxes `a · [1, 2, 3]`, variables `age = a` and `sfr = 0.5` per unit mass.
    fn synth(params: &ParameterSet, z: f64) -> Result<Model, FitError> {
        let a = params.get("a").unwrap_or(1.0);
        let mut variables = BTreeMap::new();
        variables.insert("age".to_string(), ModelVariable::intrinsic(a));
        variables.insert("sfr".to_string(), ModelVariable::intrinsic(0.5));
        Ok(Model {
            params: params.clone(),
            redshift: z,
            fluxes: vec![a, 2.0 * a, 3.0 * a],
            variables,
        })
    }

    fn grid(values: &[f64]) -> Vec<ParameterSet> {
        values
            .iter()
            .map(|&a| [("a".to_string(), a)].into_iter().collect::<ParameterSet>())
            .collect()
    }

    fn obs(id: &str, z: f64, fluxes: &[f64]) -> Observation {
        Observation {
            id: id.to_string(),
            redshift: z,
            fluxes: fluxes.to_vec(),
            errors: vec![0.1; fluxes.len()],
        }
    }

    fn opts() -> AnalysisOptions {
        AnalysisOptions {
            variables: vec!["age".to_string(), "sfr".to_string()],
            mass_proportional: vec!["sfr".to_string()],
            progress_every: 1,
            ..AnalysisOptions::default()
        }
    }

    #[test]
    fn fills_every_cell() {
        let filters = FilterSet::from_names(["u", "g", "r"]);
        let observations = vec![obs("a", 0.1, &[2.0, 4.0, 6.0]), obs("b", 0.2, &[1.0, 2.1, 2.9])];
        let t = evaluate_grid(&grid(&[1.0, 2.0, 4.0]), &observations, &filters, &synth, &opts(), None).unwrap();

        assert_eq!(t.n_models(), 3);
        assert_eq!(t.n_observations(), 2);
        assert!(t.is_complete());

        // Model a=2 reproduces observation "a" exactly.
        assert!(t.get(1, 0, REDUCED_CHI2).unwrap().abs() < 1e-12);
        assert!((t.get(1, 0, NORMALIZATION).unwrap() - 1.0).abs() < 1e-12);
        assert!((t.get(0, 0, NORMALIZATION).unwrap() - 2.0).abs() < 1e-12);
        // age is intrinsic, sfr scales with the normalisation.
        assert_eq!(t.get(2, 0, FIRST_VARIABLE).unwrap(), 4.0);
        assert!((t.get(0, 0, FIRST_VARIABLE + 1).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_grid_gives_zero_extent_tensor() {
        let filters = FilterSet::from_names(["u"]);
        let t = evaluate_grid(&[], &[obs("a", 0.1, &[1.0])], &filters, &synth, &opts(), None).unwrap();
        assert_eq!(t.n_models(), 0);
        assert!(t.is_empty());

        let t = evaluate_grid(&grid(&[1.0]), &[], &filters, &synth, &opts(), None).unwrap();
        assert_eq!(t.n_observations(), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn flux_length_mismatch_is_fatal() {
        let filters = FilterSet::from_names(["u", "g"]);
        let observations = vec![obs("a", 0.1, &[1.0, 2.0])];
        let err = evaluate_grid(&grid(&[1.0]), &observations, &filters, &synth, &opts(), None).unwrap_err();
        assert!(matches!(err, FitError::ShapeMismatch { .. }));
    }

    #[test]
    fn missing_variable_is_reported() {
        let filters = FilterSet::from_names(["u", "g", "r"]);
        let mut o = opts();
        o.variables.push("metallicity".to_string());
        let err = evaluate_grid(&grid(&[1.0]), &[obs("a", 0.1, &[1.0, 2.0, 3.0])], &filters, &synth, &o, None)
            .unwrap_err();
        assert_eq!(
            err,
            FitError::MissingVariable {
                variable: "metallicity".to_string(),
                model_index: 0
            }
        );
    }

    #[test]
    fn synthesizes_once_per_distinct_redshift() {
        let calls = AtomicUsize::new(0);
        let counting = |p: &ParameterSet, z: f64| -> Result<Model, FitError> {
            calls.fetch_add(1, Ordering::Relaxed);
            synth(p, z)
        };
        let filters = FilterSet::from_names(["u", "g", "r"]);
        let observations = vec![
            obs("a", 0.1, &[1.0, 2.0, 3.0]),
            obs("b", 0.1, &[1.0, 2.0, 3.0]),
            obs("c", 0.3, &[1.0, 2.0, 3.0]),
        ];
        evaluate_grid(&grid(&[1.0, 2.0]), &observations, &filters, &counting, &opts(), None).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn cancelled_run_is_discarded() {
        let flag = CancelFlag::new();
        flag.cancel();
        let filters = FilterSet::from_names(["u", "g", "r"]);
        let err = evaluate_grid(
            &grid(&[1.0, 2.0]),
            &[obs("a", 0.1, &[1.0, 2.0, 3.0])],
            &filters,
            &synth,
            &opts(),
            Some(&flag),
        )
        .unwrap_err();
        assert_eq!(err, FitError::Cancelled);
    }

    #[test]
    fn dedicated_pool_matches_global_pool() {
        let filters = FilterSet::from_names(["u", "g", "r"]);
        let observations = vec![obs("a", 0.1, &[2.0, 4.0, 6.0])];
        let values: Vec<f64> = (1..=20).map(f64::from).collect();
        let global = evaluate_grid(&grid(&values), &observations, &filters, &synth, &opts(), None).unwrap();
        let mut o = opts();
        o.cores = Some(2);
        let pooled = evaluate_grid(&grid(&values), &observations, &filters, &synth, &o, None).unwrap();
        for m in 0..values.len() {
            assert_eq!(
                global.get(m, 0, REDUCED_CHI2).unwrap(),
                pooled.get(m, 0, REDUCED_CHI2).unwrap()
            );
        }
    }

    #[test]
    fn increment_frequency_divides_print_frequency() {
        assert_eq!(increment_frequency(100), 10);
        assert_eq!(increment_frequency(7), 7);
        assert_eq!(increment_frequency(13), 1);
        assert_eq!(increment_frequency(1), 1);
    }
}
