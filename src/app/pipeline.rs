//! Shared "fit pipeline" logic.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! config -> grid expansion -> model table + observations -> evaluation ->
//! aggregation -> (optional) mock analysis -> exports

use std::path::Path;
use std::time::Instant;

use tracing::info;

use crate::cli::FitArgs;
use crate::data::{MockComparison, build_mock_catalogue, compare_mock};
use crate::domain::{FilterSet, ParameterSet, RunConfig};
use crate::error::AppError;
use crate::fit::{
    Analysis, AnalysisOptions, analysed_quantities, chi2_distribution, expand_parameter_grid, run_analysis,
};
use crate::io::{
    ANALYSIS_RESULTS_FILE, BEST_MODELS_FILE, MOCK_RESULTS_FILE, ObservationTable, RUN_SUMMARY_FILE, RunSummary,
    TENSOR_FILE, check_output_ids, quantity_file_name, read_model_table, read_observations, write_analysis_results,
    write_best_models, write_chi2, write_mock_results, write_pdfs, write_run_summary, write_tensor_json,
};
use crate::models::StoreSynthesizer;

/// All computed outputs of a single `sedfit fit` run.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub config: RunConfig,
    pub filters: FilterSet,
    pub grid: Vec<ParameterSet>,
    pub observations: ObservationTable,
    pub options: AnalysisOptions,
    pub analysis: Analysis,
    pub mock: Option<Vec<MockComparison>>,
    pub elapsed_seconds: f64,
}

impl FitRun {
    /// Analysed quantity names, `galaxy_mass` first.
    pub fn quantities(&self) -> Vec<String> {
        analysed_quantities(&self.options)
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }
}

/// Load the configuration with CLI overrides applied.
pub fn load_config(args: &FitArgs) -> Result<RunConfig, AppError> {
    let mut config = RunConfig::load(&args.config)?;
    if let Some(cores) = args.cores {
        config.cores = Some(cores);
    }
    if let Some(kind) = args.pdf {
        config.pdf.kind = kind;
    }
    config.validate()?;
    Ok(config)
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(args: &FitArgs) -> Result<FitRun, AppError> {
    let config = load_config(args)?;
    let filters = FilterSet::from_names(&config.filters);
    let grid = expand_parameter_grid(&config.parameters)?;
    if grid.is_empty() {
        return Err(AppError::new(3, "Parameter grid is empty; nothing to fit."));
    }

    let table = read_model_table(&args.models, &config)?;
    let observations = read_observations(&args.observations, &filters)?;
    if observations.observations.is_empty() {
        return Err(AppError::new(3, "No usable observations; nothing to fit."));
    }
    check_output_ids(observations.observations.iter().map(|o| o.id.as_str()))?;

    let synth = StoreSynthesizer::new(&table.store);
    let options = AnalysisOptions::from_config(&config);

    let start = Instant::now();
    let analysis = run_analysis(&grid, &observations.observations, &filters, &synth, &options, None)?;

    let mock = if args.mock {
        info!(seed = args.seed, "analysing mock catalogue");
        let mock_observations = build_mock_catalogue(
            &analysis.observations,
            &observations.observations,
            &filters,
            &config.error_adjustment,
            args.seed,
        )?;
        let mock_analysis = run_analysis(&grid, &mock_observations, &filters, &synth, &options, None)?;
        Some(compare_mock(&analysis.observations, &mock_analysis.observations))
    } else {
        None
    };
    let elapsed_seconds = start.elapsed().as_secs_f64();

    Ok(FitRun {
        config,
        filters,
        grid,
        observations,
        options,
        analysis,
        mock,
        elapsed_seconds,
    })
}

/// Write every export of `run` into `dir`.
pub fn write_outputs(run: &FitRun, dir: &Path) -> Result<(), AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create output directory '{}': {e}", dir.display())))?;

    let analyses = &run.analysis.observations;
    let quantities = run.quantities();
    let parameters: Vec<String> = run.config.parameters.iter().map(|a| a.name.clone()).collect();

    write_analysis_results(&dir.join(ANALYSIS_RESULTS_FILE), analyses, &quantities)?;
    write_best_models(&dir.join(BEST_MODELS_FILE), analyses, &parameters, &run.filters)?;
    let pdfs = write_pdfs(dir, analyses)?;
    info!(files = pdfs.len(), "PDFs written");

    if run.config.save_chi2 {
        for (o, a) in analyses.iter().enumerate() {
            for (name, column) in analysed_quantities(&run.options) {
                let pairs = chi2_distribution(&run.analysis.tensor, o, column)?;
                write_chi2(&dir.join(quantity_file_name(&a.id, &name, "chi2")), &pairs)?;
            }
        }
    }
    if run.config.save_tensor {
        write_tensor_json(&dir.join(TENSOR_FILE), &run.analysis.tensor)?;
    }
    if let Some(mock) = &run.mock {
        write_mock_results(&dir.join(MOCK_RESULTS_FILE), mock)?;
    }

    let summary = RunSummary {
        tool: "sedfit".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        generated_at: chrono::Utc::now(),
        n_models: run.grid.len(),
        n_observations: analyses.len(),
        filters: run.config.filters.clone(),
        quantities,
        elapsed_seconds: run.elapsed_seconds,
        issues: RunSummary::collect_issues(analyses),
        skipped_rows: run.observations.row_errors.len(),
    };
    write_run_summary(&dir.join(RUN_SUMMARY_FILE), &summary)?;

    info!(dir = %dir.display(), "results written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    /// Two-parameter grid of models `flux = age/100 · [1, tau/100, 1]`.
    fn fixture(name: &str) -> (PathBuf, FitArgs) {
        let dir = std::env::temp_dir().join(format!("sedfit-pipeline-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let config = write(
            &dir,
            "run.json",
            r#"{
                "filters": ["u", "g", "r"],
                "parameters": [
                    {"name": "age", "values": [100, 200]},
                    {"name": "tau", "values": [100, 300]}
                ],
                "analysed_variables": ["sfr"],
                "mass_proportional_variables": ["sfr"],
                "save_chi2": true,
                "save_tensor": true,
                "progress_every": 1
            }"#,
        );

        let mut models = String::from("redshift,age,tau,u,g,r,sfr\n");
        for z in ["0.1", "0.2"] {
            for age in [100.0, 200.0] {
                for tau in [100.0, 300.0] {
                    let a = age / 100.0;
                    models.push_str(&format!("{z},{age},{tau},{a},{},{a},{}\n", a * tau / 100.0, tau / 1000.0));
                }
            }
        }
        let models = write(&dir, "models.csv", &models);
        let observations = write(
            &dir,
            "obs.csv",
            "id,redshift,u,g,r,u_err,g_err,r_err\n\
             gal1,0.1,2.0,6.0,2.0,0.1,0.1,0.1\n\
             gal2,0.2,1.0,1.0,1.0,0.1,0.1,0.1\n",
        );

        let args = FitArgs {
            config,
            models,
            observations,
            output: dir.join("out"),
            cores: Some(2),
            pdf: None,
            mock: true,
            seed: 3,
        };
        (dir, args)
    }

    #[test]
    fn full_run_recovers_best_models_and_writes_outputs() {
        let (dir, args) = fixture("full");
        let run = run_fit(&args).unwrap();

        assert_eq!(run.grid.len(), 4);
        assert_eq!(run.analysis.observations.len(), 2);
        // gal1 = 2 x (age=100, tau=300); gal2 = 1 x (age=100, tau=100).
        let gal1 = &run.analysis.observations[0].best;
        assert_eq!(gal1.params.get("tau"), Some(300.0));
        assert!(gal1.reduced_chi2 < 1e-9);
        let gal2 = &run.analysis.observations[1].best;
        assert_eq!(gal2.params.get("tau"), Some(100.0));
        assert_eq!(run.quantities(), vec!["galaxy_mass".to_string(), "sfr".to_string()]);
        assert_eq!(run.mock.as_ref().map(Vec::len), Some(2));

        write_outputs(&run, &args.output).unwrap();
        for file in [
            ANALYSIS_RESULTS_FILE,
            BEST_MODELS_FILE,
            TENSOR_FILE,
            MOCK_RESULTS_FILE,
            RUN_SUMMARY_FILE,
            "gal1_galaxy_mass_pdf.csv",
            "gal2_sfr_chi2.csv",
        ] {
            assert!(args.output.join(file).exists(), "missing {file}");
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn cli_overrides_config() {
        let (dir, mut args) = fixture("overrides");
        args.pdf = Some(crate::domain::PdfKind::Kde);
        args.cores = Some(3);
        let config = load_config(&args).unwrap();
        assert_eq!(config.pdf.kind, crate::domain::PdfKind::Kde);
        assert_eq!(config.cores, Some(3));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_observation_table_exits_with_code_3() {
        let (dir, args) = fixture("empty");
        std::fs::write(&args.observations, "id,redshift,u,g,r\n").unwrap();
        let err = run_fit(&args).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn colliding_observation_ids_fail_before_fitting() {
        let (dir, args) = fixture("collide");
        std::fs::write(
            &args.observations,
            "id,redshift,u,g,r\ngal/1,0.1,1.0,1.0,1.0\ngal_1,0.1,1.0,1.0,1.0\n",
        )
        .unwrap();
        let err = run_fit(&args).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}
