//! Result exports (CSV and JSON).
//!
//! File layout of an output directory:
//!
//! - `analysis_results.csv`: one row per observation, best-fit and
//!   probability-weighted values of every analysed quantity
//! - `best_models.csv`: best model parameters, statistics and normalised fluxes
//! - `<id>_<quantity>_pdf.csv`: one file per PDF
//! - `<id>_<quantity>_chi2.csv`: `(value, reduced χ²)` over all models
//! - `comp_table.json`: the full results tensor
//! - `mock_results.csv`: mock-analysis regressions
//! - `run_summary.json`: run metadata and reported issues

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::MockComparison;
use crate::domain::FilterSet;
use crate::error::AppError;
use crate::fit::{AnalysisIssue, ObservationAnalysis, ResultsTensor};
use crate::pdf::Pdf;

pub const ANALYSIS_RESULTS_FILE: &str = "analysis_results.csv";
pub const BEST_MODELS_FILE: &str = "best_models.csv";
pub const TENSOR_FILE: &str = "comp_table.json";
pub const MOCK_RESULTS_FILE: &str = "mock_results.csv";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

fn csv_writer(path: &Path) -> Result<csv::Writer<File>, AppError> {
    csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display())))
}

fn write_record<I, T>(writer: &mut csv::Writer<File>, record: I) -> Result<(), AppError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    writer
        .write_record(record)
        .map_err(|e| AppError::new(2, format!("Failed to write CSV row: {e}")))
}

fn finish(mut writer: csv::Writer<File>) -> Result<(), AppError> {
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV: {e}")))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| AppError::new(2, format!("Failed to write JSON '{}': {e}", path.display())))
}

fn num(v: f64) -> String {
    format!("{v:.6e}")
}

/// Per-observation summary table.
///
/// Quantities without an estimate (zero total weight) leave the `bayes.*`
/// cells empty.
pub fn write_analysis_results(
    path: &Path,
    analyses: &[ObservationAnalysis],
    quantities: &[String],
) -> Result<(), AppError> {
    let mut w = csv_writer(path)?;

    let mut header = vec!["id".to_string(), "best.reduced_chi2".to_string(), "best.probability".to_string()];
    for q in quantities {
        header.push(format!("bayes.{q}"));
        header.push(format!("bayes.{q}_err"));
        header.push(format!("best.{q}"));
    }
    write_record(&mut w, &header)?;

    for a in analyses {
        let mut row = vec![a.id.clone(), num(a.best.reduced_chi2), num(a.best.probability)];
        for q in quantities {
            match a.estimate(q) {
                Some(e) => {
                    row.push(num(e.mean));
                    row.push(num(e.std));
                }
                None => {
                    row.push(String::new());
                    row.push(String::new());
                }
            }
            row.push(a.best.quantities.get(q).map(|v| num(*v)).unwrap_or_default());
        }
        write_record(&mut w, &row)?;
    }
    finish(w)
}

/// Best model per observation with its normalised fluxes.
pub fn write_best_models(
    path: &Path,
    analyses: &[ObservationAnalysis],
    parameters: &[String],
    filters: &FilterSet,
) -> Result<(), AppError> {
    let mut w = csv_writer(path)?;

    let mut header: Vec<String> = vec!["id".to_string(), "model_index".to_string()];
    header.extend(parameters.iter().cloned());
    header.extend(["reduced_chi2", "probability", "normalization_factor"].map(String::from));
    header.extend(filters.names().map(String::from));
    write_record(&mut w, &header)?;

    for a in analyses {
        let b = &a.best;
        let mut row = vec![a.id.clone(), b.model_index.to_string()];
        row.extend(
            parameters
                .iter()
                .map(|p| b.params.get(p).map(|v| v.to_string()).unwrap_or_default()),
        );
        row.push(num(b.reduced_chi2));
        row.push(num(b.probability));
        row.push(num(b.normalization_factor));
        row.extend(b.fluxes.iter().map(|f| num(*f)));
        write_record(&mut w, &row)?;
    }
    finish(w)
}

/// File-system safe `<id>_<quantity>_<suffix>.csv`.
pub fn quantity_file_name(id: &str, quantity: &str, suffix: &str) -> String {
    format!("{}_{}_{suffix}.csv", file_stem(id), file_stem(quantity))
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

/// Fail when two observation ids would share per-observation output files
/// (`gal/1` and `gal_1`, or a repeated id).
pub fn check_output_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Result<(), AppError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for id in ids {
        if let Some(previous) = seen.insert(file_stem(id), id) {
            return Err(AppError::new(
                2,
                format!("Observations '{previous}' and '{id}' would write to the same output files."),
            ));
        }
    }
    Ok(())
}

pub fn write_pdf(path: &Path, pdf: &Pdf) -> Result<(), AppError> {
    let mut w = csv_writer(path)?;
    match pdf {
        Pdf::Binned(bins) => {
            write_record(&mut w, ["bin_start", "bin_end", "value", "probability"])?;
            for b in bins {
                write_record(
                    &mut w,
                    [num(b.bin_start), num(b.bin_end), num(b.value), num(b.probability)],
                )?;
            }
        }
        Pdf::Density(points) => {
            write_record(&mut w, ["value", "density"])?;
            for p in points {
                write_record(&mut w, [num(p.value), num(p.density)])?;
            }
        }
    }
    finish(w)
}

pub fn write_chi2(path: &Path, pairs: &[(f64, f64)]) -> Result<(), AppError> {
    let mut w = csv_writer(path)?;
    write_record(&mut w, ["value", "reduced_chi2"])?;
    for (value, chi2) in pairs {
        write_record(&mut w, [num(*value), num(*chi2)])?;
    }
    finish(w)
}

/// Every PDF of every observation into `dir`; returns the written paths.
pub fn write_pdfs(dir: &Path, analyses: &[ObservationAnalysis]) -> Result<Vec<PathBuf>, AppError> {
    check_output_ids(analyses.iter().map(|a| a.id.as_str()))?;
    let mut written = Vec::new();
    for a in analyses {
        for e in &a.estimates {
            if let Some(pdf) = &e.pdf {
                let path = dir.join(quantity_file_name(&a.id, &e.name, "pdf"));
                write_pdf(&path, pdf)?;
                written.push(path);
            }
        }
    }
    Ok(written)
}

pub fn write_tensor_json(path: &Path, tensor: &ResultsTensor) -> Result<(), AppError> {
    write_json(path, tensor)
}

pub fn write_mock_results(path: &Path, comparisons: &[MockComparison]) -> Result<(), AppError> {
    let mut w = csv_writer(path)?;
    write_record(&mut w, ["quantity", "n", "slope", "intercept", "r_squared"])?;
    for c in comparisons {
        write_record(
            &mut w,
            [
                c.quantity.clone(),
                c.n.to_string(),
                num(c.slope),
                num(c.intercept),
                num(c.r_squared),
            ],
        )?;
    }
    finish(w)
}

#[derive(Debug, Clone, Serialize)]
pub struct ObservationIssue {
    pub id: String,
    #[serde(flatten)]
    pub issue: AnalysisIssue,
}

/// Run metadata written next to the results.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub tool: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub n_models: usize,
    pub n_observations: usize,
    pub filters: Vec<String>,
    pub quantities: Vec<String>,
    pub elapsed_seconds: f64,
    pub issues: Vec<ObservationIssue>,
    pub skipped_rows: usize,
}

impl RunSummary {
    pub fn collect_issues(analyses: &[ObservationAnalysis]) -> Vec<ObservationIssue> {
        analyses
            .iter()
            .flat_map(|a| {
                a.issues.iter().map(|issue| ObservationIssue {
                    id: a.id.clone(),
                    issue: issue.clone(),
                })
            })
            .collect()
    }
}

pub fn write_run_summary(path: &Path, summary: &RunSummary) -> Result<(), AppError> {
    write_json(path, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ParameterSet;
    use crate::fit::{BestFit, QuantityEstimate};
    use crate::pdf::PdfBin;
    use std::collections::BTreeMap;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sedfit-export-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn analysis(id: &str, with_estimate: bool) -> ObservationAnalysis {
        let mut quantities = BTreeMap::new();
        quantities.insert("galaxy_mass".to_string(), 2.0);
        let mut params = ParameterSet::new();
        params.insert("age", 100.0);
        ObservationAnalysis {
            id: id.to_string(),
            best: BestFit {
                model_index: 3,
                params,
                reduced_chi2: 0.5,
                probability: 0.25,
                normalization_factor: 2.0,
                quantities,
                fluxes: vec![1.0, 2.0],
            },
            estimates: if with_estimate {
                vec![QuantityEstimate {
                    name: "galaxy_mass".to_string(),
                    mean: 2.5,
                    std: 0.5,
                    pdf: Some(Pdf::Binned(vec![PdfBin {
                        bin_start: 1.0,
                        bin_end: 3.0,
                        value: 2.5,
                        probability: 1.0,
                    }])),
                }]
            } else {
                Vec::new()
            },
            issues: if with_estimate {
                Vec::new()
            } else {
                vec![AnalysisIssue::ZeroTotalWeight]
            },
        }
    }

    #[test]
    fn analysis_results_leave_missing_estimates_empty() {
        let dir = temp_dir("results");
        let path = dir.join(ANALYSIS_RESULTS_FILE);
        write_analysis_results(&path, &[analysis("a", true), analysis("b", false)], &["galaxy_mass".to_string()])
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "id,best.reduced_chi2,best.probability,bayes.galaxy_mass,bayes.galaxy_mass_err,best.galaxy_mass"
        );
        assert!(lines[1].starts_with("a,"));
        assert!(lines[2].contains(",,"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn best_models_list_parameters_and_fluxes() {
        let dir = temp_dir("best");
        let path = dir.join(BEST_MODELS_FILE);
        let filters = FilterSet::from_names(["u", "g"]);
        write_best_models(&path, &[analysis("a", true)], &["age".to_string()], &filters).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 8);
        assert_eq!(&headers[7], "g");
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[1], "3");
        assert_eq!(&row[2], "100");
        assert!((row[7].parse::<f64>().unwrap() - 2.0).abs() < 1e-12);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn pdfs_are_written_per_quantity() {
        let dir = temp_dir("pdf");
        let written = write_pdfs(&dir, &[analysis("gal/1", true), analysis("b", false)]).unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("gal_1_galaxy_mass_pdf.csv"));
        let text = std::fs::read_to_string(&written[0]).unwrap();
        assert!(text.starts_with("bin_start,bin_end,value,probability"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn summary_flattens_issues() {
        let dir = temp_dir("summary");
        let path = dir.join(RUN_SUMMARY_FILE);
        let analyses = [analysis("b", false)];
        let summary = RunSummary {
            tool: "sedfit".to_string(),
            version: "0.0.0".to_string(),
            generated_at: Utc::now(),
            n_models: 1,
            n_observations: 1,
            filters: vec!["u".to_string()],
            quantities: vec!["galaxy_mass".to_string()],
            elapsed_seconds: 0.1,
            issues: RunSummary::collect_issues(&analyses),
            skipped_rows: 0,
        };
        write_run_summary(&path, &summary).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["issues"][0]["id"], "b");
        assert_eq!(value["issues"][0]["issue"], "zero_total_weight");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn colliding_ids_are_rejected_before_writing() {
        let dir = temp_dir("collide");
        let err = write_pdfs(&dir, &[analysis("gal/1", true), analysis("gal_1", true)]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(!dir.join("gal_1_galaxy_mass_pdf.csv").exists());

        assert!(check_output_ids(["a", "a"]).is_err());
        assert!(check_output_ids(["gal1", "gal2"]).is_ok());
        std::fs::remove_dir_all(&dir).ok();
    }
}
