//! Run configuration (JSON).
//!
//! A run file names the active filters, the parameter grid, which variables to
//! analyse and how. Every field except `filters` has a default so the smallest
//! valid file is `{"filters": ["FUV", "NUV"]}`.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{GALAXY_MASS, PdfKind, ProbabilityPolicy, ZeroErrorPolicy};
use crate::error::AppError;

/// Default maximum number of bins for the binned PDF.
pub const DEFAULT_PDF_MAX_BINS: usize = 50;
/// Number of points of the kernel-density grid.
pub const PDF_NB_POINTS: usize = 1000;

/// Parameters of the error pre-processing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrorAdjustment {
    pub default_error_factor: f64,
    pub systematic_deviation: f64,
    pub zero_error_policy: ZeroErrorPolicy,
}

impl Default for ErrorAdjustment {
    fn default() -> Self {
        Self {
            default_error_factor: 0.1,
            systematic_deviation: 0.1,
            zero_error_policy: ZeroErrorPolicy::ScaleError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PdfConfig {
    pub kind: PdfKind,
    pub max_bins: usize,
    pub grid_points: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            kind: PdfKind::Binned,
            max_bins: DEFAULT_PDF_MAX_BINS,
            grid_points: PDF_NB_POINTS,
        }
    }
}

/// One axis of the parameter grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterAxis {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub filters: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterAxis>,
    #[serde(default)]
    pub analysed_variables: Vec<String>,
    /// Analysed variables that are multiplied by the normalisation factor.
    #[serde(default)]
    pub mass_proportional_variables: Vec<String>,
    #[serde(default)]
    pub error_adjustment: ErrorAdjustment,
    #[serde(default)]
    pub probability_policy: ProbabilityPolicy,
    #[serde(default)]
    pub pdf: PdfConfig,
    /// Write the (value, reduced χ²) pairs for every observation and variable.
    #[serde(default)]
    pub save_chi2: bool,
    /// Dump the full results tensor as JSON.
    #[serde(default)]
    pub save_tensor: bool,
    #[serde(default)]
    pub cores: Option<usize>,
    /// Log progress every this many evaluated models.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

fn default_progress_every() -> usize {
    100
}

impl RunConfig {
    /// Read and validate a JSON run file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::new(2, format!("Failed to open config '{}': {e}", path.display())))?;
        let config: RunConfig = serde_json::from_reader(file)
            .map_err(|e| AppError::new(2, format!("Invalid config JSON '{}': {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.filters.is_empty() {
            return Err(AppError::new(2, "Config must name at least one filter."));
        }
        ensure_unique("filter", self.filters.iter().map(String::as_str))?;
        ensure_unique("parameter", self.parameters.iter().map(|p| p.name.as_str()))?;
        ensure_unique("analysed variable", self.analysed_variables.iter().map(String::as_str))?;

        for axis in &self.parameters {
            if axis.values.is_empty() {
                return Err(AppError::new(
                    2,
                    format!("Parameter '{}' has no values.", axis.name),
                ));
            }
            if axis.values.iter().any(|v| !v.is_finite()) {
                return Err(AppError::new(
                    2,
                    format!("Parameter '{}' has non-finite values.", axis.name),
                ));
            }
        }

        if self.analysed_variables.iter().any(|v| v == GALAXY_MASS) {
            return Err(AppError::new(
                2,
                format!("'{GALAXY_MASS}' is always analysed and cannot be listed as a variable."),
            ));
        }

        for name in &self.mass_proportional_variables {
            if !self.analysed_variables.contains(name) {
                return Err(AppError::new(
                    2,
                    format!("Mass-proportional variable '{name}' is not an analysed variable."),
                ));
            }
        }

        let adj = &self.error_adjustment;
        if !(adj.default_error_factor.is_finite() && adj.default_error_factor >= 0.0) {
            return Err(AppError::new(2, "Invalid default_error_factor setting."));
        }
        if !(adj.systematic_deviation.is_finite() && adj.systematic_deviation >= 0.0) {
            return Err(AppError::new(2, "Invalid systematic_deviation setting."));
        }

        if self.pdf.max_bins == 0 {
            return Err(AppError::new(2, "pdf.max_bins must be >= 1."));
        }
        if self.pdf.grid_points < 2 {
            return Err(AppError::new(2, "pdf.grid_points must be >= 2."));
        }
        if self.cores == Some(0) {
            return Err(AppError::new(2, "cores must be >= 1."));
        }
        if self.progress_every == 0 {
            return Err(AppError::new(2, "progress_every must be >= 1."));
        }
        Ok(())
    }

    pub fn is_mass_proportional(&self, variable: &str) -> bool {
        self.mass_proportional_variables.iter().any(|v| v == variable)
    }
}

fn ensure_unique<'a>(what: &str, names: impl Iterator<Item = &'a str>) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(AppError::new(2, format!("Duplicate {what} '{name}' in config.")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"filters": ["FUV", "NUV"]}"#).unwrap();
        config.validate().unwrap();
        assert_eq!(config.error_adjustment, ErrorAdjustment::default());
        assert_eq!(config.probability_policy, ProbabilityPolicy::ExpHalfChi2);
        assert_eq!(config.pdf.kind, PdfKind::Binned);
        assert_eq!(config.pdf.max_bins, 50);
        assert_eq!(config.progress_every, 100);
    }

    #[test]
    fn policies_parse_from_snake_case() {
        let config: RunConfig = serde_json::from_str(
            r#"{
                "filters": ["r"],
                "error_adjustment": {"zero_error_policy": "flux_fraction"},
                "probability_policy": "exp_half_reduced_chi2",
                "pdf": {"kind": "kde"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.error_adjustment.zero_error_policy, ZeroErrorPolicy::FluxFraction);
        assert_eq!(config.error_adjustment.systematic_deviation, 0.1);
        assert_eq!(config.probability_policy, ProbabilityPolicy::ExpHalfReducedChi2);
        assert_eq!(config.pdf.kind, PdfKind::Kde);
        assert_eq!(config.pdf.grid_points, 1000);
    }

    #[test]
    fn rejects_duplicate_filters() {
        let config: RunConfig = serde_json::from_str(r#"{"filters": ["r", "r"]}"#).unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn rejects_unknown_mass_proportional_variable() {
        let config: RunConfig = serde_json::from_str(
            r#"{"filters": ["r"], "analysed_variables": ["age"], "mass_proportional_variables": ["sfr"]}"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn galaxy_mass_is_reserved() {
        let config: RunConfig =
            serde_json::from_str(r#"{"filters": ["r"], "analysed_variables": ["galaxy_mass"]}"#).unwrap();
        assert_eq!(config.validate().unwrap_err().exit_code(), 2);
    }
}
