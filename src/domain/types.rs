//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during grid evaluation
//! - exported to JSON/CSV
//! - reloaded later for comparisons (mock analysis)

use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Threshold under which any flux or error is considered to be zero.
pub const TOLERANCE: f64 = 1e-12;

/// Reduced χ² reported for unfittable pairs, and the cap for every other pair.
pub const MAX_REDUCED_CHI2: f64 = 99.0;

/// Name under which the normalisation factor is analysed.
pub const GALAXY_MASS: &str = "galaxy_mass";

/// How errors below [`TOLERANCE`] are handled before the systematic term is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ZeroErrorPolicy {
    /// `error = default_error_factor * error`.
    ///
    /// The replacement scales an already negligible error, so it stays
    /// negligible. Kept as the default to reproduce historical results.
    #[default]
    ScaleError,
    /// `error = default_error_factor * flux`.
    FluxFraction,
}

/// How the per-pair probability is derived from the χ².
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityPolicy {
    /// `exp(-χ²/2)`: an unnormalised Gaussian likelihood, not divided by the
    /// degrees of freedom.
    #[default]
    ExpHalfChi2,
    /// `exp(-χ²_red/2)`.
    ExpHalfReducedChi2,
}

/// Which PDF estimator to run during aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PdfKind {
    None,
    Binned,
    Kde,
}

/// Ordered physical parameters of one model (name -> value).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, f64>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, "}}")
    }
}

/// Whether a model quantity scales with the fitted normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableScaling {
    Intrinsic,
    /// Quantity is given per unit mass and is multiplied by the normalisation
    /// factor (e.g. star formation rate).
    MassProportional,
}

/// A named scalar physical quantity attached to a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelVariable {
    pub value: f64,
    pub scaling: VariableScaling,
}

impl ModelVariable {
    pub fn intrinsic(value: f64) -> Self {
        Self {
            value,
            scaling: VariableScaling::Intrinsic,
        }
    }

    pub fn mass_proportional(value: f64) -> Self {
        Self {
            value,
            scaling: VariableScaling::MassProportional,
        }
    }

    /// Value as written into the results tensor for a given normalisation.
    pub fn scaled(&self, normalization_factor: f64) -> f64 {
        match self.scaling {
            VariableScaling::Intrinsic => self.value,
            VariableScaling::MassProportional => normalization_factor * self.value,
        }
    }
}

/// A synthesised model: parameters, redshift, one flux per active filter and
/// derived variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub params: ParameterSet,
    pub redshift: f64,
    pub fluxes: Vec<f64>,
    pub variables: BTreeMap<String, ModelVariable>,
}

/// An observed object: per-filter `(flux, error)` pairs at a known redshift.
///
/// `fluxes` and `errors` follow the order of the active [`FilterSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub redshift: f64,
    pub fluxes: Vec<f64>,
    pub errors: Vec<f64>,
}

/// A photometric filter.
///
/// The kernel only uses the name (as an index into flux vectors); the
/// transmission curve and effective wavelength are inputs for synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    /// `(wavelength_nm, transmission)` pairs.
    #[serde(default)]
    pub transmission: Vec<(f64, f64)>,
    #[serde(default)]
    pub effective_wavelength: Option<f64>,
}

impl Filter {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transmission: Vec::new(),
            effective_wavelength: None,
        }
    }
}

/// Ordered registry of the active filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(Filter::named).collect())
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|f| f.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mass_proportional_variables_scale_with_normalisation() {
        let sfr = ModelVariable::mass_proportional(2.0);
        let age = ModelVariable::intrinsic(2.0);
        assert_eq!(sfr.scaled(1e10), 2e10);
        assert_eq!(age.scaled(1e10), 2.0);
    }

    #[test]
    fn parameter_set_display_is_sorted_by_name() {
        let mut p = ParameterSet::new();
        p.insert("tau", 500.0);
        p.insert("age", 1000.0);
        assert_eq!(p.to_string(), "{age=1000, tau=500}");
    }

    #[test]
    fn filter_set_lookup_by_name() {
        let filters = FilterSet::from_names(["FUV", "NUV", "r_prime"]);
        assert_eq!(filters.len(), 3);
        assert!(filters.get("NUV").is_some());
        assert!(filters.get("K").is_none());
        assert_eq!(filters.names().collect::<Vec<_>>(), vec!["FUV", "NUV", "r_prime"]);
    }
}
