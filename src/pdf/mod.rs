//! Probability density estimates from a discrete, probability-weighted sample.
//!
//! Two interchangeable policies:
//!
//! - [`PdfPolicy::Binned`]: evenly populated bins, each carrying its summed
//!   probability and a probability-weighted representative value
//! - [`PdfPolicy::Kde`]: Gaussian kernel density over a pseudo-resampled set,
//!   evaluated on a linear grid
//!
//! Both policies return `Ok(None)` when no estimate can be built (no finite
//! value for the binned policy, a degenerate pooled sample for the kernel
//! density); callers skip and report.

pub mod binned;
pub mod kde;

pub use binned::*;
pub use kde::*;

use serde::{Deserialize, Serialize};

use crate::domain::{PdfConfig, PdfKind};
use crate::error::FitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdfPolicy {
    Binned { max_bins: usize },
    Kde { grid_points: usize },
}

impl PdfPolicy {
    /// Policy selected by a run configuration (`None` disables PDFs).
    pub fn from_config(config: &PdfConfig) -> Option<Self> {
        match config.kind {
            PdfKind::None => None,
            PdfKind::Binned => Some(PdfPolicy::Binned {
                max_bins: config.max_bins,
            }),
            PdfKind::Kde => Some(PdfPolicy::Kde {
                grid_points: config.grid_points,
            }),
        }
    }
}

/// One bin of a binned PDF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfBin {
    pub bin_start: f64,
    pub bin_end: f64,
    pub value: f64,
    pub probability: f64,
}

/// One grid point of a kernel-density PDF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityPoint {
    pub value: f64,
    pub density: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "points", rename_all = "lowercase")]
pub enum Pdf {
    Binned(Vec<PdfBin>),
    Density(Vec<DensityPoint>),
}

impl Pdf {
    pub fn len(&self) -> usize {
        match self {
            Pdf::Binned(bins) => bins.len(),
            Pdf::Density(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Estimate the PDF of `values` weighted by `probabilities`.
pub fn estimate_pdf(values: &[f64], probabilities: &[f64], policy: PdfPolicy) -> Result<Option<Pdf>, FitError> {
    match policy {
        PdfPolicy::Binned { max_bins } => {
            binned_pdf(values, probabilities, max_bins).map(|b| b.map(Pdf::Binned))
        }
        PdfPolicy::Kde { grid_points } => {
            kde_pdf(values, probabilities, grid_points).map(|d| d.map(Pdf::Density))
        }
    }
}
