//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - policy enums (`ZeroErrorPolicy`, `ProbabilityPolicy`, `PdfKind`)
//! - models, observations and filters (`Model`, `Observation`, `FilterSet`)
//! - the run configuration loaded from JSON (`RunConfig`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
