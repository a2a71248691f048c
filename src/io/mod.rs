//! Input/output helpers.
//!
//! - observation CSV ingest (`observations`)
//! - model table CSV ingest into a model store (`model_table`)
//! - result exports (CSV/JSON) (`export`)

pub mod export;
pub mod model_table;
pub mod observations;

pub use export::*;
pub use model_table::*;
pub use observations::*;
