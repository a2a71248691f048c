//! Grid fitting.
//!
//! Responsibilities:
//!
//! - expand the parameter grid
//! - evaluate every model against every observation (parallel by model)
//! - aggregate the results tensor per observation (best fit, weighted
//!   estimates, PDFs)

pub mod aggregate;
pub mod evaluator;
pub mod grid;
pub mod progress;
pub mod tensor;

pub use aggregate::*;
pub use evaluator::*;
pub use grid::*;
pub use progress::*;
pub use tensor::{
    FIRST_VARIABLE, NORMALIZATION, PROBABILITY, REDUCED_CHI2, ResultsTensor,
};
