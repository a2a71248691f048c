//! Statistical kernel: error adjustment, flux comparison, weighted moments,
//! evenly populated binning and least squares.

pub mod binning;
pub mod chi2;
pub mod errors;
pub mod ols;
pub mod weighted;

pub use binning::*;
pub use chi2::*;
pub use errors::*;
pub use ols::*;
pub use weighted::*;
