//! `sed-fit` library crate.
//!
//! The binary (`sedfit`) is a thin wrapper around this library so that:
//!
//! - the statistical kernel is testable without spawning processes
//! - flux synthesis can be plugged in from other crates through
//!   [`models::SedSynthesizer`]
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod pdf;
pub mod report;
