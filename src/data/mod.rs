//! Derived catalogues.

pub mod mock;

pub use mock::*;
