//! Model providers.
//!
//! The kernel never synthesises spectra itself. It asks a [`SedSynthesizer`]
//! for the fluxes of a parameter set at a redshift; [`MemoryModelStore`] plus
//! [`StoreSynthesizer`] serve pre-computed model tables.

pub mod store;
pub mod synth;

pub use store::*;
pub use synth::*;
