//! Flux synthesis interface.
//!
//! The grid evaluator treats synthesis as an opaque callback
//! `(parameters, redshift) -> Model`. Anything that is `Sync` and implements
//! [`SedSynthesizer`] can be plugged in, including plain closures.

use crate::domain::{Model, ParameterSet};
use crate::error::FitError;

pub trait SedSynthesizer: Sync {
    /// Produce the model for `params` observed at `redshift`.
    ///
    /// The returned flux vector must follow the order of the active filters.
    fn synthesize(&self, params: &ParameterSet, redshift: f64) -> Result<Model, FitError>;
}

impl<F> SedSynthesizer for F
where
    F: Fn(&ParameterSet, f64) -> Result<Model, FitError> + Sync,
{
    fn synthesize(&self, params: &ParameterSet, redshift: f64) -> Result<Model, FitError> {
        self(params, redshift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn closures_are_synthesizers() {
        let synth = |params: &ParameterSet, z: f64| -> Result<Model, FitError> {
            let a = params.get("a").unwrap_or(0.0);
            Ok(Model {
                params: params.clone(),
                redshift: z,
                fluxes: vec![a, a / (1.0 + z)],
                variables: BTreeMap::new(),
            })
        };
        let mut params = ParameterSet::new();
        params.insert("a", 3.0);
        let model = synth.synthesize(&params, 0.5).unwrap();
        assert_eq!(model.fluxes, vec![3.0, 2.0]);
        assert_eq!(model.redshift, 0.5);
    }
}
