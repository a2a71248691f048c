//! Key-value model store.
//!
//! Models are looked up by their parameter set and redshift. The redshift is
//! rounded to [`REDSHIFT_DECIMALS`] decimals so that observation redshifts
//! match tabulated ones; parameter values must match exactly.

use std::collections::HashMap;
use std::fmt;

use crate::domain::{Model, ParameterSet};
use crate::error::FitError;
use crate::models::SedSynthesizer;

pub const REDSHIFT_DECIMALS: i32 = 4;

/// Hashable identity of a stored model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    params: Vec<(String, u64)>,
    redshift: i64,
}

impl ModelKey {
    pub fn new(params: &ParameterSet, redshift: f64) -> Self {
        let scale = 10f64.powi(REDSHIFT_DECIMALS);
        Self {
            params: params
                .iter()
                .map(|(name, value)| (name.to_string(), normalized_bits(value)))
                .collect(),
            redshift: (redshift * scale).round() as i64,
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .params
            .iter()
            .map(|(name, bits)| format!("{name}={}", f64::from_bits(*bits)))
            .collect();
        let scale = 10f64.powi(REDSHIFT_DECIMALS);
        write!(f, "{{{}}} at z={}", parts.join(", "), self.redshift as f64 / scale)
    }
}

/// `-0.0` and `0.0` are the same parameter value.
fn normalized_bits(value: f64) -> u64 {
    if value == 0.0 { 0.0f64.to_bits() } else { value.to_bits() }
}

pub trait ModelStore {
    fn get(&self, params: &ParameterSet, redshift: f64) -> Option<&Model>;
    fn put(&mut self, model: Model);
}

/// In-memory model store.
#[derive(Debug, Clone, Default)]
pub struct MemoryModelStore {
    models: HashMap<ModelKey, Model>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelStore for MemoryModelStore {
    fn get(&self, params: &ParameterSet, redshift: f64) -> Option<&Model> {
        self.models.get(&ModelKey::new(params, redshift))
    }

    /// Inserting a model with an existing key replaces the stored one.
    fn put(&mut self, model: Model) {
        let key = ModelKey::new(&model.params, model.redshift);
        self.models.insert(key, model);
    }
}

/// Synthesizer backed by a pre-computed store; a missing key is an error.
pub struct StoreSynthesizer<'a, S> {
    store: &'a S,
}

impl<'a, S> StoreSynthesizer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

impl<S> SedSynthesizer for StoreSynthesizer<'_, S>
where
    S: ModelStore + Sync,
{
    fn synthesize(&self, params: &ParameterSet, redshift: f64) -> Result<Model, FitError> {
        self.store
            .get(params, redshift)
            .cloned()
            .ok_or_else(|| FitError::ModelNotFound(ModelKey::new(params, redshift).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn model(age: f64, z: f64, flux: f64) -> Model {
        let mut params = ParameterSet::new();
        params.insert("age", age);
        Model {
            params,
            redshift: z,
            fluxes: vec![flux],
            variables: BTreeMap::new(),
        }
    }

    #[test]
    fn lookup_rounds_redshift() {
        let mut store = MemoryModelStore::new();
        store.put(model(100.0, 0.1234, 1.0));
        let m = store.get(&model(100.0, 0.0, 0.0).params, 0.123_41).unwrap();
        assert_eq!(m.fluxes, vec![1.0]);
        assert!(store.get(&model(100.0, 0.0, 0.0).params, 0.1235).is_none());
    }

    #[test]
    fn put_replaces_existing_key() {
        let mut store = MemoryModelStore::new();
        store.put(model(100.0, 0.5, 1.0));
        store.put(model(100.0, 0.5, 2.0));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&model(100.0, 0.5, 0.0).params, 0.5).unwrap().fluxes, vec![2.0]);
    }

    #[test]
    fn store_synthesizer_reports_missing_models() {
        let mut store = MemoryModelStore::new();
        store.put(model(100.0, 0.5, 1.0));
        let synth = StoreSynthesizer::new(&store);

        assert!(synth.synthesize(&model(100.0, 0.5, 0.0).params, 0.5).is_ok());
        let err = synth.synthesize(&model(200.0, 0.5, 0.0).params, 0.5).unwrap_err();
        match err {
            FitError::ModelNotFound(key) => assert_eq!(key, "{age=200} at z=0.5"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
