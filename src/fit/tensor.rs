//! Results tensor: `(model, observation, statistic)` in row-major order.
//!
//! Statistic columns:
//!
//! - [`REDUCED_CHI2`]
//! - [`PROBABILITY`]
//! - [`NORMALIZATION`] (also the `galaxy_mass` estimate)
//! - [`FIRST_VARIABLE`].. one column per analysed variable
//!
//! Cells are NaN until written.

use serde::Serialize;

use crate::error::FitError;

pub const REDUCED_CHI2: usize = 0;
pub const PROBABILITY: usize = 1;
pub const NORMALIZATION: usize = 2;
pub const FIRST_VARIABLE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsTensor {
    n_models: usize,
    n_observations: usize,
    n_statistics: usize,
    /// Statistic names, in column order.
    statistics: Vec<String>,
    data: Vec<f64>,
}

impl ResultsTensor {
    /// Allocate a NaN-filled tensor for `variables` on top of the three fit
    /// statistics.
    pub fn new(n_models: usize, n_observations: usize, variables: &[String]) -> Self {
        let mut statistics = vec![
            "reduced_chi2".to_string(),
            "probability".to_string(),
            "normalization_factor".to_string(),
        ];
        statistics.extend(variables.iter().cloned());
        let n_statistics = statistics.len();
        Self {
            n_models,
            n_observations,
            n_statistics,
            statistics,
            data: vec![f64::NAN; n_models * n_observations * n_statistics],
        }
    }

    pub fn n_models(&self) -> usize {
        self.n_models
    }

    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    pub fn n_statistics(&self) -> usize {
        self.n_statistics
    }

    pub fn statistics(&self) -> &[String] {
        &self.statistics
    }

    /// Column index of a named statistic.
    pub fn statistic_index(&self, name: &str) -> Option<usize> {
        self.statistics.iter().position(|s| s == name)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn offset(&self, model: usize, observation: usize, statistic: usize) -> Result<usize, FitError> {
        if model >= self.n_models || observation >= self.n_observations || statistic >= self.n_statistics {
            return Err(FitError::InvalidArgument(format!(
                "tensor index ({model}, {observation}, {statistic}) out of range ({}, {}, {})",
                self.n_models, self.n_observations, self.n_statistics
            )));
        }
        Ok((model * self.n_observations + observation) * self.n_statistics + statistic)
    }

    pub fn get(&self, model: usize, observation: usize, statistic: usize) -> Result<f64, FitError> {
        Ok(self.data[self.offset(model, observation, statistic)?])
    }

    pub fn set(&mut self, model: usize, observation: usize, statistic: usize, value: f64) -> Result<(), FitError> {
        let i = self.offset(model, observation, statistic)?;
        self.data[i] = value;
        Ok(())
    }

    /// One statistic for one observation across every model, in grid order.
    pub fn column(&self, observation: usize, statistic: usize) -> Result<Vec<f64>, FitError> {
        if self.n_models == 0 {
            return Ok(Vec::new());
        }
        (0..self.n_models)
            .map(|m| self.get(m, observation, statistic))
            .collect()
    }

    /// Length of one model's slice (all observations, all statistics).
    pub fn model_stride(&self) -> usize {
        self.n_observations * self.n_statistics
    }

    /// Mutable per-model slices, for parallel filling.
    pub(crate) fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// True once no cell is left at the NaN sentinel.
    pub fn is_complete(&self) -> bool {
        self.data.iter().all(|v| !v.is_nan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tensor_is_nan_filled() {
        let t = ResultsTensor::new(2, 3, &["age".to_string()]);
        assert_eq!(t.n_statistics(), 4);
        assert_eq!(t.statistic_index("age"), Some(FIRST_VARIABLE));
        assert!(t.get(1, 2, 3).unwrap().is_nan());
        assert!(!t.is_complete());
    }

    #[test]
    fn set_and_column_follow_model_order() {
        let mut t = ResultsTensor::new(3, 2, &[]);
        for m in 0..3 {
            t.set(m, 1, REDUCED_CHI2, m as f64 * 10.0).unwrap();
        }
        assert_eq!(t.column(1, REDUCED_CHI2).unwrap(), vec![0.0, 10.0, 20.0]);
        assert!(t.column(0, REDUCED_CHI2).unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let mut t = ResultsTensor::new(1, 1, &[]);
        assert!(t.get(1, 0, 0).is_err());
        assert!(t.set(0, 0, 3, 1.0).is_err());
    }

    #[test]
    fn zero_extent_tensor_is_trivially_complete() {
        let t = ResultsTensor::new(0, 5, &[]);
        assert!(t.is_empty());
        assert!(t.is_complete());
        assert!(t.column(0, PROBABILITY).unwrap().is_empty());
    }
}
