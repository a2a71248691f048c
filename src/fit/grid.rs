//! Parameter grid generation.
//!
//! The model grid is the cartesian product of every parameter's value list.
//! The first axis varies slowest, so grid indices are stable for a given
//! configuration and can be used to address the results tensor.

use crate::domain::{ParameterAxis, ParameterSet};
use crate::error::FitError;

/// Number of combinations without materialising them.
pub fn grid_size(axes: &[ParameterAxis]) -> usize {
    if axes.is_empty() {
        return 0;
    }
    axes.iter().map(|a| a.values.len()).product()
}

/// All parameter combinations.
///
/// An empty axis list yields an empty grid; an axis without values is an error.
pub fn expand_parameter_grid(axes: &[ParameterAxis]) -> Result<Vec<ParameterSet>, FitError> {
    if let Some(axis) = axes.iter().find(|a| a.values.is_empty()) {
        return Err(FitError::InvalidArgument(format!(
            "parameter '{}' has no values",
            axis.name
        )));
    }
    if axes.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::with_capacity(grid_size(axes));
    let mut idx = vec![0usize; axes.len()];
    loop {
        out.push(
            axes.iter()
                .zip(&idx)
                .map(|(axis, &i)| (axis.name.clone(), axis.values[i]))
                .collect(),
        );

        // Odometer increment, last axis fastest.
        let mut pos = axes.len();
        loop {
            if pos == 0 {
                return Ok(out);
            }
            pos -= 1;
            idx[pos] += 1;
            if idx[pos] < axes[pos].values.len() {
                break;
            }
            idx[pos] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(name: &str, values: &[f64]) -> ParameterAxis {
        ParameterAxis {
            name: name.to_string(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn expands_all_combinations_first_axis_slowest() {
        let axes = [axis("tau", &[100.0, 1000.0]), axis("age", &[1.0, 2.0, 3.0])];
        let grid = expand_parameter_grid(&axes).unwrap();

        assert_eq!(grid.len(), 6);
        assert_eq!(grid_size(&axes), 6);
        assert_eq!(grid[0].get("tau"), Some(100.0));
        assert_eq!(grid[0].get("age"), Some(1.0));
        assert_eq!(grid[2].get("age"), Some(3.0));
        assert_eq!(grid[3].get("tau"), Some(1000.0));
        assert_eq!(grid[3].get("age"), Some(1.0));
    }

    #[test]
    fn single_valued_axes_give_one_model() {
        let grid = expand_parameter_grid(&[axis("a", &[1.0]), axis("b", &[2.0])]).unwrap();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0].len(), 2);
    }

    #[test]
    fn no_axes_no_models() {
        assert!(expand_parameter_grid(&[]).unwrap().is_empty());
        assert_eq!(grid_size(&[]), 0);
    }

    #[test]
    fn empty_axis_is_an_error() {
        assert!(expand_parameter_grid(&[axis("a", &[1.0]), axis("b", &[])]).is_err());
    }
}
