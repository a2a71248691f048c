//! Least squares helpers.
//!
//! Used by the mock analysis to regress estimated values against the exact
//! ones. The system is tiny (two columns), so an SVD solve is cheap and copes
//! with tall, possibly ill-conditioned design matrices.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Straight line `y = slope·x + intercept` with its coefficient of determination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Ordinary least squares line through `(x, y)`.
///
/// Returns `None` for fewer than two points, mismatched lengths or a
/// degenerate system.
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<LineFit> {
    let n = x.len();
    if n < 2 || y.len() != n {
        return None;
    }

    let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { x[i] });
    let target = DVector::from_column_slice(y);
    let beta = solve_least_squares(&design, &target)?;
    let (intercept, slope) = (beta[0], beta[1]);

    let y_mean = target.mean();
    let ss_tot: f64 = y.iter().map(|v| (v - y_mean) * (v - y_mean)).sum();
    let ss_res: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - (slope * xi + intercept);
            r * r
        })
        .sum();
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    Some(LineFit {
        slope,
        intercept,
        r_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn exact_line_has_unit_r_squared() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [1.5, 2.0, 2.5, 3.0];
        let line = fit_line(&x, &y).unwrap();
        assert!((line.slope - 0.5).abs() < 1e-10);
        assert!((line.intercept - 1.0).abs() < 1e-10);
        assert!((line.r_squared - 1.0).abs() < 1e-10);
    }

    #[test]
    fn too_few_points() {
        assert!(fit_line(&[1.0], &[1.0]).is_none());
        assert!(fit_line(&[1.0, 2.0], &[1.0]).is_none());
    }
}
