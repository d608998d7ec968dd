//! Least squares solver.
//!
//! The linear channel models are fitted by solving
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! over lagged window rows. Lagged macro series are often close to collinear
//! (a trending CPI column and the intercept, for example), so we solve through
//! an SVD and drop singular values that are negligible relative to the largest
//! one. That yields the minimum-norm solution on rank-deficient designs and
//! works for tall and wide matrices alike.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if no finite solution is found.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() == 0 || x.ncols() == 0 || x.nrows() != y.len() {
        return None;
    }

    let svd = x.clone().svd(true, true);
    let sigma_max = svd.singular_values.iter().copied().fold(0.0, f64::max);
    if !(sigma_max.is_finite() && sigma_max > 0.0) {
        return None;
    }

    // Try progressively looser relative cut-offs.
    for &rel in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, rel * sigma_max) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
