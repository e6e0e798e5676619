//! Linear least squares solver.
//!
//! Every Levenberg–Marquardt iteration solves a small damped linear problem
//! of the form:
//!
//! ```text
//! minimize ‖J δ + r‖² + λ Σ d_j δ_j²
//! ```
//!
//! which we write as one tall least-squares system `[J; √(λD)] δ = [-r; 0]`.
//!
//! Implementation choices:
//! - SVD solves the tall system robustly even when `J` alone is nearly
//!   rank-deficient (the damping rows keep the augmented matrix full rank).
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Parameter dimension is tiny (3–6 columns), so SVD cost is negligible.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Smallest-to-largest singular value ratio of `x` after scaling each column
/// to unit norm. Returns `0.0` when any column is identically zero.
pub fn column_condition(x: &DMatrix<f64>) -> f64 {
    let mut scaled = x.clone();
    for mut col in scaled.column_iter_mut() {
        let norm = col.norm();
        if !(norm.is_finite() && norm > 0.0) {
            return 0.0;
        }
        col /= norm;
    }
    let sv = scaled.singular_values();
    let max = sv.max();
    if !(max.is_finite() && max > 0.0) {
        return 0.0;
    }
    sv.min() / max
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
    fn column_condition_flags_collinear_and_zero_columns() {
        let good = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        assert!(column_condition(&good) > 0.1);

        let collinear = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        assert!(column_condition(&collinear) < 1e-12);

        let zero = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 2.0, 0.0]);
        assert_eq!(column_condition(&zero), 0.0);
    }
}
