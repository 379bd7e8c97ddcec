//! Least-squares problem abstraction.

use ndarray::{Array1, Array2};

/// A residual function `r: R^n -> R^m` with mutable parameter state.
///
/// The solver moves the problem through parameter space with
/// [`set_params`](Self::set_params) and reads residuals back. Evaluating the
/// residual may update cached state, hence `&mut self`.
pub trait LeastSquaresProblem {
    /// Current parameter vector.
    fn params(&self) -> Array1<f64>;

    /// Move the problem to a new parameter vector.
    fn set_params(&mut self, x: &Array1<f64>);

    /// Residual vector at the current parameters.
    fn residuals(&mut self) -> Array1<f64>;

    /// Analytic Jacobian (`m x n`) at the current parameters.
    ///
    /// Returns `None` when not available, the solver then uses forward
    /// differences.
    fn jacobian(&mut self) -> Option<Array2<f64>> {
        None
    }
}

/// Forward-difference Jacobian around `x`, where `r` is the residual at `x`.
///
/// The problem is left at `x`. Returns the matrix and the number of residual
/// evaluations spent.
pub fn forward_difference_jacobian<P: LeastSquaresProblem + ?Sized>(
    problem: &mut P,
    x: &Array1<f64>,
    r: &Array1<f64>,
    step: f64,
) -> (Array2<f64>, usize) {
    let n = x.len();
    let m = r.len();
    let mut jac = Array2::zeros((m, n));
    let mut xp = x.clone();

    for j in 0..n {
        let h = step * x[j].abs().max(1.0);
        xp[j] = x[j] + h;
        problem.set_params(&xp);
        let rp = problem.residuals();
        for i in 0..m.min(rp.len()) {
            jac[[i, j]] = (rp[i] - r[i]) / h;
        }
        xp[j] = x[j];
    }
    problem.set_params(x);

    (jac, n)
}
