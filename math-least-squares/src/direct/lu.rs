//! LU decomposition with partial pivoting for dense real systems.
//!
//! [`lu_solve`] goes through LAPACK when the `ndarray-linalg` feature is on,
//! the pure-Rust factorization is the fallback.

use ndarray::{Array1, Array2};

use crate::error::LuError;

#[cfg(feature = "ndarray-linalg")]
use ndarray_linalg::Solve;

/// Pivots smaller than this are treated as zero.
const PIVOT_EPS: f64 = 1e-30;

/// LU factorization of a square matrix.
///
/// `L` is unit lower triangular and stored below the diagonal of `lu`,
/// `U` on and above it.
#[derive(Debug, Clone)]
pub struct LuFactorization {
    /// Packed L and U factors
    pub lu: Array2<f64>,
    /// Row permutation, `perm[i]` is the source row of row `i`
    pub perm: Vec<usize>,
    /// Matrix dimension
    pub n: usize,
}

impl LuFactorization {
    /// Solve `A x = b` with the stored factors.
    pub fn solve(&self, b: &Array1<f64>) -> Result<Array1<f64>, LuError> {
        if b.len() != self.n {
            return Err(LuError::DimensionMismatch {
                expected: self.n,
                got: b.len(),
            });
        }

        let mut x = Array1::from_iter(self.perm.iter().map(|&p| b[p]));

        // L y = P b
        for i in 0..self.n {
            let mut acc = x[i];
            for j in 0..i {
                acc -= self.lu[[i, j]] * x[j];
            }
            x[i] = acc;
        }

        // U x = y
        for i in (0..self.n).rev() {
            let mut acc = x[i];
            for j in (i + 1)..self.n {
                acc -= self.lu[[i, j]] * x[j];
            }
            let u_ii = self.lu[[i, i]];
            if u_ii.abs() < PIVOT_EPS {
                return Err(LuError::SingularMatrix);
            }
            x[i] = acc / u_ii;
        }

        Ok(x)
    }
}

/// Factorize a square matrix with partial pivoting.
pub fn lu_factorize(a: &Array2<f64>) -> Result<LuFactorization, LuError> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(LuError::DimensionMismatch {
            expected: n,
            got: a.ncols(),
        });
    }

    let mut lu = a.clone();
    let mut perm: Vec<usize> = (0..n).collect();

    for k in 0..n {
        let (max_row, max_val) = (k..n)
            .map(|i| (i, lu[[i, k]].abs()))
            .fold((k, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });

        if !max_val.is_finite() {
            return Err(LuError::NonFinite);
        }
        if max_val < PIVOT_EPS {
            return Err(LuError::SingularMatrix);
        }

        if max_row != k {
            for j in 0..n {
                lu.swap([k, j], [max_row, j]);
            }
            perm.swap(k, max_row);
        }

        let pivot = lu[[k, k]];
        for i in (k + 1)..n {
            let mult = lu[[i, k]] / pivot;
            lu[[i, k]] = mult;
            for j in (k + 1)..n {
                let update = mult * lu[[k, j]];
                lu[[i, j]] -= update;
            }
        }
    }

    Ok(LuFactorization { lu, perm, n })
}

/// Solve `A x = b` by factorizing `A` once.
pub fn lu_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, LuError> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(LuError::DimensionMismatch {
            expected: n,
            got: a.ncols(),
        });
    }
    if b.len() != n {
        return Err(LuError::DimensionMismatch {
            expected: n,
            got: b.len(),
        });
    }

    if a.iter().any(|v| !v.is_finite()) {
        return Err(LuError::NonFinite);
    }

    #[cfg(feature = "ndarray-linalg")]
    {
        let x = a.solve(b).map_err(|_| LuError::SingularMatrix)?;
        if x.iter().all(|v| v.is_finite()) {
            Ok(x)
        } else {
            Err(LuError::SingularMatrix)
        }
    }

    #[cfg(not(feature = "ndarray-linalg"))]
    {
        lu_factorize(a)?.solve(b)
    }
}
