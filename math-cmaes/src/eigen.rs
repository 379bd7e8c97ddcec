use ndarray::{Array1, Array2};

#[cfg(feature = "ndarray-linalg")]
use ndarray_linalg::{Eigh, UPLO};

const MAX_SWEEPS: usize = 64;

/// Eigen-decomposition of a symmetric matrix.
///
/// Returns the eigenvalues and the matrix whose columns are the matching
/// orthonormal eigenvectors. Only the symmetric part of `a` is meaningful.
/// Uses LAPACK `syevd` with the `ndarray-linalg` feature and falls back to
/// Jacobi sweeps without it or when LAPACK fails.
pub(crate) fn symmetric_eigen(a: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    #[cfg(feature = "ndarray-linalg")]
    {
        match a.eigh(UPLO::Lower) {
            Ok(pair) => return pair,
            Err(e) => log::debug!("eigh failed, using Jacobi sweeps: {}", e),
        }
    }
    jacobi_eigen(a)
}

/// Cyclic Jacobi rotations, eigenvalues in diagonal order.
fn jacobi_eigen(a: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut m = a.clone();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..MAX_SWEEPS {
        let mut off = 0.0;
        let mut diag = 0.0;
        for p in 0..n {
            diag += m[[p, p]] * m[[p, p]];
            for q in (p + 1)..n {
                off += m[[p, q]] * m[[p, q]];
            }
        }
        if off <= 1e-30 * diag || off == 0.0 {
            break;
        }

        for p in 0..n.saturating_sub(1) {
            for q in (p + 1)..n {
                let apq = m[[p, q]];
                if apq.abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (m[[q, q]] - m[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let mkp = m[[k, p]];
                    let mkq = m[[k, q]];
                    m[[k, p]] = c * mkp - s * mkq;
                    m[[k, q]] = s * mkp + c * mkq;
                }
                for k in 0..n {
                    let mpk = m[[p, k]];
                    let mqk = m[[q, k]];
                    m[[p, k]] = c * mpk - s * mqk;
                    m[[q, k]] = s * mpk + c * mqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = Array1::from_iter((0..n).map(|i| m[[i, i]]));
    (eigenvalues, v)
}
