use ndarray::{Array1, Array2};

use crate::{Cmaes, CmaesError, Result};

/// Captured distribution state of a [`Cmaes`] run.
///
/// Feeding it back through [`StrategyInit::resume_from`](crate::StrategyInit::resume_from)
/// continues the search from the same mean, step size, covariance and
/// evolution paths. The random stream is not captured.
#[derive(Debug, Clone)]
pub struct CmaesSnapshot {
    /// Distribution mean
    pub mean: Array1<f64>,
    /// Global step size
    pub sigma: f64,
    /// Covariance matrix
    pub cov: Array2<f64>,
    /// Step-size evolution path
    pub p_sigma: Array1<f64>,
    /// Covariance evolution path
    pub p_c: Array1<f64>,
    /// Completed generations
    pub generation: usize,
    /// Consumed evaluations
    pub evaluations: usize,
    /// Best vector so far
    pub best_x: Array1<f64>,
    /// Best fitness so far
    pub best_f: f64,
}

impl Cmaes {
    /// Capture the current distribution state.
    pub fn snapshot(&self) -> CmaesSnapshot {
        CmaesSnapshot {
            mean: self.mean.clone(),
            sigma: self.sigma,
            cov: self.cov.clone(),
            p_sigma: self.p_sigma.clone(),
            p_c: self.p_c.clone(),
            generation: self.generation,
            evaluations: self.evaluations,
            best_x: self.best_x.clone(),
            best_f: self.best_f,
        }
    }

    pub(crate) fn restore(&mut self, snapshot: CmaesSnapshot) -> Result<()> {
        let n = self.params.n;
        for len in [
            snapshot.mean.len(),
            snapshot.p_sigma.len(),
            snapshot.p_c.len(),
            snapshot.best_x.len(),
            snapshot.cov.nrows(),
            snapshot.cov.ncols(),
        ] {
            if len != n {
                return Err(CmaesError::DimensionMismatch {
                    expected: n,
                    got: len,
                });
            }
        }
        if !(snapshot.sigma.is_finite() && snapshot.sigma > 0.0) {
            return Err(CmaesError::NonPositiveSpread {
                index: 0,
                value: snapshot.sigma,
            });
        }

        self.mean = snapshot.mean;
        self.sigma = snapshot.sigma;
        self.cov = snapshot.cov;
        self.p_sigma = snapshot.p_sigma;
        self.p_c = snapshot.p_c;
        self.generation = snapshot.generation;
        self.evaluations = snapshot.evaluations;
        self.current_x = snapshot.best_x.clone();
        self.best_x = snapshot.best_x;
        self.best_f = snapshot.best_f;
        self.update_eigensystem();
        Ok(())
    }
}
