//! The kinematic model as seen by the driver.

use ndarray::{Array1, Array2, ArrayView1, Zip};

use crate::error::{Result, SynthesisError};

/// Box constraints on the optimization vector, `lower[i] <= upper[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub(crate) lower: Array1<f64>,
    pub(crate) upper: Array1<f64>,
}

impl Bounds {
    /// Validated bounds.
    ///
    /// # Errors
    ///
    /// `BoundsMismatch` on different lengths, `InvalidBounds` when a pair is
    /// reversed or not finite.
    pub fn new(lower: Array1<f64>, upper: Array1<f64>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(SynthesisError::BoundsMismatch {
                lower_len: lower.len(),
                upper_len: upper.len(),
            });
        }
        for (index, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if !(lo.is_finite() && hi.is_finite()) || lo > hi {
                return Err(SynthesisError::InvalidBounds {
                    index,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// Same interval `[lo, hi]` for every one of `n` parameters.
    pub fn uniform(n: usize, lo: f64, hi: f64) -> Result<Self> {
        Self::new(Array1::from_elem(n, lo), Array1::from_elem(n, hi))
    }

    /// Build from `(lower, upper)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self> {
        Self::new(
            pairs.iter().map(|p| p.0).collect(),
            pairs.iter().map(|p| p.1).collect(),
        )
    }

    /// Number of bounded parameters.
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    /// `true` when there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Lower bounds.
    pub fn lower(&self) -> &Array1<f64> {
        &self.lower
    }

    /// Upper bounds.
    pub fn upper(&self) -> &Array1<f64> {
        &self.upper
    }

    /// Midpoint of every interval.
    pub fn centre(&self) -> Array1<f64> {
        (&self.lower + &self.upper) * 0.5
    }

    /// Half width of every interval, used as the initial spread.
    pub fn half_width(&self) -> Array1<f64> {
        (&self.upper - &self.lower) * 0.5
    }

    /// `true` if `x` lies inside the box componentwise.
    pub fn contains(&self, x: ArrayView1<f64>) -> bool {
        x.len() == self.len()
            && Zip::from(&x)
                .and(&self.lower)
                .and(&self.upper)
                .all(|&v, &lo, &hi| lo <= v && v <= hi)
    }

    /// Copy of `x` projected onto the box.
    pub fn clip(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let mut out = x.to_owned();
        Zip::from(&mut out)
            .and(&self.lower)
            .and(&self.upper)
            .for_each(|v, &lo, &hi| *v = v.clamp(lo, hi));
        out
    }
}

/// A kinematic synthesis object driven by the optimizer.
///
/// The driver never looks inside the model. It moves it through parameter
/// space with [`map_from_x`](Self::map_from_x), recomputes it with
/// [`calc`](Self::calc) and reads the residual back with
/// [`map_to_fvec`](Self::map_to_fvec).
///
/// Contracts:
/// - `map_from_x` fully determines the model state from the vector;
/// - `map_to_x` and `map_to_fvec` are pure reads;
/// - `map_to_x` writes the canonical form of the current state, which may
///   differ from the vector last passed to `map_from_x` (angles wrapped,
///   lengths normalized, ...).
pub trait SynthesisModel {
    /// Number of free parameters.
    fn dim(&self) -> usize;

    /// Number of residual components.
    fn residual_dim(&self) -> usize;

    /// Box constraints of the parameters, if any.
    fn bounds(&self) -> Option<Bounds> {
        None
    }

    /// Write the canonical parameter vector of the current state into `x`.
    fn map_to_x(&self, x: &mut Array1<f64>);

    /// Set the model state from an optimization vector.
    fn map_from_x(&mut self, x: ArrayView1<f64>);

    /// Write the residual of the last [`calc`](Self::calc) into `fvec`.
    fn map_to_fvec(&self, fvec: &mut Array1<f64>);

    /// Recompute every branch of the model for the current state.
    fn calc(&mut self);

    /// Externally visible parameter vector.
    fn params(&self) -> &Array1<f64>;

    /// Mutable access to the externally visible parameter vector.
    fn params_mut(&mut self) -> &mut Array1<f64>;

    /// Refresh [`params`](Self::params) from the current state.
    fn sync_params(&mut self) {
        let mut x = Array1::zeros(self.dim());
        self.map_to_x(&mut x);
        self.params_mut().assign(&x);
    }

    /// Analytic Jacobian of the residual (`residual_dim x dim`) at the
    /// current state, if the model has one.
    fn jacobian(&mut self) -> Option<Array2<f64>> {
        None
    }
}
