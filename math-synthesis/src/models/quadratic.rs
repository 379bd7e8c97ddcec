use ndarray::{Array1, Array2, ArrayView1};

use crate::model::{Bounds, SynthesisModel};

/// Residual `x - target`: the smallest model with a known optimum.
#[derive(Debug, Clone)]
pub struct QuadraticModel {
    target: Array1<f64>,
    x: Array1<f64>,
    residual: Array1<f64>,
    params: Array1<f64>,
    bounds: Option<Bounds>,
}

impl QuadraticModel {
    /// Unbounded model with its minimum at `target`, mapped at the origin.
    pub fn new(target: Array1<f64>) -> Self {
        let n = target.len();
        Self {
            target,
            x: Array1::zeros(n),
            residual: Array1::zeros(n),
            params: Array1::zeros(n),
            bounds: None,
        }
    }

    /// Attach box constraints.
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Location of the minimum.
    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }
}

impl SynthesisModel for QuadraticModel {
    fn dim(&self) -> usize {
        self.target.len()
    }

    fn residual_dim(&self) -> usize {
        self.target.len()
    }

    fn bounds(&self) -> Option<Bounds> {
        self.bounds.clone()
    }

    fn map_to_x(&self, x: &mut Array1<f64>) {
        x.assign(&self.x);
    }

    fn map_from_x(&mut self, x: ArrayView1<f64>) {
        self.x.assign(&x);
    }

    fn map_to_fvec(&self, fvec: &mut Array1<f64>) {
        fvec.assign(&self.residual);
    }

    fn calc(&mut self) {
        self.residual = &self.x - &self.target;
    }

    fn params(&self) -> &Array1<f64> {
        &self.params
    }

    fn params_mut(&mut self) -> &mut Array1<f64> {
        &mut self.params
    }

    fn jacobian(&mut self) -> Option<Array2<f64>> {
        Some(Array2::eye(self.target.len()))
    }
}
