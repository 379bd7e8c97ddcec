//! Local refinement of a single candidate.

use ndarray::{Array1, Array2};

use math_synthesis_least_squares::{
    LeastSquaresProblem, LevenbergMarquardt, LevenbergMarquardtConfig, LmTermination,
};

use crate::error::RefineError;
use crate::model::SynthesisModel;

/// Outcome of a successful refinement pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RefineReport {
    /// Half squared residual norm at the point left in the model
    pub cost: f64,
    /// Solver iterations
    pub iterations: usize,
    /// Residual evaluations
    pub evaluations: usize,
}

/// Improves the candidate held by a model, in place.
///
/// The model already holds the candidate's mapped state and its canonical
/// parameter vector when `refine` is called. An `Err` means "no local
/// improvement for this candidate": the driver still scores whatever state
/// the refiner left behind.
pub trait LocalRefiner<M: ?Sized> {
    /// Refine the candidate currently mapped into `model`.
    fn refine(&mut self, model: &mut M) -> Result<RefineReport, RefineError>;
}

/// Default refiner: Levenberg-Marquardt on the model residual.
///
/// Uses the model's analytic Jacobian when it has one, forward differences
/// otherwise. The model is always left mapped at the best point found, which
/// is the start point when no step was accepted.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardtRefiner {
    solver: LevenbergMarquardt,
}

impl LevenbergMarquardtRefiner {
    /// Refiner with the given solver settings.
    pub fn new(config: LevenbergMarquardtConfig) -> Self {
        Self {
            solver: LevenbergMarquardt::new(config),
        }
    }
}

impl<M: SynthesisModel + ?Sized> LocalRefiner<M> for LevenbergMarquardtRefiner {
    fn refine(&mut self, model: &mut M) -> Result<RefineReport, RefineError> {
        let mut problem = ModelProblem { model };
        let report = self.solver.minimize(&mut problem)?;
        match report.termination {
            LmTermination::MaxIterations | LmTermination::NoImprovement => {
                Err(RefineError::NotConverged {
                    termination: report.termination,
                    cost: report.cost,
                })
            }
            _ => Ok(RefineReport {
                cost: report.cost,
                iterations: report.iterations,
                evaluations: report.evaluations,
            }),
        }
    }
}

/// Least-squares view of a synthesis model.
struct ModelProblem<'a, M: ?Sized> {
    model: &'a mut M,
}

impl<M: SynthesisModel + ?Sized> LeastSquaresProblem for ModelProblem<'_, M> {
    fn params(&self) -> Array1<f64> {
        let mut x = Array1::zeros(self.model.dim());
        self.model.map_to_x(&mut x);
        x
    }

    fn set_params(&mut self, x: &Array1<f64>) {
        self.model.map_from_x(x.view());
    }

    fn residuals(&mut self) -> Array1<f64> {
        let mut fvec = Array1::zeros(self.model.residual_dim());
        self.model.calc();
        self.model.map_to_fvec(&mut fvec);
        fvec
    }

    fn jacobian(&mut self) -> Option<Array2<f64>> {
        self.model.jacobian()
    }
}
