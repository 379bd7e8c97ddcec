//! Levenberg-Marquardt solver
//!
//! Minimizes `0.5 * |r(x)|^2` by solving the damped normal equations
//! `(J^T J + lambda * diag(J^T J)) delta = -J^T r` with a dense LU
//! factorization. The damping shrinks after an accepted step and grows after
//! a rejected one.

use ndarray::{Array1, Array2};

use crate::direct::lu_solve;
use crate::error::{LmError, LuError, Result};
use crate::problem::{LeastSquaresProblem, forward_difference_jacobian};

/// Damping above which the solver gives up on finding a descent step.
const MAX_LAMBDA: f64 = 1e16;
/// Floor on the diagonal scaling for columns with no sensitivity.
const MIN_DIAG: f64 = 1e-12;

/// Levenberg-Marquardt configuration
#[derive(Debug, Clone)]
pub struct LevenbergMarquardtConfig {
    /// Maximum number of outer iterations (Jacobian evaluations)
    pub max_iterations: usize,
    /// Starting damping factor
    pub initial_lambda: f64,
    /// Damping multiplier after a rejected step
    pub lambda_increase: f64,
    /// Damping multiplier after an accepted step
    pub lambda_decrease: f64,
    /// Stop when the relative cost reduction of an accepted step is below this
    pub ftol: f64,
    /// Stop when the step is small relative to the parameters
    pub xtol: f64,
    /// Stop when the largest gradient component is below this
    pub gtol: f64,
    /// Relative step of the forward-difference Jacobian
    pub fd_step: f64,
    /// Log progress every N iterations (0 = no output)
    pub print_interval: usize,
}

impl Default for LevenbergMarquardtConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            initial_lambda: 1e-3,
            lambda_increase: 10.0,
            lambda_decrease: 0.1,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
            fd_step: 1e-7,
            print_interval: 0,
        }
    }
}

/// Why a Levenberg-Marquardt run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LmTermination {
    /// The residual is exactly zero.
    ZeroResidual,
    /// Relative cost reduction fell below `ftol`.
    Ftol,
    /// Step length fell below `xtol`.
    Xtol,
    /// Gradient fell below `gtol`.
    Gtol,
    /// No step reduced the cost before the damping blew up.
    NoImprovement,
    /// `max_iterations` reached.
    MaxIterations,
}

impl LmTermination {
    /// `true` for the tolerance-based exits.
    pub fn converged(&self) -> bool {
        matches!(
            self,
            LmTermination::ZeroResidual
                | LmTermination::Ftol
                | LmTermination::Xtol
                | LmTermination::Gtol
        )
    }
}

/// Result of a Levenberg-Marquardt run.
#[derive(Debug, Clone)]
pub struct LmReport {
    /// Best parameters found; the problem is left at this point
    pub x: Array1<f64>,
    /// `0.5 * |r(x)|^2`
    pub cost: f64,
    /// Number of outer iterations
    pub iterations: usize,
    /// Number of residual evaluations, finite differences included
    pub evaluations: usize,
    /// Exit condition
    pub termination: LmTermination,
}

/// Levenberg-Marquardt least-squares solver.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: LevenbergMarquardtConfig,
}

fn half_sq_norm(r: &Array1<f64>) -> f64 {
    0.5 * r.dot(r)
}

impl LevenbergMarquardt {
    /// Solver with the given configuration.
    pub fn new(config: LevenbergMarquardtConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &LevenbergMarquardtConfig {
        &self.config
    }

    /// Minimize the problem's squared residual starting from its current
    /// parameters.
    ///
    /// On `Ok` the problem is left at `report.x`. On `Err` it is left at the
    /// best accepted point, which is the start point when no step was taken.
    pub fn minimize<P: LeastSquaresProblem + ?Sized>(&self, problem: &mut P) -> Result<LmReport> {
        let cfg = &self.config;
        let mut x = problem.params();
        let mut r = problem.residuals();
        let mut evaluations = 1;
        let n = x.len();
        let m = r.len();

        if n == 0 || m == 0 {
            return Err(LmError::EmptyProblem {
                params: n,
                residuals: m,
            });
        }
        if let Some(index) = r.iter().position(|v| !v.is_finite()) {
            return Err(LmError::NonFiniteResidual { index });
        }

        let mut cost = half_sq_norm(&r);
        let mut lambda = cfg.initial_lambda;

        for iter in 0..cfg.max_iterations {
            if cost == 0.0 {
                return Ok(self.report(x, cost, iter, evaluations, LmTermination::ZeroResidual));
            }

            let jac = match problem.jacobian() {
                Some(j) => j,
                None => {
                    let (j, spent) = forward_difference_jacobian(problem, &x, &r, cfg.fd_step);
                    evaluations += spent;
                    j
                }
            };
            if jac.dim() != (m, n) {
                return Err(LmError::JacobianShape {
                    expected: (m, n),
                    got: jac.dim(),
                });
            }
            if let Some(((row, col), _)) = jac.indexed_iter().find(|(_, v)| !v.is_finite()) {
                return Err(LmError::NonFiniteJacobian { row, col });
            }

            let jtj: Array2<f64> = jac.t().dot(&jac);
            let grad = jac.t().dot(&r);
            let grad_max = grad.iter().fold(0.0_f64, |acc, g| acc.max(g.abs()));
            if grad_max <= cfg.gtol {
                return Ok(self.report(x, cost, iter, evaluations, LmTermination::Gtol));
            }
            let neg_grad = grad.mapv(|g| -g);

            // inner loop: raise the damping until a step lowers the cost
            let accepted = loop {
                if lambda > MAX_LAMBDA {
                    break None;
                }
                let mut damped = jtj.clone();
                for i in 0..n {
                    damped[[i, i]] += lambda * jtj[[i, i]].max(MIN_DIAG);
                }
                let delta = match lu_solve(&damped, &neg_grad) {
                    Ok(d) => d,
                    Err(LuError::SingularMatrix) => {
                        lambda *= cfg.lambda_increase;
                        continue;
                    }
                    Err(e) => {
                        problem.set_params(&x);
                        return Err(e.into());
                    }
                };

                let x_new = &x + &delta;
                problem.set_params(&x_new);
                let r_new = problem.residuals();
                evaluations += 1;
                if r_new.len() != m {
                    problem.set_params(&x);
                    return Err(LmError::ResidualLength {
                        expected: m,
                        got: r_new.len(),
                    });
                }

                let cost_new = half_sq_norm(&r_new);
                if cost_new.is_finite() && cost_new < cost {
                    lambda = (lambda * cfg.lambda_decrease).max(f64::MIN_POSITIVE);
                    break Some((x_new, r_new, cost_new, delta));
                }
                lambda *= cfg.lambda_increase;
            };

            let Some((x_new, r_new, cost_new, delta)) = accepted else {
                problem.set_params(&x);
                return Ok(self.report(x, cost, iter + 1, evaluations, LmTermination::NoImprovement));
            };

            let reduction = (cost - cost_new) / cost;
            let step = delta.dot(&delta).sqrt();
            let x_norm = x_new.dot(&x_new).sqrt();
            x = x_new;
            r = r_new;
            cost = cost_new;

            if cfg.print_interval > 0 && (iter + 1) % cfg.print_interval == 0 {
                log::info!(
                    "LM iteration {}: cost = {:.6e}, lambda = {:.3e}",
                    iter + 1,
                    cost,
                    lambda
                );
            }

            if reduction <= cfg.ftol {
                return Ok(self.report(x, cost, iter + 1, evaluations, LmTermination::Ftol));
            }
            if step <= cfg.xtol * (cfg.xtol + x_norm) {
                return Ok(self.report(x, cost, iter + 1, evaluations, LmTermination::Xtol));
            }
        }

        Ok(self.report(
            x,
            cost,
            cfg.max_iterations,
            evaluations,
            LmTermination::MaxIterations,
        ))
    }

    fn report(
        &self,
        x: Array1<f64>,
        cost: f64,
        iterations: usize,
        evaluations: usize,
        termination: LmTermination,
    ) -> LmReport {
        log::debug!(
            "LM finished after {} iterations ({} evaluations): cost = {:.6e}, {:?}",
            iterations,
            evaluations,
            cost,
            termination
        );
        LmReport {
            x,
            cost,
            iterations,
            evaluations,
            termination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// Rosenbrock written as residuals `10 (y - x^2)` and `1 - x`.
    struct Rosenbrock {
        p: Array1<f64>,
        analytic: bool,
    }

    impl LeastSquaresProblem for Rosenbrock {
        fn params(&self) -> Array1<f64> {
            self.p.clone()
        }
        fn set_params(&mut self, x: &Array1<f64>) {
            self.p.assign(x);
        }
        fn residuals(&mut self) -> Array1<f64> {
            array![10.0 * (self.p[1] - self.p[0] * self.p[0]), 1.0 - self.p[0]]
        }
        fn jacobian(&mut self) -> Option<Array2<f64>> {
            self.analytic
                .then(|| array![[-20.0 * self.p[0], 10.0], [-1.0, 0.0]])
        }
    }

    struct Himmelblau {
        p: Array1<f64>,
    }

    impl LeastSquaresProblem for Himmelblau {
        fn params(&self) -> Array1<f64> {
            self.p.clone()
        }
        fn set_params(&mut self, x: &Array1<f64>) {
            self.p.assign(x);
        }
        fn residuals(&mut self) -> Array1<f64> {
            let (x, y) = (self.p[0], self.p[1]);
            array![x * x + y - 11.0, x + y * y - 7.0]
        }
    }

    /// Overdetermined line fit `y = a t + b`.
    struct LineFit {
        p: Array1<f64>,
        t: Vec<f64>,
        y: Vec<f64>,
    }

    impl LeastSquaresProblem for LineFit {
        fn params(&self) -> Array1<f64> {
            self.p.clone()
        }
        fn set_params(&mut self, x: &Array1<f64>) {
            self.p.assign(x);
        }
        fn residuals(&mut self) -> Array1<f64> {
            Array1::from_iter(
                self.t
                    .iter()
                    .zip(&self.y)
                    .map(|(t, y)| self.p[0] * t + self.p[1] - y),
            )
        }
    }

    #[test]
    fn test_rosenbrock_analytic() {
        let mut problem = Rosenbrock {
            p: array![-1.2, 1.0],
            analytic: true,
        };
        let report = LevenbergMarquardt::default().minimize(&mut problem).unwrap();

        assert!(report.termination.converged(), "{:?}", report.termination);
        assert_relative_eq!(report.x[0], 1.0, epsilon = 1e-8);
        assert_relative_eq!(report.x[1], 1.0, epsilon = 1e-8);
        assert_eq!(problem.params(), report.x);
    }

    #[test]
    fn test_rosenbrock_finite_differences() {
        let mut problem = Rosenbrock {
            p: array![-1.2, 1.0],
            analytic: false,
        };
        let report = LevenbergMarquardt::default().minimize(&mut problem).unwrap();

        assert!(report.cost < 1e-14, "cost={}", report.cost);
        assert_relative_eq!(report.x[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(report.x[1], 1.0, epsilon = 1e-6);
        // two extra residual evaluations per Jacobian
        assert!(report.evaluations > 2 * report.iterations);
    }

    #[test]
    fn test_himmelblau_reaches_a_root() {
        let mut problem = Himmelblau { p: array![1.0, 1.0] };
        let report = LevenbergMarquardt::default().minimize(&mut problem).unwrap();

        let r = problem.residuals();
        assert!(r.iter().all(|v| v.abs() < 1e-6), "r={:?}", r);
        assert!(report.cost < 1e-12);
    }

    #[test]
    fn test_line_fit_matches_normal_equations() {
        let t = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let y = vec![1.1, 2.9, 5.2, 7.1, 8.8];
        let mut problem = LineFit {
            p: array![0.0, 0.0],
            t: t.clone(),
            y: y.clone(),
        };
        let report = LevenbergMarquardt::default().minimize(&mut problem).unwrap();

        let n = t.len() as f64;
        let st: f64 = t.iter().sum();
        let sy: f64 = y.iter().sum();
        let stt: f64 = t.iter().map(|v| v * v).sum();
        let sty: f64 = t.iter().zip(&y).map(|(a, b)| a * b).sum();
        let slope = (n * sty - st * sy) / (n * stt - st * st);
        let intercept = (sy - slope * st) / n;

        assert_relative_eq!(report.x[0], slope, epsilon = 1e-6);
        assert_relative_eq!(report.x[1], intercept, epsilon = 1e-6);
        assert!(report.cost > 0.0);
    }

    #[test]
    fn test_max_iterations() {
        let mut problem = Rosenbrock {
            p: array![-1.2, 1.0],
            analytic: true,
        };
        let config = LevenbergMarquardtConfig {
            max_iterations: 1,
            ..Default::default()
        };
        let report = LevenbergMarquardt::new(config).minimize(&mut problem).unwrap();

        assert_eq!(report.termination, LmTermination::MaxIterations);
        assert_eq!(report.iterations, 1);
        assert!(report.cost < 0.5 * (4.4f64.powi(2) + 2.2f64.powi(2)));
    }

    #[test]
    fn test_zero_residual_start() {
        let mut problem = Himmelblau { p: array![3.0, 2.0] };
        let report = LevenbergMarquardt::default().minimize(&mut problem).unwrap();

        assert_eq!(report.termination, LmTermination::ZeroResidual);
        assert_eq!(report.iterations, 0);
        assert_eq!(report.evaluations, 1);
    }

    #[test]
    fn test_non_finite_start_is_rejected() {
        let mut problem = Himmelblau {
            p: array![f64::NAN, 0.0],
        };
        let err = LevenbergMarquardt::default()
            .minimize(&mut problem)
            .unwrap_err();
        assert!(matches!(err, LmError::NonFiniteResidual { index: 0 }));
        assert!(err.is_non_finite_error());
    }

    #[test]
    fn test_empty_problem() {
        let mut problem = LineFit {
            p: array![0.0, 0.0],
            t: vec![],
            y: vec![],
        };
        let err = LevenbergMarquardt::default()
            .minimize(&mut problem)
            .unwrap_err();
        assert!(err.is_dimension_error());
    }
}
