//! Covariance Matrix Adaptation Evolution Strategy (CMA-ES).
//!
//! This crate provides a stateful CMA-ES with an ask/tell interface: the
//! caller samples a population, scores it however it likes, and feeds the
//! scores back to update the search distribution. This lets a driver insert
//! arbitrary work (model mapping, local refinement) between sampling and
//! update.
//!
//! # Features
//!
//! - Full covariance adaptation with rank-one and rank-μ updates
//! - Cumulative step-size adaptation
//! - Per-coordinate initial spreads
//! - Termination tests (MaxFunEvals, MaxIter, TolFun, TolHistFun, TolX,
//!   TolUpSigma, ConditionCov, NoEffectAxis, NoEffectCoord)
//! - In-memory snapshots to resume a run
//!
//! # Example
//!
//! ```rust
//! use math_synthesis_cmaes::{
//!     Cmaes, CmaesConfigBuilder, EvolutionStrategy, Metric, StrategyInit, Which,
//! };
//! use ndarray::Array1;
//!
//! let config = CmaesConfigBuilder::new()
//!     .seed(7)
//!     .stop_max_iter(400)
//!     .build()
//!     .expect("invalid config");
//! let init = StrategyInit::new(Array1::from_elem(3, 2.0), Array1::from_elem(3, 1.0), config);
//! let mut es = Cmaes::init(init).expect("init failed");
//!
//! while es.test_for_termination().is_none() {
//!     es.sample_population().expect("sample failed");
//!     let fitness: Vec<f64> = es
//!         .population()
//!         .rows()
//!         .into_iter()
//!         .map(|x| x.iter().map(|v| v * v).sum())
//!         .collect();
//!     es.update_distribution(&fitness).expect("update failed");
//! }
//! assert!(es.get(Metric::BestFitnessEver) < 1e-8);
//! assert!(es.best_vector(Which::Ever).iter().all(|v| v.abs() < 1e-3));
//! ```
#![doc = include_str!("../README.md")]
#![doc = include_str!("../REFERENCES.md")]
#![warn(missing_docs)]

pub mod error;
pub use error::{CmaesError, Result};

use std::collections::VecDeque;

use ndarray::{Array1, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

/// Symmetric eigen-decomposition by Jacobi rotations.
mod eigen;
/// Static strategy parameters (weights, learning rates).
pub mod parameters;
/// In-memory state capture for resuming a run.
pub mod snapshot;
/// Ask/tell trait implemented by the strategy.
pub mod strategy;
/// Termination criteria of the strategy.
pub mod termination;
/// Distribution update (tell step).
mod update_distribution;

/// Tests of the full strategy on benchmark functions.
#[cfg(test)]
mod cmaes_tests;

pub use parameters::{StrategyParameters, default_lambda};
pub use snapshot::CmaesSnapshot;
pub use strategy::{EvolutionStrategy, StrategyInit};
pub use termination::TerminationReason;

/// Scalar metrics exposed by the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Number of candidates per generation.
    PopulationSize,
    /// Best fitness seen since the start of the run.
    BestFitnessEver,
    /// Best fitness of the last updated generation.
    CurrentFitness,
    /// Number of completed generations.
    Generation,
    /// Number of fitness values consumed so far.
    Evaluations,
    /// Current global step size.
    Sigma,
}

/// Selects which best vector to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Which {
    /// Best candidate of the last updated generation.
    Current,
    /// Best candidate since the start of the run.
    Ever,
}

/// Configuration of a CMA-ES run.
#[derive(Debug, Clone)]
pub struct CmaesConfig {
    /// Population size; `None` uses `4 + floor(3 ln n)`.
    pub lambda: Option<usize>,
    /// Optional random seed for reproducibility.
    pub seed: Option<u64>,
    /// Stop after this many fitness evaluations (0 = unbounded).
    pub stop_max_fun_evals: usize,
    /// Stop after this many generations (0 = unbounded).
    pub stop_max_iter: usize,
    /// Fitness range (current generation and recent history) that stops the run.
    pub tol_fun: f64,
    /// Range of the best-fitness history that stops the run.
    pub tol_hist_fun: f64,
    /// Coordinate spread that stops the run; `None` uses `1e-11 * sigma0`.
    pub tol_x: Option<f64>,
    /// Relative step-size growth that stops the run.
    pub tol_up_sigma: f64,
    /// Largest tolerated condition number of the covariance matrix.
    pub max_condition: f64,
}

impl Default for CmaesConfig {
    fn default() -> Self {
        Self {
            lambda: None,
            seed: None,
            stop_max_fun_evals: 0,
            stop_max_iter: 0,
            tol_fun: 1e-12,
            tol_hist_fun: 1e-13,
            tol_x: None,
            tol_up_sigma: 1e20,
            max_condition: 1e14,
        }
    }
}

/// Fluent builder for [`CmaesConfig`].
///
/// # Example
///
/// ```rust
/// use math_synthesis_cmaes::CmaesConfigBuilder;
///
/// let config = CmaesConfigBuilder::new()
///     .lambda(12)
///     .seed(42)
///     .stop_max_fun_evals(10_000)
///     .build()
///     .expect("valid config");
/// assert_eq!(config.lambda, Some(12));
/// ```
pub struct CmaesConfigBuilder {
    cfg: CmaesConfig,
}

impl Default for CmaesConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CmaesConfigBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            cfg: CmaesConfig::default(),
        }
    }
    /// Sets the population size.
    pub fn lambda(mut self, v: usize) -> Self {
        self.cfg.lambda = Some(v);
        self
    }
    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.cfg.seed = Some(v);
        self
    }
    /// Sets the evaluation budget (0 = unbounded).
    pub fn stop_max_fun_evals(mut self, v: usize) -> Self {
        self.cfg.stop_max_fun_evals = v;
        self
    }
    /// Sets the generation budget (0 = unbounded).
    pub fn stop_max_iter(mut self, v: usize) -> Self {
        self.cfg.stop_max_iter = v;
        self
    }
    /// Sets the function-value tolerance.
    pub fn tol_fun(mut self, v: f64) -> Self {
        self.cfg.tol_fun = v;
        self
    }
    /// Sets the history tolerance.
    pub fn tol_hist_fun(mut self, v: f64) -> Self {
        self.cfg.tol_hist_fun = v;
        self
    }
    /// Sets the coordinate tolerance.
    pub fn tol_x(mut self, v: f64) -> Self {
        self.cfg.tol_x = Some(v);
        self
    }
    /// Sets the step-size growth limit.
    pub fn tol_up_sigma(mut self, v: f64) -> Self {
        self.cfg.tol_up_sigma = v;
        self
    }
    /// Sets the covariance condition-number limit.
    pub fn max_condition(mut self, v: f64) -> Self {
        self.cfg.max_condition = v;
        self
    }
    /// Builds and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns `CmaesError::PopulationTooSmall` if an explicit `lambda < 2`.
    pub fn build(self) -> Result<CmaesConfig> {
        match self.cfg.lambda {
            Some(lambda) if lambda < 2 => Err(CmaesError::PopulationTooSmall { lambda }),
            _ => Ok(self.cfg),
        }
    }
}

/// CMA-ES strategy state.
///
/// Create it with [`EvolutionStrategy::init`], then alternate
/// [`sample_population`](EvolutionStrategy::sample_population) and
/// [`update_distribution`](EvolutionStrategy::update_distribution).
pub struct Cmaes {
    pub(crate) config: CmaesConfig,
    pub(crate) params: StrategyParameters,
    pub(crate) rng: StdRng,
    /// Distribution mean
    pub(crate) mean: Array1<f64>,
    /// Global step size
    pub(crate) sigma: f64,
    /// Step size at initialization, reference for TolX / TolUpSigma
    pub(crate) sigma0: f64,
    /// Covariance matrix C
    pub(crate) cov: Array2<f64>,
    /// Eigenvectors of C, column-wise
    pub(crate) b: Array2<f64>,
    /// Square roots of the eigenvalues of C
    pub(crate) d: Array1<f64>,
    pub(crate) p_sigma: Array1<f64>,
    pub(crate) p_c: Array1<f64>,
    /// Sampled candidates, one per row
    pub(crate) population: Array2<f64>,
    /// Fitness of the last updated generation, ascending
    pub(crate) fitness: Array1<f64>,
    pub(crate) sampled: bool,
    pub(crate) generation: usize,
    pub(crate) evaluations: usize,
    pub(crate) eigen_generation: usize,
    pub(crate) best_x: Array1<f64>,
    pub(crate) best_f: f64,
    pub(crate) current_x: Array1<f64>,
    pub(crate) current_f: f64,
    /// Best fitness of the most recent generations
    pub(crate) history: VecDeque<f64>,
    pub(crate) shut_down: bool,
}

impl Cmaes {
    /// Summary line describing the strategy setup.
    pub fn say_hello(&self) -> String {
        format!(
            "(CMA-ES) dimension={}, lambda={}, mu={}, mu_eff={:.2}, sigma={:.3e}, seed={:?}",
            self.params.n,
            self.params.lambda,
            self.params.mu,
            self.params.mu_eff,
            self.sigma,
            self.config.seed
        )
    }

    /// Static parameters in use.
    pub fn parameters(&self) -> &StrategyParameters {
        &self.params
    }

    /// Current distribution mean.
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Per-coordinate standard deviations `sigma * sqrt(C_ii)`.
    pub fn std_devs(&self) -> Array1<f64> {
        self.cov.diag().mapv(|c| self.sigma * c.sqrt())
    }

    fn validate(init: &StrategyInit) -> Result<()> {
        let n = init.x0.len();
        if n == 0 {
            return Err(CmaesError::InvalidDimension { dim: 0 });
        }
        if init.sigma0.len() != n {
            return Err(CmaesError::DimensionMismatch {
                expected: n,
                got: init.sigma0.len(),
            });
        }
        for (index, &value) in init.sigma0.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(CmaesError::NonPositiveSpread { index, value });
            }
        }
        match init.config.lambda {
            Some(lambda) if lambda < 2 => Err(CmaesError::PopulationTooSmall { lambda }),
            _ => Ok(()),
        }
    }

    /// Recompute `b` and `d` from the covariance matrix.
    pub(crate) fn update_eigensystem(&mut self) {
        let n = self.params.n;
        for i in 0..n {
            for j in 0..i {
                let s = 0.5 * (self.cov[[i, j]] + self.cov[[j, i]]);
                self.cov[[i, j]] = s;
                self.cov[[j, i]] = s;
            }
        }
        let (values, vectors) = eigen::symmetric_eigen(&self.cov);
        let max_ev = values.iter().cloned().fold(0.0, f64::max);
        let floor = (max_ev * 1e-20).max(f64::MIN_POSITIVE);
        self.d = values.mapv(|v| v.max(floor).sqrt());
        self.b = vectors;
        self.eigen_generation = self.generation;
    }
}

impl EvolutionStrategy for Cmaes {
    fn init(init: StrategyInit) -> Result<Self> {
        Self::validate(&init)?;

        let n = init.x0.len();
        let lambda = init.config.lambda.unwrap_or_else(|| default_lambda(n));
        let params = StrategyParameters::new(n, lambda);

        let rng: StdRng = match init.config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => {
                let mut thread_rng = rand::rng();
                StdRng::from_rng(&mut thread_rng)
            }
        };

        // global sigma is the quadratic mean of the per-coordinate spreads,
        // the ratios go into the diagonal of C
        let sigma = (init.sigma0.mapv(|s| s * s).sum() / n as f64).sqrt();
        let diag = init.sigma0.mapv(|s| (s / sigma).powi(2));

        let mut es = Self {
            params,
            rng,
            mean: init.x0.clone(),
            sigma,
            sigma0: sigma,
            cov: Array2::from_diag(&diag),
            b: Array2::eye(n),
            d: diag.mapv(f64::sqrt),
            p_sigma: Array1::zeros(n),
            p_c: Array1::zeros(n),
            population: Array2::zeros((lambda, n)),
            fitness: Array1::zeros(0),
            sampled: false,
            generation: 0,
            evaluations: 0,
            eigen_generation: 0,
            best_x: init.x0.clone(),
            best_f: f64::INFINITY,
            current_x: init.x0,
            current_f: f64::INFINITY,
            history: VecDeque::new(),
            shut_down: false,
            config: init.config,
        };

        if let Some(snapshot) = init.resume {
            es.restore(snapshot)?;
        }

        log::debug!("{}", es.say_hello());
        Ok(es)
    }

    fn sample_population(&mut self) -> Result<()> {
        if self.shut_down {
            return Err(CmaesError::ShutDown);
        }
        if self.generation - self.eigen_generation >= self.params.eigen_gap() {
            self.update_eigensystem();
        }

        let n = self.params.n;
        let mut z = Array1::<f64>::zeros(n);
        for k in 0..self.params.lambda {
            for zi in z.iter_mut() {
                *zi = StandardNormal.sample(&mut self.rng);
            }
            let y = self.b.dot(&(&self.d * &z));
            let mut row = self.population.row_mut(k);
            for i in 0..n {
                row[i] = self.mean[i] + self.sigma * y[i];
            }
        }
        self.sampled = true;
        Ok(())
    }

    fn population(&self) -> ArrayView2<'_, f64> {
        self.population.view()
    }

    fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::PopulationSize => self.params.lambda as f64,
            Metric::BestFitnessEver => self.best_f,
            Metric::CurrentFitness => self.current_f,
            Metric::Generation => self.generation as f64,
            Metric::Evaluations => self.evaluations as f64,
            Metric::Sigma => self.sigma,
        }
    }

    fn update_distribution(&mut self, fitness: &[f64]) -> Result<()> {
        self.tell(fitness)
    }

    fn test_for_termination(&self) -> Option<TerminationReason> {
        if self.shut_down {
            return None;
        }
        self.termination_reason()
    }

    fn best_vector(&self, which: Which) -> Array1<f64> {
        match which {
            Which::Current => self.current_x.clone(),
            Which::Ever => self.best_x.clone(),
        }
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.sampled = false;
        self.population = Array2::zeros((0, self.params.n));
        self.fitness = Array1::zeros(0);
        self.history.clear();
        log::debug!(
            "CMA-ES shut down after {} generations, {} evaluations",
            self.generation,
            self.evaluations
        );
    }
}
