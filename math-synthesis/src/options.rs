use std::fmt;

use math_synthesis_least_squares::LevenbergMarquardtConfig;

use crate::error::{Result, SynthesisError};
use crate::info::SolverInfo;
use crate::parallel_eval::ParallelConfig;

/// Action returned by the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Keep going.
    Continue,
    /// Stop after this generation and finalize.
    Stop,
}

/// Progress callback, invoked once per completed generation.
pub type CallbackFn = Box<dyn FnMut(&SolverInfo) -> CallbackAction>;

/// Options of one synthesis run.
///
/// A zero value disables the corresponding stop bound.
pub struct SolverOptions {
    /// Population size; 0 uses `max(5, floor(4 + 3 ln n))`.
    pub lambda: usize,
    /// Run a local refinement pass on every candidate and on the final result.
    pub converge: bool,
    /// Stop once the best fitness drops below this value.
    pub stop_fitness: f64,
    /// Evaluation budget, enforced by the strategy.
    pub stop_evals: usize,
    /// Generation budget, enforced by the strategy.
    pub stop_iter: usize,
    /// Wall-clock budget in seconds.
    pub stop_elapsed: f64,
    /// Settings of the default Levenberg-Marquardt refiner.
    pub lm: LevenbergMarquardtConfig,
    /// Optional random seed for reproducibility.
    pub seed: Option<u64>,
    /// Fitness given to candidates whose evaluation is NaN or infinite.
    pub degenerate_fitness: f64,
    /// Project candidates onto the model bounds before mapping them.
    pub clip_to_bounds: bool,
    /// Parallel evaluation configuration (used by `solve_parallel`).
    pub parallel: ParallelConfig,
    /// Log every generation at info level instead of debug.
    pub disp: bool,
    /// Optional per-generation callback (may stop early).
    pub callback: Option<CallbackFn>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            lambda: 0,
            converge: true,
            stop_fitness: 1e-8,
            stop_evals: 0,
            stop_iter: 0,
            stop_elapsed: 0.0,
            lm: LevenbergMarquardtConfig::default(),
            seed: None,
            degenerate_fitness: 1e30,
            clip_to_bounds: false,
            parallel: ParallelConfig::default(),
            disp: false,
            callback: None,
        }
    }
}

impl fmt::Debug for SolverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolverOptions")
            .field("lambda", &self.lambda)
            .field("converge", &self.converge)
            .field("stop_fitness", &self.stop_fitness)
            .field("stop_evals", &self.stop_evals)
            .field("stop_iter", &self.stop_iter)
            .field("stop_elapsed", &self.stop_elapsed)
            .field("lm", &self.lm)
            .field("seed", &self.seed)
            .field("degenerate_fitness", &self.degenerate_fitness)
            .field("clip_to_bounds", &self.clip_to_bounds)
            .field("parallel", &self.parallel)
            .field("disp", &self.disp)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl SolverOptions {
    /// Population size for a problem of dimension `n`.
    pub fn population_size(&self, n: usize) -> usize {
        if self.lambda > 0 {
            self.lambda
        } else {
            let n = n.max(1) as f64;
            ((4.0 + 3.0 * n.ln()).floor() as usize).max(5)
        }
    }

    /// Check the ranges of all options.
    ///
    /// # Errors
    ///
    /// `InvalidOption` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.lambda == 1 {
            return Err(invalid("lambda", "population size must be 0 or >= 2"));
        }
        if !(self.stop_fitness.is_finite() && self.stop_fitness >= 0.0) {
            return Err(invalid("stop_fitness", "must be finite and >= 0"));
        }
        if !(self.stop_elapsed.is_finite() && self.stop_elapsed >= 0.0) {
            return Err(invalid("stop_elapsed", "must be finite and >= 0"));
        }
        if !self.degenerate_fitness.is_finite() {
            return Err(invalid("degenerate_fitness", "must be finite"));
        }
        if self.parallel.num_threads == Some(0) {
            return Err(invalid("parallel.num_threads", "must be >= 1 when set"));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: &str) -> SynthesisError {
    SynthesisError::InvalidOption {
        name,
        reason: reason.to_string(),
    }
}

/// Fluent builder for [`SolverOptions`].
///
/// # Example
///
/// ```rust
/// use math_synthesis::SolverOptionsBuilder;
///
/// let options = SolverOptionsBuilder::new()
///     .lambda(12)
///     .converge(false)
///     .stop_fitness(1e-6)
///     .stop_iter(500)
///     .seed(42)
///     .build()
///     .expect("valid options");
/// assert_eq!(options.population_size(3), 12);
/// ```
#[derive(Default)]
pub struct SolverOptionsBuilder {
    opts: SolverOptions,
}

impl SolverOptionsBuilder {
    /// Creates a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }
    /// Sets the population size (0 = derived from the dimension).
    pub fn lambda(mut self, v: usize) -> Self {
        self.opts.lambda = v;
        self
    }
    /// Enables or disables per-candidate local refinement.
    pub fn converge(mut self, v: bool) -> Self {
        self.opts.converge = v;
        self
    }
    /// Sets the fitness threshold (0 = disabled).
    pub fn stop_fitness(mut self, v: f64) -> Self {
        self.opts.stop_fitness = v;
        self
    }
    /// Sets the evaluation budget (0 = unbounded).
    pub fn stop_evals(mut self, v: usize) -> Self {
        self.opts.stop_evals = v;
        self
    }
    /// Sets the generation budget (0 = unbounded).
    pub fn stop_iter(mut self, v: usize) -> Self {
        self.opts.stop_iter = v;
        self
    }
    /// Sets the wall-clock budget in seconds (0 = unbounded).
    pub fn stop_elapsed(mut self, v: f64) -> Self {
        self.opts.stop_elapsed = v;
        self
    }
    /// Sets the Levenberg-Marquardt configuration.
    pub fn lm(mut self, v: LevenbergMarquardtConfig) -> Self {
        self.opts.lm = v;
        self
    }
    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.opts.seed = Some(v);
        self
    }
    /// Sets the replacement fitness of degenerate candidates.
    pub fn degenerate_fitness(mut self, v: f64) -> Self {
        self.opts.degenerate_fitness = v;
        self
    }
    /// Enables clipping of candidates to the model bounds.
    pub fn clip_to_bounds(mut self, v: bool) -> Self {
        self.opts.clip_to_bounds = v;
        self
    }
    /// Sets the parallel evaluation configuration.
    pub fn parallel(mut self, v: ParallelConfig) -> Self {
        self.opts.parallel = v;
        self
    }
    /// Enables per-generation progress at info level.
    pub fn disp(mut self, v: bool) -> Self {
        self.opts.disp = v;
        self
    }
    /// Sets the per-generation callback.
    pub fn callback(mut self, cb: CallbackFn) -> Self {
        self.opts.callback = Some(cb);
        self
    }
    /// Builds and validates the options.
    ///
    /// # Errors
    ///
    /// Returns `SynthesisError::InvalidOption` when a value is out of range.
    pub fn build(self) -> Result<SolverOptions> {
        self.opts.validate()?;
        Ok(self.opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = SolverOptions::default();
        assert!(opts.converge);
        assert_eq!(opts.stop_fitness, 1e-8);
        assert_eq!(opts.stop_evals, 0);
        assert_eq!(opts.stop_iter, 0);
        assert_eq!(opts.stop_elapsed, 0.0);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_population_size() {
        let opts = SolverOptions::default();
        // 4 + 3 ln n stays below 5 for tiny problems
        assert_eq!(opts.population_size(1), 5);
        assert_eq!(opts.population_size(2), 6);
        assert_eq!(opts.population_size(10), 10);
        assert_eq!(opts.population_size(100), 17);

        let opts = SolverOptionsBuilder::new().lambda(40).build().unwrap();
        assert_eq!(opts.population_size(2), 40);
    }

    #[test]
    fn test_builder_validation() {
        let err = SolverOptionsBuilder::new().lambda(1).build().unwrap_err();
        assert!(matches!(err, SynthesisError::InvalidOption { name: "lambda", .. }));

        let err = SolverOptionsBuilder::new()
            .degenerate_fitness(f64::INFINITY)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            SynthesisError::InvalidOption {
                name: "degenerate_fitness",
                ..
            }
        ));

        assert!(SolverOptionsBuilder::new().stop_elapsed(-1.0).build().is_err());
    }

    #[test]
    fn test_callback_is_kept() {
        let opts = SolverOptionsBuilder::new()
            .callback(Box::new(|_| CallbackAction::Stop))
            .build()
            .unwrap();
        assert!(opts.callback.is_some());
        assert!(format!("{:?}", opts).contains("callback: true"));
    }
}
