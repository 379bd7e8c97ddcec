use ndarray::{Array1, ArrayView2};

use crate::snapshot::CmaesSnapshot;
use crate::{CmaesConfig, Metric, Result, TerminationReason, Which};

/// Everything needed to start a strategy run.
#[derive(Debug, Clone)]
pub struct StrategyInit {
    /// Initial mean of the search distribution.
    pub x0: Array1<f64>,
    /// Initial per-coordinate standard deviation (all entries > 0).
    pub sigma0: Array1<f64>,
    /// Population size, seed and termination settings.
    pub config: CmaesConfig,
    /// Optional state to resume from instead of starting fresh.
    pub resume: Option<CmaesSnapshot>,
}

impl StrategyInit {
    /// Fresh start from `x0` with spread `sigma0`.
    pub fn new(x0: Array1<f64>, sigma0: Array1<f64>, config: CmaesConfig) -> Self {
        Self {
            x0,
            sigma0,
            config,
            resume: None,
        }
    }

    /// Continue from a previously captured state.
    pub fn resume_from(mut self, snapshot: CmaesSnapshot) -> Self {
        self.resume = Some(snapshot);
        self
    }
}

/// Ask/tell interface of a stateful evolution strategy.
///
/// A driver calls [`sample_population`](Self::sample_population), scores every
/// row of [`population`](Self::population) in order, then hands the scores to
/// [`update_distribution`](Self::update_distribution). The handle is released
/// with [`shutdown`](Self::shutdown).
pub trait EvolutionStrategy: Sized {
    /// Build the strategy state. Fails on zero dimension, non-positive spreads
    /// or an unusable population size.
    fn init(init: StrategyInit) -> Result<Self>;

    /// Draw a new generation into the internal population buffer.
    fn sample_population(&mut self) -> Result<()>;

    /// The most recently sampled population, one candidate per row.
    fn population(&self) -> ArrayView2<'_, f64>;

    /// Read one of the strategy's scalar metrics.
    fn get(&self, metric: Metric) -> f64;

    /// Update the search distribution from one fitness value per candidate,
    /// in population order.
    fn update_distribution(&mut self, fitness: &[f64]) -> Result<()>;

    /// `Some(reason)` once the strategy considers itself finished.
    fn test_for_termination(&self) -> Option<TerminationReason>;

    /// Best vector of the last generation or of the whole run.
    fn best_vector(&self, which: Which) -> Array1<f64>;

    /// Release the strategy's buffers. Further calls are no-ops.
    fn shutdown(&mut self);
}
