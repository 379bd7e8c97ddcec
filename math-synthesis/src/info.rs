use std::fmt;

use math_synthesis_cmaes::TerminationReason;

/// Why a run left its main loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopReason {
    /// The evolution strategy's own termination test fired. This covers the
    /// evaluation and iteration budgets.
    Strategy(TerminationReason),
    /// Wall-clock budget `stop_elapsed` exceeded.
    Elapsed,
    /// Best fitness dropped below `stop_fitness`.
    Fitness,
    /// The progress callback asked to stop.
    Callback,
}

impl StopReason {
    /// `true` when the stop came from the driver rather than the strategy.
    pub fn is_policy(&self) -> bool {
        !matches!(self, StopReason::Strategy(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Strategy(reason) => write!(f, "strategy: {}", reason),
            StopReason::Elapsed => write!(f, "elapsed time limit reached"),
            StopReason::Fitness => write!(f, "fitness threshold reached"),
            StopReason::Callback => write!(f, "stopped by callback"),
        }
    }
}

/// Telemetry of one synthesis run, returned by value.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverInfo {
    /// Completed generations.
    pub iterations: usize,
    /// Best fitness seen by the strategy so far.
    pub minf: f64,
    /// Best fitness of the last generation.
    pub current: f64,
    /// Mean fitness of the last generation.
    pub mean: f64,
    /// Wall-clock seconds since the main loop started.
    pub elapsed: f64,
    /// Candidates scored.
    pub evaluations: usize,
    /// Local refinement passes, the final one included.
    pub refinements: usize,
    /// Refinement passes that reported a failure.
    pub refinement_failures: usize,
    /// Fitness values replaced because they were NaN or infinite.
    pub degenerate: usize,
    /// Fitness of the model after finalization.
    pub final_fitness: f64,
    /// Exit taken by the main loop.
    pub stop: Option<StopReason>,
}

impl Default for SolverInfo {
    fn default() -> Self {
        Self {
            iterations: 0,
            minf: f64::INFINITY,
            current: f64::INFINITY,
            mean: f64::INFINITY,
            elapsed: 0.0,
            evaluations: 0,
            refinements: 0,
            refinement_failures: 0,
            degenerate: 0,
            final_fitness: f64::INFINITY,
            stop: None,
        }
    }
}

impl fmt::Display for SolverInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iterations={} evaluations={} minf={:.6e} final={:.6e} elapsed={:.3}s",
            self.iterations, self.evaluations, self.minf, self.final_fitness, self.elapsed
        )?;
        if let Some(stop) = &self.stop {
            write!(f, " ({})", stop)?;
        }
        Ok(())
    }
}
