//! Driver-side stop bounds, checked once per completed generation.
//!
//! Evaluation and generation budgets are not checked here: they are handed
//! to the strategy at init and its own termination test enforces them.

use crate::info::{SolverInfo, StopReason};
use crate::options::SolverOptions;

/// The first driver-side bound `info` exceeds, if any.
///
/// Bounds are OR-combined and a zero value disables a bound.
pub fn stop_cause(options: &SolverOptions, info: &SolverInfo) -> Option<StopReason> {
    if options.stop_elapsed != 0.0 && info.elapsed > options.stop_elapsed {
        return Some(StopReason::Elapsed);
    }
    if options.stop_fitness != 0.0 && options.stop_fitness > info.minf {
        return Some(StopReason::Fitness);
    }
    None
}

/// `true` when any driver-side bound is exceeded.
pub fn should_stop(options: &SolverOptions, info: &SolverInfo) -> bool {
    stop_cause(options, info).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(stop_elapsed: f64, stop_fitness: f64) -> SolverOptions {
        SolverOptions {
            stop_elapsed,
            stop_fitness,
            ..Default::default()
        }
    }

    fn info(elapsed: f64, minf: f64) -> SolverInfo {
        SolverInfo {
            elapsed,
            minf,
            ..Default::default()
        }
    }

    #[test]
    fn test_elapsed_bound() {
        let opts = options(3.0, 0.0);
        assert!(should_stop(&opts, &info(5.0, 1e-3)));
        assert_eq!(stop_cause(&opts, &info(5.0, 1e-3)), Some(StopReason::Elapsed));
        assert!(!should_stop(&opts, &info(3.0, 1e-3)));
    }

    #[test]
    fn test_fitness_bound() {
        let opts = options(0.0, 1e-2);
        assert!(should_stop(&opts, &info(100.0, 1e-3)));
        assert_eq!(stop_cause(&opts, &info(0.0, 1e-3)), Some(StopReason::Fitness));
        // strict comparison
        assert!(!should_stop(&opts, &info(0.0, 1e-2)));
        assert!(!should_stop(&opts, &info(0.0, 0.5)));
    }

    #[test]
    fn test_nothing_configured() {
        let opts = options(0.0, 0.0);
        assert!(!should_stop(&opts, &info(1e9, 0.0)));
        assert!(!should_stop(&opts, &SolverInfo::default()));
    }

    #[test]
    fn test_or_combination() {
        let opts = options(10.0, 1e-6);
        assert!(!should_stop(&opts, &info(1.0, 1.0)));
        assert!(should_stop(&opts, &info(11.0, 1.0)));
        assert!(should_stop(&opts, &info(1.0, 1e-9)));
        // elapsed is reported first when both fire
        assert_eq!(stop_cause(&opts, &info(11.0, 1e-9)), Some(StopReason::Elapsed));
    }

    #[test]
    fn test_budgets_are_not_checked_here() {
        let opts = SolverOptions {
            stop_evals: 10,
            stop_iter: 2,
            stop_fitness: 0.0,
            ..Default::default()
        };
        let done = SolverInfo {
            iterations: 50,
            evaluations: 500,
            minf: 1.0,
            ..Default::default()
        };
        assert!(!should_stop(&opts, &done));
    }
}
