//! Error types for the synthesis driver.
//!
//! Run-level errors are returned by the solve entry points and are fatal.
//! Refinement errors are local to one candidate and never abort a run.

use math_synthesis_cmaes::CmaesError;
use math_synthesis_least_squares::{LmError, LmTermination};
use thiserror::Error;

/// Errors that abort a synthesis run.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The evolution strategy rejected its setup or an update.
    #[error("evolution strategy: {0}")]
    Strategy(#[from] CmaesError),

    /// Lower and upper bounds have different lengths, or do not match the model.
    #[error("bounds mismatch: lower has {lower_len} elements, upper has {upper_len}")]
    BoundsMismatch {
        /// Length of the lower bounds
        lower_len: usize,
        /// Length of the upper bounds (or the model dimension)
        upper_len: usize,
    },

    /// A lower bound exceeds its upper bound, or a bound is not finite.
    #[error("invalid bounds at index {index}: lower ({lower}) > upper ({upper})")]
    InvalidBounds {
        /// Index of the invalid pair
        index: usize,
        /// Lower bound
        lower: f64,
        /// Upper bound
        upper: f64,
    },

    /// The model has no free parameters or no residuals.
    #[error("model has {dim} parameters and {residuals} residuals")]
    EmptyModel {
        /// Number of free parameters
        dim: usize,
        /// Number of residual components
        residuals: usize,
    },

    /// A model was built from inconsistent pieces.
    #[error("invalid model: {reason}")]
    InvalidModel {
        /// What is inconsistent
        reason: String,
    },

    /// A solver option is out of range.
    #[error("invalid option {name}: {reason}")]
    InvalidOption {
        /// Option name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// A specialized `Result` type for synthesis runs.
pub type Result<T> = std::result::Result<T, SynthesisError>;

impl SynthesisError {
    /// Returns `true` if this is a bounds-related error.
    pub fn is_bounds_error(&self) -> bool {
        matches!(
            self,
            SynthesisError::BoundsMismatch { .. } | SynthesisError::InvalidBounds { .. }
        )
    }

    /// Returns `true` if the run could not start.
    ///
    /// Every error returned before the first generation falls in this class;
    /// the model is left untouched in that case.
    pub fn is_init_error(&self) -> bool {
        match self {
            SynthesisError::Strategy(e) => e.is_init_error(),
            SynthesisError::EmptyModel { .. }
            | SynthesisError::InvalidModel { .. }
            | SynthesisError::InvalidOption { .. } => true,
            other => other.is_bounds_error(),
        }
    }
}

/// Failure of a local refinement pass on one candidate.
#[derive(Debug, Error)]
pub enum RefineError {
    /// The least-squares solver could not run on this candidate.
    #[error("local solver failed: {0}")]
    Solver(#[from] LmError),

    /// The solver stopped without meeting a tolerance.
    #[error("local solver did not converge ({termination:?}, cost {cost:.3e})")]
    NotConverged {
        /// Exit condition of the solver
        termination: LmTermination,
        /// Half squared residual norm at the point left in the model
        cost: f64,
    },
}
