//! Error types for the CMA-ES library.
//!
//! Structured error handling for the evolution strategy, using `thiserror`
//! for the error enum and helper methods to categorize failures.

use thiserror::Error;

/// Errors reported by the evolution strategy.
#[derive(Debug, Error)]
pub enum CmaesError {
    /// The search space has no dimension.
    #[error("invalid dimension: {dim} (must be >= 1)")]
    InvalidDimension {
        /// The rejected dimension
        dim: usize,
    },

    /// An initial standard deviation is zero, negative or not finite.
    #[error("invalid initial spread at index {index}: {value} (must be > 0)")]
    NonPositiveSpread {
        /// Index of the offending coordinate
        index: usize,
        /// The rejected spread
        value: f64,
    },

    /// Population size is too small (must be >= 2).
    #[error("population size ({lambda}) must be >= 2")]
    PopulationTooSmall {
        /// The rejected population size
        lambda: usize,
    },

    /// Initial point and spread vectors disagree in length.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected length
        expected: usize,
        /// Length actually supplied
        got: usize,
    },

    /// The fitness vector does not match the sampled population.
    #[error("fitness vector has {got} values, population has {expected}")]
    FitnessLengthMismatch {
        /// Population size
        expected: usize,
        /// Length of the supplied fitness vector
        got: usize,
    },

    /// `update_distribution` was called without a sampled population.
    #[error("distribution update requested before a population was sampled")]
    NotSampled,

    /// A fitness value is NaN or infinite.
    #[error("non-finite fitness {value} at population index {index}")]
    NonFiniteFitness {
        /// Population index of the value
        index: usize,
        /// The rejected fitness value
        value: f64,
    },

    /// The strategy handle was already released.
    #[error("strategy has been shut down")]
    ShutDown,
}

/// A specialized `Result` type for CMA-ES operations.
pub type Result<T> = std::result::Result<T, CmaesError>;

impl CmaesError {
    /// Returns `true` if this error was raised while initializing the strategy.
    ///
    /// This includes `InvalidDimension`, `NonPositiveSpread`,
    /// `PopulationTooSmall` and `DimensionMismatch`.
    pub fn is_init_error(&self) -> bool {
        matches!(
            self,
            CmaesError::InvalidDimension { .. }
                | CmaesError::NonPositiveSpread { .. }
                | CmaesError::PopulationTooSmall { .. }
                | CmaesError::DimensionMismatch { .. }
        )
    }

    /// Returns `true` if the caller broke the ask/tell protocol.
    ///
    /// This includes `FitnessLengthMismatch`, `NotSampled` and `ShutDown`.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            CmaesError::FitnessLengthMismatch { .. } | CmaesError::NotSampled | CmaesError::ShutDown
        )
    }

    /// Returns `true` if a fitness value was rejected.
    pub fn is_fitness_error(&self) -> bool {
        matches!(self, CmaesError::NonFiniteFitness { .. })
    }
}
