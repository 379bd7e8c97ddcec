//! Hybrid global/local optimizer for kinematic synthesis.
//!
//! A CMA-ES search proposes candidate parameter vectors. Each candidate is
//! mapped into a [`SynthesisModel`], optionally polished by a local
//! least-squares pass (Levenberg-Marquardt by default), and scored by the L1
//! norm of the model residual. The best vector found is mapped back into the
//! model at the end of the run.
//!
//! # Example
//!
//! ```rust
//! use math_synthesis::{PlanarTree, SolverOptionsBuilder, Synthesizer, SynthesisModel};
//!
//! let mut tree = PlanarTree::two_branch_demo();
//! let options = SolverOptionsBuilder::new()
//!     .stop_iter(40)
//!     .stop_fitness(1e-6)
//!     .seed(3)
//!     .build()
//!     .expect("invalid options");
//!
//! let info = Synthesizer::new(options).solve(&mut tree).expect("solve failed");
//! assert!(info.iterations <= 40);
//! assert!(info.final_fitness.is_finite());
//! assert_eq!(tree.params().len(), tree.dim());
//! ```
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Main search loop and entry points
pub mod coordinator;
/// Error types
pub mod error;
/// L1 fitness of a mapped model
pub mod fitness;
/// Run telemetry
pub mod info;
/// Model interface and box constraints
pub mod model;
/// Ready-made models
pub mod models;
/// Solver options and progress callback
pub mod options;
/// Parallel population scoring
pub mod parallel_eval;
/// CSV recording of runs
pub mod recorder;
/// Local refinement of candidates
pub mod refine;
/// Stopping policy applied after every generation
pub mod stopping;

pub use coordinator::{Synthesizer, solve_cmaes};
pub use error::{RefineError, Result, SynthesisError};
pub use info::{SolverInfo, StopReason};
pub use model::{Bounds, SynthesisModel};
pub use models::{PlanarTree, QuadraticModel};
pub use options::{CallbackAction, CallbackFn, SolverOptions, SolverOptionsBuilder};
pub use parallel_eval::ParallelConfig;
pub use recorder::{GenerationRecord, GenerationRecorder};
pub use refine::{LevenbergMarquardtRefiner, LocalRefiner, RefineReport};

pub use math_synthesis_cmaes::{Cmaes, EvolutionStrategy, TerminationReason};
pub use math_synthesis_least_squares::LevenbergMarquardtConfig;
