//! Dense least-squares solvers
//!
//! This crate provides a Levenberg-Marquardt solver for small dense nonlinear
//! least-squares problems, along with the LU factorization it uses for the
//! damped normal equations.
//!
//! # Features
//!
//! - **Levenberg-Marquardt**: Marquardt diagonal scaling, adaptive damping,
//!   analytic or forward-difference Jacobians
//! - **Direct Solvers**: LU decomposition with partial pivoting
//!
//! # Example
//!
//! ```rust
//! use math_synthesis_least_squares::{LeastSquaresProblem, LevenbergMarquardt};
//! use ndarray::{Array1, array};
//!
//! struct Circle {
//!     p: Array1<f64>,
//! }
//!
//! impl LeastSquaresProblem for Circle {
//!     fn params(&self) -> Array1<f64> {
//!         self.p.clone()
//!     }
//!     fn set_params(&mut self, x: &Array1<f64>) {
//!         self.p.assign(x);
//!     }
//!     fn residuals(&mut self) -> Array1<f64> {
//!         array![self.p[0] * self.p[0] + self.p[1] * self.p[1] - 4.0, self.p[0] - self.p[1]]
//!     }
//! }
//!
//! let mut problem = Circle { p: array![1.0, 0.5] };
//! let report = LevenbergMarquardt::default().minimize(&mut problem).expect("solve failed");
//! assert!((report.x[0] - 2.0_f64.sqrt()).abs() < 1e-6);
//! ```

pub mod direct;
pub mod error;
pub mod levenberg_marquardt;
pub mod problem;

pub use direct::{LuFactorization, lu_factorize, lu_solve};
pub use error::{LmError, LuError, Result};
pub use levenberg_marquardt::{
    LevenbergMarquardt, LevenbergMarquardtConfig, LmReport, LmTermination,
};
pub use problem::{LeastSquaresProblem, forward_difference_jacobian};
