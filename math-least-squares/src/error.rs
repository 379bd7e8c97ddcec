//! Error types for the dense linear algebra and the least-squares solver.

use thiserror::Error;

/// Errors of the LU factorization.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LuError {
    /// A pivot vanished during elimination.
    #[error("matrix is singular or nearly singular")]
    SingularMatrix,

    /// Non-square matrix or right-hand side of the wrong length.
    #[error("matrix dimensions mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        got: usize,
    },

    /// The matrix contains NaN or infinite entries.
    #[error("matrix contains non-finite entries")]
    NonFinite,
}

/// Errors of a Levenberg-Marquardt run.
#[derive(Debug, Error)]
pub enum LmError {
    /// The problem has no parameters or no residuals.
    #[error("empty problem: {params} parameters, {residuals} residuals")]
    EmptyProblem {
        /// Number of parameters
        params: usize,
        /// Number of residuals
        residuals: usize,
    },

    /// The residual at the starting point is NaN or infinite.
    #[error("non-finite residual at the starting point (index {index})")]
    NonFiniteResidual {
        /// Index of the first offending residual
        index: usize,
    },

    /// The Jacobian has NaN or infinite entries.
    #[error("non-finite Jacobian entry at ({row}, {col})")]
    NonFiniteJacobian {
        /// Residual index
        row: usize,
        /// Parameter index
        col: usize,
    },

    /// The Jacobian returned by the problem has the wrong shape.
    #[error("jacobian shape mismatch: expected {expected:?}, got {got:?}")]
    JacobianShape {
        /// Expected `(residuals, params)`
        expected: (usize, usize),
        /// Shape returned by the problem
        got: (usize, usize),
    },

    /// The residual length changed between evaluations.
    #[error("residual length changed: expected {expected}, got {got}")]
    ResidualLength {
        /// Length at the starting point
        expected: usize,
        /// Length of a later evaluation
        got: usize,
    },

    /// Solving the damped normal equations failed.
    #[error(transparent)]
    Lu(#[from] LuError),
}

/// A specialized `Result` type for least-squares operations.
pub type Result<T> = std::result::Result<T, LmError>;

impl LmError {
    /// Returns `true` if the problem produced NaN or infinite values.
    pub fn is_non_finite_error(&self) -> bool {
        matches!(
            self,
            LmError::NonFiniteResidual { .. }
                | LmError::NonFiniteJacobian { .. }
                | LmError::Lu(LuError::NonFinite)
        )
    }

    /// Returns `true` if a shape contract of the problem was violated.
    pub fn is_dimension_error(&self) -> bool {
        matches!(
            self,
            LmError::EmptyProblem { .. }
                | LmError::JacobianShape { .. }
                | LmError::ResidualLength { .. }
                | LmError::Lu(LuError::DimensionMismatch { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LmError::JacobianShape {
            expected: (3, 2),
            got: (2, 2),
        };
        assert_eq!(
            err.to_string(),
            "jacobian shape mismatch: expected (3, 2), got (2, 2)"
        );
        let err: LmError = LuError::SingularMatrix.into();
        assert_eq!(err.to_string(), "matrix is singular or nearly singular");
    }

    #[test]
    fn test_classification() {
        assert!(LmError::NonFiniteResidual { index: 0 }.is_non_finite_error());
        assert!(LmError::from(LuError::NonFinite).is_non_finite_error());
        assert!(!LmError::from(LuError::SingularMatrix).is_non_finite_error());

        assert!(
            LmError::EmptyProblem {
                params: 0,
                residuals: 3
            }
            .is_dimension_error()
        );
        assert!(!LmError::NonFiniteJacobian { row: 0, col: 1 }.is_dimension_error());
    }
}
