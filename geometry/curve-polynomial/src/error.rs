//! Error types for polynomial curve operations.

use thiserror::Error;

/// Errors that can occur while building, fitting or reparameterizing a curve.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurveError {
    /// An argument is outside its valid range (order, domain bounds, weights).
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Description of the offending argument.
        reason: String,
    },

    /// A matrix or sequence does not have the shape the operation expects.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The expected shape.
        expected: String,
        /// The shape that was provided.
        actual: String,
    },

    /// Not enough samples to determine the requested polynomial order.
    #[error("insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData {
        /// Minimum number of samples required.
        required: usize,
        /// Number of samples provided.
        actual: usize,
    },

    /// The least-squares system is singular or too badly conditioned to solve.
    #[error("ill-conditioned system: {reason}")]
    IllConditionedSystem {
        /// Description of the numerical problem.
        reason: String,
    },
}

impl CurveError {
    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a dimension mismatch error.
    #[must_use]
    pub fn dimension_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an insufficient data error.
    #[must_use]
    pub fn insufficient_data(required: usize, actual: usize) -> Self {
        Self::InsufficientData { required, actual }
    }

    /// Create an ill-conditioned system error.
    #[must_use]
    pub fn ill_conditioned(reason: impl Into<String>) -> Self {
        Self::IllConditionedSystem {
            reason: reason.into(),
        }
    }

    /// Check if this is an invalid argument error.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Check if this is a dimension mismatch error.
    #[must_use]
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. })
    }

    /// Check if this is an insufficient data error.
    #[must_use]
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }

    /// Check if this is an ill-conditioned system error.
    #[must_use]
    pub fn is_ill_conditioned(&self) -> bool {
        matches!(self, Self::IllConditionedSystem { .. })
    }
}
