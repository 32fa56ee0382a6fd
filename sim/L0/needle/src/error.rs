//! Error types for needle insertion modeling.

use curve_polynomial::CurveError;
use thiserror::Error;

/// Errors that can occur while configuring or driving a needle model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NeedleError {
    /// An argument is out of its valid range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration or mechanical properties are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The equilibrium system is singular or under-constrained.
    #[error("Ill-conditioned system: {0}")]
    IllConditionedSystem(String),

    /// Segment or spring index out of bounds.
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(String),

    /// Error raised by a centerline curve operation.
    #[error(transparent)]
    Curve(#[from] CurveError),
}

impl NeedleError {
    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an invalid config error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an ill-conditioned system error.
    pub fn ill_conditioned(msg: impl Into<String>) -> Self {
        Self::IllConditionedSystem(msg.into())
    }

    /// Create an index out of bounds error.
    pub fn index_out_of_bounds(msg: impl Into<String>) -> Self {
        Self::IndexOutOfBounds(msg.into())
    }

    /// Returns true if the system was singular, either in the equilibrium
    /// solve or in a curve fit.
    #[must_use]
    pub fn is_ill_conditioned(&self) -> bool {
        matches!(self, Self::IllConditionedSystem(_))
            || matches!(self, Self::Curve(e) if e.is_ill_conditioned())
    }

    /// Returns true if this is an invalid argument error.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
            || matches!(self, Self::Curve(e) if e.is_invalid_argument())
    }

    /// Returns true if this is an invalid config error.
    #[must_use]
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::InvalidConfig(_))
    }
}

/// Result type for needle operations.
pub type Result<T> = std::result::Result<T, NeedleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NeedleError::invalid_config("max tip springs below min");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: max tip springs below min"
        );
    }

    #[test]
    fn test_curve_errors_convert() {
        let err: NeedleError = CurveError::ill_conditioned("rank deficient").into();
        assert!(err.is_ill_conditioned());
        assert!(!err.is_invalid_config());
        assert_eq!(err.to_string(), CurveError::ill_conditioned("rank deficient").to_string());
    }

    #[test]
    fn test_predicates() {
        assert!(NeedleError::invalid_argument("x").is_invalid_argument());
        assert!(NeedleError::ill_conditioned("x").is_ill_conditioned());
        assert!(!NeedleError::index_out_of_bounds("x").is_ill_conditioned());
    }
}
