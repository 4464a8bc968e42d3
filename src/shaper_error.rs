//! ShaperError: unified error type for topo-shaper public APIs
//!
//! Every public entry point returns `Result<_, ShaperError>`. Failures are
//! fail-fast: a call that errors exports nothing.

use thiserror::Error;

use crate::algs::error::OperationError;
use crate::expr::ExpressionError;

/// Unified error type for topo-shaper operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShaperError {
    /// Input is not GeoJSON we understand, or its geometry is malformed.
    #[error("Invalid GeoJSON: {0}")]
    Validation(String),
    /// A required operation parameter was not supplied.
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    /// A field or filter expression could not be evaluated.
    #[error("Expression error: {0}")]
    Expression(ExpressionError),
    /// The invoked operation failed.
    #[error("Operation failed: {0}")]
    Operation(OperationError),
}

impl ShaperError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ShaperError::Validation(msg.into())
    }
}

impl From<ExpressionError> for ShaperError {
    fn from(e: ExpressionError) -> Self {
        ShaperError::Expression(e)
    }
}

/// Expression failures raised inside an operation are reported as such, not
/// as a generic operation failure.
impl From<OperationError> for ShaperError {
    fn from(e: OperationError) -> Self {
        match e {
            OperationError::Expression(inner) => ShaperError::Expression(inner),
            other => ShaperError::Operation(other),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = ShaperError> = std::result::Result<T, E>;
