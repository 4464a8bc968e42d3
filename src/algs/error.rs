//! Errors raised by operations invoked through the orchestrator.

use thiserror::Error;

use crate::expr::ExpressionError;

/// Failure reported by an operation (built-in or caller-registered).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OperationError {
    /// Generic failure with a description.
    #[error("{0}")]
    Failed(String),
    /// The operation does not handle this input.
    #[error("{operation} does not support {what}")]
    Unsupported {
        operation: &'static str,
        what: String,
    },
    /// An option was present but unusable.
    #[error("invalid option `{name}`: {reason}")]
    InvalidOption { name: String, reason: String },
    /// A layer references an arc that its dataset's pool does not hold.
    #[error("arc reference {arc} is out of range for a pool of {pool_len} arcs")]
    InvalidArcReference { arc: i32, pool_len: usize },
    /// Layer contents are inconsistent (shape/record counts or shape kinds).
    #[error("layer mismatch: {0}")]
    LayerMismatch(String),
    /// Expression evaluation failed inside the operation.
    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

impl OperationError {
    pub(crate) fn unsupported(operation: &'static str, what: impl Into<String>) -> Self {
        OperationError::Unsupported {
            operation,
            what: what.into(),
        }
    }
}

/// Result alias for operation collaborators.
pub type OpResult<T> = Result<T, OperationError>;
