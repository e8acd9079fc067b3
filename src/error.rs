use thiserror::Error;

use crate::tensor::{DType, Shape};

/// Recoverable errors reported by ingot operations.
///
/// Programming errors (malformed tensors, mismatched operand dtypes, an
/// operator the dtype cannot evaluate) are not represented here: those panic
/// with a `contract violation:` message instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngotError {
    /// Two shapes cannot be broadcast against each other
    #[error("Broadcast error: shapes {lhs} and {rhs} are not broadcastable")]
    NotBroadcastable { lhs: Shape, rhs: Shape },

    /// A source cannot be broadcast to a requested target shape
    #[error("Broadcast error: cannot broadcast from extent {from} to {to} at dim {dim} (source {source_shape}, target {target})")]
    BroadcastTarget {
        source_shape: Shape,
        target: Shape,
        dim: usize,
        from: usize,
        to: usize,
    },

    /// Caller-supplied destination has the wrong shape
    #[error("Destination error: expected shape {expected}, got {got}")]
    DestinationShape { expected: Shape, got: Shape },

    /// Caller-supplied destination has the wrong dtype
    #[error("Destination error: expected dtype {expected}, got {got}")]
    DestinationDType { expected: DType, got: DType },

    /// Same-shape operation received different shapes
    #[error("Shape error: {0}")]
    ShapeMismatch(String),

    /// Shape rejected at construction time
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Supplied storage does not match shape and dtype
    #[error("Element count error: shape {shape} with dtype {dtype} needs {expected} bytes, got {got}")]
    ElementCount {
        shape: Shape,
        dtype: DType,
        expected: usize,
        got: usize,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// IO errors
    #[error("IO error: {0}")]
    IoError(String),
}

impl IngotError {
    /// Create a shape error describing what was expected
    pub fn shape_error(expected: &str, got: &str, suggestion: Option<&str>) -> Self {
        let message = if let Some(sugg) = suggestion {
            format!("Expected {}, got {}. Suggestion: {}", expected, got, sugg)
        } else {
            format!("Expected {}, got {}", expected, got)
        };
        IngotError::ShapeMismatch(message)
    }

    pub fn not_broadcastable(lhs: &Shape, rhs: &Shape) -> Self {
        IngotError::NotBroadcastable {
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        }
    }

    pub fn destination_shape(expected: &Shape, got: &Shape) -> Self {
        IngotError::DestinationShape {
            expected: expected.clone(),
            got: got.clone(),
        }
    }
}

impl From<std::io::Error> for IngotError {
    fn from(err: std::io::Error) -> Self {
        IngotError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for IngotError {
    fn from(err: serde_json::Error) -> Self {
        IngotError::SerializationError(err.to_string())
    }
}

/// Result type for ingot operations
pub type IngotResult<T> = Result<T, IngotError>;

/// Extra debugging information attached to an error message
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: String,
    pub tensor_shapes: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            tensor_shapes: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_shape(mut self, shape: &Shape) -> Self {
        self.tensor_shapes.push(shape.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.suggestions.push(suggestion.to_string());
        self
    }

    pub fn to_error_message(&self) -> String {
        let mut message = format!("Operation: {}", self.operation);

        if !self.tensor_shapes.is_empty() {
            message.push_str(&format!("\nTensor shapes: {}", self.tensor_shapes.join(", ")));
        }

        if !self.suggestions.is_empty() {
            message.push_str("\nSuggestions:");
            for suggestion in &self.suggestions {
                message.push_str(&format!("\n  - {}", suggestion));
            }
        }

        message
    }
}

/// Helper trait for adding context to errors
pub trait WithContext<T> {
    fn with_context<F>(self, f: F) -> IngotResult<T>
    where
        F: FnOnce() -> ErrorContext;
}

impl<T> WithContext<T> for IngotResult<T> {
    fn with_context<F>(self, f: F) -> IngotResult<T>
    where
        F: FnOnce() -> ErrorContext,
    {
        self.map_err(|e| {
            let context = f();
            match e {
                IngotError::ShapeMismatch(msg) => {
                    IngotError::ShapeMismatch(format!("{}\nContext: {}", msg, context.to_error_message()))
                }
                IngotError::InvalidShape(msg) => {
                    IngotError::InvalidShape(format!("{}\nContext: {}", msg, context.to_error_message()))
                }
                IngotError::ConfigurationError(msg) => {
                    IngotError::ConfigurationError(format!("{}\nContext: {}", msg, context.to_error_message()))
                }
                _ => e,
            }
        })
    }
}

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotBroadcastable,
    DestinationMismatch,
    ShapeMismatch,
    InvalidShape,
    ElementCount,
    ConfigInvalid,
    SerializationFailed,
    Io,
}

impl IngotError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            IngotError::NotBroadcastable { .. } => ErrorCode::NotBroadcastable,
            IngotError::BroadcastTarget { .. } => ErrorCode::NotBroadcastable,
            IngotError::DestinationShape { .. } => ErrorCode::DestinationMismatch,
            IngotError::DestinationDType { .. } => ErrorCode::DestinationMismatch,
            IngotError::ShapeMismatch(_) => ErrorCode::ShapeMismatch,
            IngotError::InvalidShape(_) => ErrorCode::InvalidShape,
            IngotError::ElementCount { .. } => ErrorCode::ElementCount,
            IngotError::ConfigurationError(_) => ErrorCode::ConfigInvalid,
            IngotError::SerializationError(_) => ErrorCode::SerializationFailed,
            IngotError::IoError(_) => ErrorCode::Io,
        }
    }

    /// Whether the caller can fix the inputs and retry the same call.
    ///
    /// Shape and destination problems are data conditions; IO and
    /// serialization failures come from outside the engine.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::NotBroadcastable
                | ErrorCode::DestinationMismatch
                | ErrorCode::ShapeMismatch
                | ErrorCode::InvalidShape
                | ErrorCode::ElementCount
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            IngotError::NotBroadcastable { lhs, rhs } => {
                format!("Broadcast Error: {} vs {}\n\nAligned from the right, every pair of extents must be equal or contain a 1.", lhs, rhs)
            }
            IngotError::DestinationShape { .. } | IngotError::DestinationDType { .. } => {
                format!("{}\n\nPass a destination created with the broadcast output shape and the operand dtype, or let the operation allocate one.", self)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error() {
        let error = IngotError::shape_error("[3, 4]", "[2, 4]", Some("Did you mean to broadcast?"));
        assert!(error.to_string().contains("Expected [3, 4], got [2, 4]"));
        assert!(error.to_string().contains("Did you mean to broadcast?"));
    }

    #[test]
    fn test_not_broadcastable_message() {
        let error = IngotError::not_broadcastable(&Shape::from((3, 4)), &Shape::from((2, 4)));
        assert_eq!(
            error.to_string(),
            "Broadcast error: shapes [3, 4] and [2, 4] are not broadcastable"
        );
        assert!(error.user_message().contains("equal or contain a 1"));
    }

    #[test]
    fn test_error_context() {
        let context = ErrorContext::new("elementwise")
            .with_shape(&Shape::from((3, 4)))
            .with_shape(&Shape::from((2, 4)))
            .with_suggestion("Insert a size-1 axis to broadcast");

        let message = context.to_error_message();
        assert!(message.contains("Operation: elementwise"));
        assert!(message.contains("Tensor shapes: [3, 4], [2, 4]"));
        assert!(message.contains("Insert a size-1 axis"));

        let result: IngotResult<()> = Err(IngotError::ShapeMismatch("bad".to_string()));
        let err = result.with_context(|| context.clone()).unwrap_err();
        assert!(err.to_string().contains("Operation: elementwise"));
    }

    #[test]
    fn test_error_codes() {
        let err = IngotError::not_broadcastable(&Shape::from(3), &Shape::from(2));
        assert_eq!(err.code(), ErrorCode::NotBroadcastable);
        assert!(err.is_recoverable());

        let err = IngotError::DestinationDType {
            expected: DType::F32,
            got: DType::I32,
        };
        assert_eq!(err.code(), ErrorCode::DestinationMismatch);

        let err = IngotError::ConfigurationError("test".to_string());
        assert_eq!(err.code(), ErrorCode::ConfigInvalid);
        assert!(!err.is_recoverable());
    }
}
