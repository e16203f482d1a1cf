//! Runtime error types raised by executing script code.
//!
//! Each variant corresponds to one Python-style exception kind. `Display`
//! renders the message alone, the way `str(exc)` does; [`RuntimeError::kind`]
//! gives the exception class name for callers that want both.

use serde::{Deserialize, Serialize};

/// Errors raised while executing script code.
///
/// Every variant halts the current call and unwinds to the caller of the
/// interpreter; nothing inside the script can catch them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum RuntimeError {
    #[error("{message}")]
    ZeroDivision { message: String },

    #[error("name '{name}' is not defined")]
    Name { name: String },

    #[error("cannot access local variable '{name}' where it is not associated with a value")]
    UnboundLocal { name: String },

    #[error("{message}")]
    Type { message: String },

    #[error("{message}")]
    Value { message: String },

    #[error("{message}")]
    Index { message: String },

    /// `key` is the repr of the missing key.
    #[error("{key}")]
    Key { key: String },

    #[error("'{type_name}' object has no attribute '{attr}'")]
    Attribute { type_name: String, attr: String },

    #[error("integer overflow")]
    Overflow,

    #[error("maximum recursion depth exceeded (limit {limit})")]
    RecursionLimit { limit: usize },

    #[error("StopIteration")]
    StopIteration,

    #[error("{}", assertion_text(.message))]
    Assertion { message: Option<String> },

    /// Raised explicitly by a `raise` statement.
    #[error("{}", raised_text(.kind, .message))]
    Raised { kind: String, message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

fn assertion_text(message: &Option<String>) -> &str {
    message.as_deref().unwrap_or("AssertionError")
}

fn raised_text<'a>(kind: &'a str, message: &'a str) -> &'a str {
    if message.is_empty() {
        kind
    } else {
        message
    }
}

impl RuntimeError {
    /// Returns the exception class name for this error.
    pub fn kind(&self) -> &str {
        match self {
            RuntimeError::ZeroDivision { .. } => "ZeroDivisionError",
            RuntimeError::Name { .. } => "NameError",
            RuntimeError::UnboundLocal { .. } => "UnboundLocalError",
            RuntimeError::Type { .. } => "TypeError",
            RuntimeError::Value { .. } => "ValueError",
            RuntimeError::Index { .. } => "IndexError",
            RuntimeError::Key { .. } => "KeyError",
            RuntimeError::Attribute { .. } => "AttributeError",
            RuntimeError::Overflow => "OverflowError",
            RuntimeError::RecursionLimit { .. } => "RecursionError",
            RuntimeError::StopIteration => "StopIteration",
            RuntimeError::Assertion { .. } => "AssertionError",
            RuntimeError::Raised { kind, .. } => kind,
            RuntimeError::Internal { .. } => "InternalError",
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::Type {
            message: message.into(),
        }
    }

    pub(crate) fn value_error(message: impl Into<String>) -> Self {
        RuntimeError::Value {
            message: message.into(),
        }
    }

    pub(crate) fn index_error(message: impl Into<String>) -> Self {
        RuntimeError::Index {
            message: message.into(),
        }
    }

    pub(crate) fn zero_division(message: impl Into<String>) -> Self {
        RuntimeError::ZeroDivision {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_exception_str() {
        let err = RuntimeError::Name { name: "q".into() };
        assert_eq!(err.to_string(), "name 'q' is not defined");
        assert_eq!(err.kind(), "NameError");
    }

    #[test]
    fn raised_without_message_shows_kind() {
        let err = RuntimeError::Raised {
            kind: "ValueError".into(),
            message: String::new(),
        };
        assert_eq!(err.to_string(), "ValueError");

        let err = RuntimeError::Raised {
            kind: "ValueError".into(),
            message: "bad".into(),
        };
        assert_eq!(err.to_string(), "bad");
        assert_eq!(err.kind(), "ValueError");
    }

    #[test]
    fn assertion_message_is_optional() {
        assert_eq!(
            RuntimeError::Assertion { message: None }.to_string(),
            "AssertionError"
        );
        assert_eq!(
            RuntimeError::Assertion {
                message: Some("x must be positive".into())
            }
            .to_string(),
            "x must be positive"
        );
    }
}
