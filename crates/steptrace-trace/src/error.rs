//! Errors surfaced at the request boundary.
//!
//! Every variant becomes the `error` text of a failure response; its
//! `Display` output is that text.

use steptrace_core::{LoadError, RuntimeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The request body is not valid request JSON.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] serde_json::Error),

    /// The request parsed but is unusable.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    /// The traced function raised.
    #[error("{}", execution_text(.0))]
    Execution(#[from] RuntimeError),
}

/// The message alone, or the exception kind when the message is empty.
fn execution_text(err: &RuntimeError) -> String {
    let message = err.to_string();
    if message.is_empty() {
        err.kind().to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_errors_show_their_message() {
        let err = BoundaryError::from(RuntimeError::Name { name: "z".into() });
        assert_eq!(err.to_string(), "name 'z' is not defined");
    }

    #[test]
    fn empty_messages_fall_back_to_the_kind() {
        let err = BoundaryError::from(RuntimeError::Value {
            message: String::new(),
        });
        assert_eq!(err.to_string(), "ValueError");
    }

    #[test]
    fn json_errors_are_prefixed() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = BoundaryError::from(json_err);
        assert!(err.to_string().starts_with("invalid request: "));
    }
}
