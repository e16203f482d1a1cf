//! Load-time error types for steptrace-core.
//!
//! Uses `thiserror` for structured, matchable variants covering everything
//! that can go wrong between receiving source text and holding a callable.

use thiserror::Error;

use crate::interpreter::RuntimeError;

/// Errors produced while compiling submitted code into a namespace or
/// resolving a callable in it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    /// The source text failed to tokenize or parse.
    #[error("{message} (line {line})")]
    Syntax { line: usize, message: String },

    /// No binding with the requested name exists in the namespace.
    #[error("name '{name}' is not defined")]
    NotFound { name: String },

    /// The binding exists but cannot be called.
    #[error("'{type_name}' object bound to '{name}' is not callable")]
    NotCallable { name: String, type_name: String },

    /// A top-level statement raised while the namespace was being populated.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl LoadError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        LoadError::Syntax {
            line,
            message: message.into(),
        }
    }
}
