pub mod ast;
pub mod error;
pub mod id;
pub mod interpreter;
pub mod lexer;
pub mod loader;
pub mod parser;

// Re-export commonly used types
pub use error::LoadError;
pub use id::{FunctionId, NamespaceId};
pub use interpreter::{
    FrameView, HookDisposition, Interpreter, InterpreterConfig, LineHook, RuntimeError, TraceEvent,
    Value,
};
pub use loader::{compile, compile_with, Callable, Namespace};
