//! Compiling submitted source text into a callable namespace.

use std::cell::RefCell;

use indexmap::IndexMap;

use crate::ast::{FunctionDef, Program};
use crate::error::LoadError;
use crate::id::{FunctionId, NamespaceId};
use crate::interpreter::{Interpreter, InterpreterConfig, Value};
use crate::parser::parse_program;

/// The globals produced by running a source file's top-level statements,
/// together with the parsed program they refer to.
#[derive(Debug)]
pub struct Namespace {
    id: NamespaceId,
    source: String,
    program: Program,
    globals: RefCell<IndexMap<String, Value>>,
}

impl Namespace {
    fn new(source: &str, program: Program) -> Self {
        Namespace {
            id: NamespaceId::next(),
            source: source.to_string(),
            program,
            globals: RefCell::new(IndexMap::new()),
        }
    }

    pub fn id(&self) -> NamespaceId {
        self.id
    }

    /// The exact source text the namespace was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn function(&self, id: FunctionId) -> Option<&FunctionDef> {
        self.program.function(id)
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name).cloned()
    }

    pub fn global_names(&self) -> Vec<String> {
        self.globals.borrow().keys().cloned().collect()
    }

    pub(crate) fn set_global(&self, name: &str, value: Value) {
        self.globals.borrow_mut().insert(name.to_string(), value);
    }

    /// Resolves `name` to something that can be called.
    pub fn callable(&self, name: &str) -> Result<Callable, LoadError> {
        let value = self.global(name).ok_or_else(|| LoadError::NotFound {
            name: name.to_string(),
        })?;
        if !value.is_callable() {
            return Err(LoadError::NotCallable {
                name: name.to_string(),
                type_name: value.type_name().to_string(),
            });
        }
        Ok(Callable {
            name: name.to_string(),
            value,
        })
    }
}

/// A function value resolved from a namespace by name.
#[derive(Debug, Clone)]
pub struct Callable {
    name: String,
    value: Value,
}

impl Callable {
    /// The name the callable was looked up by.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.value, Value::Builtin(_))
    }
}

/// Parses `source` and runs its top-level statements once, without a hook,
/// to populate a fresh namespace.
pub fn compile(source: &str) -> Result<Namespace, LoadError> {
    compile_with(source, InterpreterConfig::default())
}

/// [`compile`] with an explicit interpreter configuration for the
/// top-level statements.
pub fn compile_with(source: &str, config: InterpreterConfig) -> Result<Namespace, LoadError> {
    let program = parse_program(source)?;
    let namespace = Namespace::new(source, program);
    {
        let mut interpreter = Interpreter::new(&namespace, config);
        interpreter.run_module()?;
        let output = interpreter.take_output();
        if !output.is_empty() {
            tracing::debug!(
                namespace = %namespace.id,
                lines = output.len(),
                "discarded top-level output"
            );
        }
    }
    tracing::debug!(
        namespace = %namespace.id,
        functions = namespace.program.functions.len(),
        "compiled namespace"
    );
    Ok(namespace)
}
