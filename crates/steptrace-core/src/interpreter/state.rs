//! Interpreter state and statement execution.
//!
//! The [`Interpreter`] walks the syntax tree directly. Each script function
//! call gets a [`Frame`] whose locals live in slots laid out by the parser's
//! `locals` table, so the hook can present them in declaration order without
//! any lookups. Control flow out of blocks is signalled with [`Flow`];
//! errors propagate as `Err` and unwind the Rust call stack.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{Arg, BinOp, BoolOp, CompClause, Expr, FunctionDef, Stmt, StmtKind, Target};
use crate::id::FunctionId;
use crate::loader::{Callable, Namespace};

use super::builtins::Builtin;
use super::error::RuntimeError;
use super::eval;
use super::hook::{FrameView, HookDisposition, LineHook, TraceEvent};
use super::value::{FunctionObject, HashKey, Value};

/// Configuration for the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Maximum number of nested script function calls. Default: 100.
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_call_depth: 100,
        }
    }
}

/// How a block finished.
#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

enum Scope<'n> {
    /// Top-level code; names resolve to namespace globals.
    Module,
    Function {
        def: &'n FunctionDef,
        slots: Vec<Option<Value>>,
        traced: bool,
    },
}

/// One activation: module code or a script function call.
pub(crate) struct Frame<'n> {
    scope: Scope<'n>,
    /// Line of the statement currently executing.
    line: usize,
    /// Comprehension variables, innermost last.
    comp_scopes: Vec<IndexMap<String, Value>>,
}

impl<'n> Frame<'n> {
    fn module() -> Self {
        Frame {
            scope: Scope::Module,
            line: 0,
            comp_scopes: Vec::new(),
        }
    }

    fn is_traced(&self) -> bool {
        matches!(self.scope, Scope::Function { traced: true, .. })
    }

    fn set_traced(&mut self, value: bool) {
        if let Scope::Function { traced, .. } = &mut self.scope {
            *traced = value;
        }
    }
}

/// Tree-walking interpreter over one [`Namespace`].
///
/// At most one [`LineHook`] is installed at a time; it observes every
/// script function frame the interpreter runs while it stays installed.
pub struct Interpreter<'n, 'h> {
    namespace: &'n Namespace,
    hook: Option<&'h mut dyn LineHook>,
    config: InterpreterConfig,
    /// Number of script function frames currently active.
    depth: usize,
    /// Text written by `print`.
    output: String,
}

impl<'n, 'h> Interpreter<'n, 'h> {
    pub fn new(namespace: &'n Namespace, config: InterpreterConfig) -> Self {
        Interpreter {
            namespace,
            hook: None,
            config,
            depth: 0,
            output: String::new(),
        }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn namespace(&self) -> &'n Namespace {
        self.namespace
    }

    /// Installs `hook` (or removes the current one with `None`), returning
    /// whatever was installed before.
    pub fn set_hook(&mut self, hook: Option<&'h mut dyn LineHook>) -> Option<&'h mut dyn LineHook> {
        std::mem::replace(&mut self.hook, hook)
    }

    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// Lines printed so far.
    pub fn output_lines(&self) -> Vec<String> {
        split_lines(&self.output)
    }

    /// Returns the printed lines and clears the output buffer.
    pub fn take_output(&mut self) -> Vec<String> {
        split_lines(&std::mem::take(&mut self.output))
    }

    pub(crate) fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Calls `callable` with positional arguments.
    pub fn call(&mut self, callable: &Callable, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.call_value(callable.value(), args, Vec::new())
    }

    /// Runs the namespace's top-level statements.
    pub(crate) fn run_module(&mut self) -> Result<(), RuntimeError> {
        let namespace: &'n Namespace = self.namespace;
        let mut frame = Frame::module();
        self.exec_block(&mut frame, &namespace.program().body)?;
        Ok(())
    }

    pub(crate) fn call_value(
        &mut self,
        func: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, RuntimeError> {
        match func {
            Value::Function(function) => self.call_function(function, args, kwargs),
            Value::Builtin(builtin) => self.call_builtin(*builtin, args, kwargs),
            other => Err(RuntimeError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(
        &mut self,
        function: &FunctionObject,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, RuntimeError> {
        let namespace: &'n Namespace = self.namespace;
        if function.namespace != namespace.id() {
            return Err(RuntimeError::Internal {
                message: format!(
                    "function '{}' belongs to namespace {} but was called in namespace {}",
                    function.name,
                    function.namespace,
                    namespace.id()
                ),
            });
        }
        let def = namespace
            .function(function.id)
            .ok_or_else(|| RuntimeError::Internal {
                message: format!("unknown function {}", function.id),
            })?;
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::RecursionLimit {
                limit: self.config.max_call_depth,
            });
        }

        let slots = bind_arguments(def, function, args, kwargs)?;
        let mut frame = Frame {
            scope: Scope::Function {
                def,
                slots,
                traced: false,
            },
            line: def.first_line,
            comp_scopes: Vec::new(),
        };
        if self.hook.is_some() {
            let traced = self.emit(&frame, TraceEvent::Call) == HookDisposition::Keep;
            frame.set_traced(traced);
        }

        self.depth += 1;
        let result = self.exec_block(&mut frame, &def.body);
        self.depth -= 1;

        let traced = frame.is_traced();
        match result {
            Ok(flow) => {
                if traced {
                    self.emit(&frame, TraceEvent::Return);
                }
                match flow {
                    Flow::Return(value) => Ok(value),
                    _ => Ok(Value::None),
                }
            }
            Err(err) => {
                if traced {
                    self.emit(&frame, TraceEvent::Exception);
                    self.emit(&frame, TraceEvent::Return);
                }
                Err(err)
            }
        }
    }

    /// Delivers `event` for a function frame to the installed hook.
    fn emit(&mut self, frame: &Frame<'n>, event: TraceEvent) -> HookDisposition {
        let Scope::Function { def, slots, .. } = &frame.scope else {
            return HookDisposition::Keep;
        };
        let Some(hook) = self.hook.as_deref_mut() else {
            return HookDisposition::Keep;
        };
        let view = FrameView {
            namespace: self.namespace,
            function: *def,
            slots: slots.as_slice(),
            line: frame.line,
        };
        hook.on_event(&view, event)
    }

    fn trace_line(&mut self, frame: &mut Frame<'n>, line: usize) {
        frame.line = line;
        if frame.is_traced() && self.emit(frame, TraceEvent::Line) == HookDisposition::Detach {
            frame.set_traced(false);
        }
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn exec_block(&mut self, frame: &mut Frame<'n>, body: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in body {
            match self.exec_stmt(frame, stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, frame: &mut Frame<'n>, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        // Loop headers report their own line events, once per test or fetch.
        match &stmt.kind {
            StmtKind::While { test, body } => return self.exec_while(frame, stmt.line, test, body),
            StmtKind::For { target, iter, body } => {
                return self.exec_for(frame, stmt.line, target, iter, body)
            }
            _ => {}
        }

        if stmt.same_line {
            frame.line = stmt.line;
        } else {
            self.trace_line(frame, stmt.line);
        }

        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(frame, expr)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(frame, value)?;
                for target in targets {
                    self.assign(frame, target, value.clone())?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                self.exec_aug_assign(frame, target, *op, value)?;
            }
            StmtKind::If { test, body, orelse } => {
                let branch = if self.eval(frame, test)?.truthy() {
                    body
                } else {
                    orelse
                };
                return self.exec_block(frame, branch);
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(frame, expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Raise(expr) => return Err(self.build_raise(frame, expr.as_ref())?),
            StmtKind::Assert { test, message } => {
                if !self.eval(frame, test)?.truthy() {
                    let message = match message {
                        Some(expr) => Some(self.eval(frame, expr)?.to_str()),
                        None => None,
                    };
                    return Err(RuntimeError::Assertion { message });
                }
            }
            StmtKind::FunctionDef(id) => self.define_function(frame, *id)?,
            StmtKind::While { .. } | StmtKind::For { .. } => {}
        }
        Ok(Flow::Normal)
    }

    fn exec_while(
        &mut self,
        frame: &mut Frame<'n>,
        line: usize,
        test: &Expr,
        body: &[Stmt],
    ) -> Result<Flow, RuntimeError> {
        loop {
            self.trace_line(frame, line);
            if !self.eval(frame, test)?.truthy() {
                break;
            }
            match self.exec_block(frame, body)? {
                Flow::Break => break,
                Flow::Normal | Flow::Continue => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for(
        &mut self,
        frame: &mut Frame<'n>,
        line: usize,
        target: &Target,
        iter: &Expr,
        body: &[Stmt],
    ) -> Result<Flow, RuntimeError> {
        // The first fetch shares the event that evaluates the iterable.
        self.trace_line(frame, line);
        let iterable = self.eval(frame, iter)?;
        let mut items = iterable.iterate()?;
        while let Some(item) = items.next_item() {
            self.assign(frame, target, item)?;
            match self.exec_block(frame, body)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Normal | Flow::Continue => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
            self.trace_line(frame, line);
        }
        Ok(Flow::Normal)
    }

    fn exec_aug_assign(
        &mut self,
        frame: &mut Frame<'n>,
        target: &Target,
        op: BinOp,
        value: &Expr,
    ) -> Result<(), RuntimeError> {
        match target {
            Target::Name(name) => {
                let current = self.load_name(frame, name)?;
                let rhs = self.eval(frame, value)?;
                let updated = self.inplace_op(op, current, &rhs)?;
                self.store_name(frame, name, updated)
            }
            Target::Index { object, index } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                let current = eval::get_item(&object, &index)?;
                let rhs = self.eval(frame, value)?;
                let updated = self.inplace_op(op, current, &rhs)?;
                eval::set_item(&object, &index, updated)
            }
            Target::Unpack(_) => Err(RuntimeError::Internal {
                message: "augmented assignment to a tuple target".to_string(),
            }),
        }
    }

    /// `+=` on a list extends it in place; everything else rebinds.
    fn inplace_op(
        &mut self,
        op: BinOp,
        current: Value,
        rhs: &Value,
    ) -> Result<Value, RuntimeError> {
        if let (BinOp::Add, Value::List(list)) = (op, &current) {
            let extra = rhs.collect_items()?;
            list.borrow_mut().extend(extra);
            return Ok(current);
        }
        eval::binary_op(op, &current, rhs)
    }

    fn define_function(&mut self, frame: &mut Frame<'n>, id: FunctionId) -> Result<(), RuntimeError> {
        let namespace: &'n Namespace = self.namespace;
        let def = namespace.function(id).ok_or_else(|| RuntimeError::Internal {
            message: format!("unknown function {id}"),
        })?;
        let mut defaults = Vec::new();
        for param in &def.params {
            if let Some(expr) = &param.default {
                defaults.push(self.eval(frame, expr)?);
            }
        }
        let function = FunctionObject {
            namespace: namespace.id(),
            id,
            name: def.name.clone(),
            defaults,
        };
        self.store_name(frame, &def.name, Value::Function(Rc::new(function)))
    }

    fn build_raise(
        &mut self,
        frame: &mut Frame<'n>,
        expr: Option<&Expr>,
    ) -> Result<RuntimeError, RuntimeError> {
        let Some(expr) = expr else {
            return Ok(RuntimeError::Raised {
                kind: "RuntimeError".to_string(),
                message: "No active exception to reraise".to_string(),
            });
        };
        let (kind, args) = match expr {
            Expr::Name(name) if self.is_exception_name(frame, name) => (name, &[][..]),
            Expr::Call { func, args } => match func.as_ref() {
                Expr::Name(name) if self.is_exception_name(frame, name) => (name, args.as_slice()),
                _ => return Ok(self.non_exception_raise(frame, expr)?),
            },
            _ => return Ok(self.non_exception_raise(frame, expr)?),
        };
        let (args, _) = self.eval_args(frame, args)?;
        Ok(exception_from(kind, args))
    }

    fn non_exception_raise(
        &mut self,
        frame: &mut Frame<'n>,
        expr: &Expr,
    ) -> Result<RuntimeError, RuntimeError> {
        self.eval(frame, expr)?;
        Ok(RuntimeError::type_error(
            "exceptions must derive from BaseException",
        ))
    }

    /// Exception class names are recognized by suffix unless a script
    /// binding shadows them.
    fn is_exception_name(&self, frame: &Frame<'n>, name: &str) -> bool {
        let looks_like_exception = name.ends_with("Error")
            || name.ends_with("Exception")
            || name == "StopIteration";
        looks_like_exception && self.lookup_binding(frame, name).is_none()
    }

    // -----------------------------------------------------------------------
    // Names and targets
    // -----------------------------------------------------------------------

    fn lookup_binding(&self, frame: &Frame<'n>, name: &str) -> Option<Value> {
        for scope in frame.comp_scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Some(value.clone());
            }
        }
        if let Scope::Function { def, slots, .. } = &frame.scope {
            if let Some(index) = def.locals.iter().position(|l| l == name) {
                return slots.get(index).cloned().flatten();
            }
        }
        self.namespace.global(name)
    }

    pub(crate) fn load_name(&self, frame: &Frame<'n>, name: &str) -> Result<Value, RuntimeError> {
        if let Some(value) = self.lookup_binding(frame, name) {
            return Ok(value);
        }
        if let Scope::Function { def, .. } = &frame.scope {
            if def.is_local(name) {
                return Err(RuntimeError::UnboundLocal {
                    name: name.to_string(),
                });
            }
        }
        if let Some(builtin) = Builtin::from_name(name) {
            return Ok(Value::Builtin(builtin));
        }
        Err(RuntimeError::Name {
            name: name.to_string(),
        })
    }

    fn store_name(&mut self, frame: &mut Frame<'n>, name: &str, value: Value) -> Result<(), RuntimeError> {
        match &mut frame.scope {
            Scope::Module => {
                self.namespace.set_global(name, value);
                Ok(())
            }
            Scope::Function { def, slots, .. } => {
                let index = def
                    .locals
                    .iter()
                    .position(|l| l == name)
                    .ok_or_else(|| RuntimeError::Internal {
                        message: format!("'{name}' is not a local of '{}'", def.name),
                    })?;
                match slots.get_mut(index) {
                    Some(slot) => {
                        *slot = Some(value);
                        Ok(())
                    }
                    None => Err(RuntimeError::Internal {
                        message: format!("missing slot for '{name}'"),
                    }),
                }
            }
        }
    }

    fn assign(&mut self, frame: &mut Frame<'n>, target: &Target, value: Value) -> Result<(), RuntimeError> {
        match target {
            Target::Name(name) => self.store_name(frame, name, value),
            Target::Index { object, index } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                eval::set_item(&object, &index, value)
            }
            Target::Unpack(targets) => {
                let items = unpack(value, targets.len())?;
                for (target, item) in targets.iter().zip(items) {
                    self.assign(frame, target, item)?;
                }
                Ok(())
            }
        }
    }

    fn bind_comp_target(
        &mut self,
        frame: &mut Frame<'n>,
        target: &Target,
        value: Value,
    ) -> Result<(), RuntimeError> {
        match target {
            Target::Name(name) => {
                if let Some(scope) = frame.comp_scopes.last_mut() {
                    scope.insert(name.clone(), value);
                }
                Ok(())
            }
            Target::Unpack(targets) => {
                let items = unpack(value, targets.len())?;
                for (target, item) in targets.iter().zip(items) {
                    self.bind_comp_target(frame, target, item)?;
                }
                Ok(())
            }
            Target::Index { .. } => self.assign(frame, target, value),
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    pub(crate) fn eval(&mut self, frame: &mut Frame<'n>, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::string(s)),
            Expr::Name(name) => self.load_name(frame, name),
            Expr::List(items) => Ok(Value::list(self.eval_all(frame, items)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(frame, items)?)),
            Expr::Dict(entries) => self.eval_dict(frame, entries),
            Expr::ListComp { element, clauses } => self.eval_list_comp(frame, element, clauses),
            Expr::Unary { op, operand } => {
                let operand = self.eval(frame, operand)?;
                eval::unary_op(*op, &operand)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(frame, left)?;
                let right = self.eval(frame, right)?;
                eval::binary_op(*op, &left, &right)
            }
            Expr::Compare { left, ops } => {
                let mut lhs = self.eval(frame, left)?;
                for (op, rhs) in ops {
                    let rhs = self.eval(frame, rhs)?;
                    if !eval::compare(*op, &lhs, &rhs)? {
                        return Ok(Value::Bool(false));
                    }
                    lhs = rhs;
                }
                Ok(Value::Bool(true))
            }
            Expr::BoolOp { op, left, right } => {
                let left = self.eval(frame, left)?;
                let short_circuit = match op {
                    BoolOp::And => !left.truthy(),
                    BoolOp::Or => left.truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(frame, right)
                }
            }
            Expr::IfExp { test, body, orelse } => {
                if self.eval(frame, test)?.truthy() {
                    self.eval(frame, body)
                } else {
                    self.eval(frame, orelse)
                }
            }
            Expr::Call { func, args } => {
                let func = self.eval(frame, func)?;
                let (args, kwargs) = self.eval_args(frame, args)?;
                self.call_value(&func, args, kwargs)
            }
            Expr::MethodCall {
                object,
                method,
                args,
            } => {
                let object = self.eval(frame, object)?;
                let (args, kwargs) = self.eval_args(frame, args)?;
                self.call_method(&object, method, args, kwargs)
            }
            Expr::Attribute { object, name } => {
                let object = self.eval(frame, object)?;
                Err(eval::attribute_error(&object, name))
            }
            Expr::Index { object, index } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                eval::get_item(&object, &index)
            }
            Expr::Slice {
                object,
                lower,
                upper,
                step,
            } => {
                let object = self.eval(frame, object)?;
                let lower = self.eval_optional(frame, lower.as_deref())?;
                let upper = self.eval_optional(frame, upper.as_deref())?;
                let step = self.eval_optional(frame, step.as_deref())?;
                eval::get_slice(&object, lower, upper, step)
            }
        }
    }

    fn eval_all(&mut self, frame: &mut Frame<'n>, exprs: &[Expr]) -> Result<Vec<Value>, RuntimeError> {
        exprs.iter().map(|e| self.eval(frame, e)).collect()
    }

    fn eval_optional(
        &mut self,
        frame: &mut Frame<'n>,
        expr: Option<&Expr>,
    ) -> Result<Option<Value>, RuntimeError> {
        expr.map(|e| self.eval(frame, e)).transpose()
    }

    fn eval_dict(&mut self, frame: &mut Frame<'n>, entries: &[(Expr, Expr)]) -> Result<Value, RuntimeError> {
        let mut map: IndexMap<HashKey, Value> = IndexMap::with_capacity(entries.len());
        for (key, value) in entries {
            let key = self.eval(frame, key)?.to_hash_key()?;
            let value = self.eval(frame, value)?;
            map.insert(key, value);
        }
        Ok(Value::dict(map))
    }

    fn eval_args(
        &mut self,
        frame: &mut Frame<'n>,
        args: &[Arg],
    ) -> Result<(Vec<Value>, Vec<(String, Value)>), RuntimeError> {
        let mut positional = Vec::with_capacity(args.len());
        let mut keywords = Vec::new();
        for arg in args {
            let value = self.eval(frame, &arg.value)?;
            match &arg.name {
                Some(name) => keywords.push((name.clone(), value)),
                None => positional.push(value),
            }
        }
        Ok((positional, keywords))
    }

    fn eval_list_comp(
        &mut self,
        frame: &mut Frame<'n>,
        element: &Expr,
        clauses: &[CompClause],
    ) -> Result<Value, RuntimeError> {
        frame.comp_scopes.push(IndexMap::new());
        let mut out = Vec::new();
        let result = self.comp_clauses(frame, element, clauses, &mut out);
        frame.comp_scopes.pop();
        result?;
        Ok(Value::list(out))
    }

    fn comp_clauses(
        &mut self,
        frame: &mut Frame<'n>,
        element: &Expr,
        clauses: &[CompClause],
        out: &mut Vec<Value>,
    ) -> Result<(), RuntimeError> {
        let Some((clause, rest)) = clauses.split_first() else {
            out.push(self.eval(frame, element)?);
            return Ok(());
        };
        let iterable = self.eval(frame, &clause.iter)?;
        let mut items = iterable.iterate()?;
        'items: while let Some(item) = items.next_item() {
            self.bind_comp_target(frame, &clause.target, item)?;
            for condition in &clause.conditions {
                if !self.eval(frame, condition)?.truthy() {
                    continue 'items;
                }
            }
            self.comp_clauses(frame, element, rest, out)?;
        }
        Ok(())
    }
}

fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let trimmed = text.strip_suffix('\n').unwrap_or(text);
    trimmed.split('\n').map(str::to_string).collect()
}

/// Splits an iterable into exactly `expected` items.
fn unpack(value: Value, expected: usize) -> Result<Vec<Value>, RuntimeError> {
    let items = value.collect_items().map_err(|_| {
        RuntimeError::type_error(format!(
            "cannot unpack non-iterable {} object",
            value.type_name()
        ))
    })?;
    if items.len() > expected {
        return Err(RuntimeError::value_error(format!(
            "too many values to unpack (expected {expected})"
        )));
    }
    if items.len() < expected {
        return Err(RuntimeError::value_error(format!(
            "not enough values to unpack (expected {expected}, got {})",
            items.len()
        )));
    }
    Ok(items)
}

/// Lays out call arguments in the callee's local slots.
fn bind_arguments(
    def: &FunctionDef,
    function: &FunctionObject,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Vec<Option<Value>>, RuntimeError> {
    let param_count = def.params.len();
    let required = param_count.saturating_sub(function.defaults.len());

    if args.len() > param_count {
        let expected = if required == param_count {
            format!(
                "{param_count} positional argument{}",
                if param_count == 1 { "" } else { "s" }
            )
        } else {
            format!("from {required} to {param_count} positional arguments")
        };
        let given = args.len();
        return Err(RuntimeError::type_error(format!(
            "{}() takes {expected} but {given} {} given",
            def.name,
            if given == 1 { "was" } else { "were" }
        )));
    }

    let mut slots: Vec<Option<Value>> = vec![None; def.locals.len()];
    for (slot, value) in slots.iter_mut().zip(args) {
        *slot = Some(value);
    }

    for (name, value) in kwargs {
        let Some(index) = def.params.iter().position(|p| p.name == name) else {
            return Err(RuntimeError::type_error(format!(
                "{}() got an unexpected keyword argument '{name}'",
                def.name
            )));
        };
        if slots[index].is_some() {
            return Err(RuntimeError::type_error(format!(
                "{}() got multiple values for argument '{name}'",
                def.name
            )));
        }
        slots[index] = Some(value);
    }

    let mut missing = Vec::new();
    for (index, param) in def.params.iter().enumerate() {
        if slots[index].is_some() {
            continue;
        }
        if index >= required {
            slots[index] = function.defaults.get(index - required).cloned();
        } else {
            missing.push(format!("'{}'", param.name));
        }
    }
    if !missing.is_empty() {
        let count = missing.len();
        let names = match missing.as_slice() {
            [one] => one.clone(),
            [first, second] => format!("{first} and {second}"),
            [init @ .., last] => format!("{}, and {last}", init.join(", ")),
            [] => String::new(),
        };
        return Err(RuntimeError::type_error(format!(
            "{}() missing {count} required positional argument{}: {names}",
            def.name,
            if count == 1 { "" } else { "s" }
        )));
    }
    Ok(slots)
}

/// Builds the error for `raise Kind(args...)`.
fn exception_from(kind: &str, args: Vec<Value>) -> RuntimeError {
    let message = match args.as_slice() {
        [] => String::new(),
        [single] => single.to_str(),
        many => Value::tuple(many.to_vec()).repr(),
    };
    match kind {
        "KeyError" => RuntimeError::Key {
            key: args.first().map(Value::repr).unwrap_or_default(),
        },
        "TypeError" => RuntimeError::Type { message },
        "ValueError" => RuntimeError::Value { message },
        "IndexError" => RuntimeError::Index { message },
        "ZeroDivisionError" => RuntimeError::ZeroDivision { message },
        "AssertionError" => RuntimeError::Assertion {
            message: (!message.is_empty()).then_some(message),
        },
        "StopIteration" => RuntimeError::StopIteration,
        _ => RuntimeError::Raised {
            kind: kind.to_string(),
            message,
        },
    }
}
