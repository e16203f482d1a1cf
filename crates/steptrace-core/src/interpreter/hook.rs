//! Execution-event hook API.
//!
//! An [`Interpreter`](super::Interpreter) has a single hook slot. While a
//! hook is installed it is called for events in every script function frame:
//!
//! - [`TraceEvent::Call`] when a frame starts; returning
//!   [`HookDisposition::Detach`] leaves that frame untraced.
//! - [`TraceEvent::Line`] before each statement that starts a new line, and
//!   on every `while` test and `for` fetch, including the one that ends the
//!   loop. `Detach` stops line events for the rest of the frame.
//! - [`TraceEvent::Exception`] when an error unwinds out of a traced frame,
//!   followed by [`TraceEvent::Return`].
//! - [`TraceEvent::Return`] when a traced frame returns.
//!
//! Module-level code and builtin functions have no traced frames.

use crate::ast::FunctionDef;
use crate::id::{FunctionId, NamespaceId};
use crate::loader::Namespace;

use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    Call,
    Line,
    Return,
    Exception,
}

/// What the hook wants for the frame that produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookDisposition {
    #[default]
    Keep,
    Detach,
}

/// A callback invoked by the interpreter for execution events.
pub trait LineHook {
    fn on_event(&mut self, frame: &FrameView<'_>, event: TraceEvent) -> HookDisposition;
}

impl<F> LineHook for F
where
    F: FnMut(&FrameView<'_>, TraceEvent) -> HookDisposition,
{
    fn on_event(&mut self, frame: &FrameView<'_>, event: TraceEvent) -> HookDisposition {
        self(frame, event)
    }
}

/// Read-only view of the frame an event was raised for.
pub struct FrameView<'a> {
    pub(crate) namespace: &'a Namespace,
    pub(crate) function: &'a FunctionDef,
    pub(crate) slots: &'a [Option<Value>],
    pub(crate) line: usize,
}

impl<'a> FrameView<'a> {
    /// 1-based line about to execute, counted from the start of the source.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn function_name(&self) -> &'a str {
        &self.function.name
    }

    pub fn function_id(&self) -> FunctionId {
        self.function.id
    }

    /// Line of the function's `def` header.
    pub fn first_line(&self) -> usize {
        self.function.first_line
    }

    pub fn last_line(&self) -> usize {
        self.function.last_line
    }

    pub fn namespace(&self) -> &'a Namespace {
        self.namespace
    }

    pub fn namespace_id(&self) -> NamespaceId {
        self.namespace.id()
    }

    /// Bound local variables in declaration order. Locals that have not been
    /// assigned yet are skipped.
    pub fn locals(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        let function: &'a FunctionDef = self.function;
        let slots: &'a [Option<Value>] = self.slots;
        function
            .locals
            .iter()
            .zip(slots.iter())
            .filter_map(|(name, slot)| slot.as_ref().map(|value| (name.as_str(), value)))
    }
}
