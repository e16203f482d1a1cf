//! Trace orchestration for a single call.
//!
//! [`Tracer::run`] installs a [`StepRecorder`] as the interpreter's hook,
//! calls the function with its one argument, and removes the hook again on
//! every exit path. Removal is tied to the [`ActiveHook`] guard's `Drop`, so
//! an unwinding panic releases the hook too.
//!
//! State per run: `Idle -> Tracing -> (Completed | Failed)`.

use steptrace_core::{Callable, Interpreter, LineHook, Namespace, RuntimeError, Value};

use crate::config::TraceConfig;
use crate::recorder::StepRecorder;
use crate::snapshot::Snapshotter;
use crate::source_map::SourceMap;
use crate::trace::{Trace, TraceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceState {
    /// No run has happened yet.
    Idle,
    /// A hook is installed and the function is executing.
    Tracing,
    Completed,
    Failed,
}

/// Keeps a hook installed on an interpreter for as long as it lives.
pub(crate) struct ActiveHook<'g, 'n, 'h> {
    interpreter: &'g mut Interpreter<'n, 'h>,
}

impl<'g, 'n, 'h> ActiveHook<'g, 'n, 'h> {
    pub(crate) fn install(interpreter: &'g mut Interpreter<'n, 'h>, hook: &'h mut dyn LineHook) -> Self {
        if interpreter.set_hook(Some(hook)).is_some() {
            tracing::warn!("replaced a hook that was still installed");
        }
        ActiveHook { interpreter }
    }

    pub(crate) fn interpreter(&mut self) -> &mut Interpreter<'n, 'h> {
        &mut *self.interpreter
    }
}

impl Drop for ActiveHook<'_, '_, '_> {
    fn drop(&mut self) {
        self.interpreter.set_hook(None);
    }
}

/// Runs functions under the step recorder.
///
/// Owns the step list, the source cache and the snapshot policy. `run`
/// takes `&mut self`, so one tracer never runs two calls at once.
#[derive(Debug)]
pub struct Tracer {
    config: TraceConfig,
    snapshotter: Snapshotter,
    source_map: SourceMap,
    trace: Trace,
    state: TraceState,
}

impl Default for Tracer {
    fn default() -> Self {
        Tracer::new(TraceConfig::default())
    }
}

impl Tracer {
    pub fn new(config: TraceConfig) -> Self {
        Tracer {
            snapshotter: Snapshotter::new(config.snapshot_max_depth),
            source_map: SourceMap::new(),
            trace: Trace::new(),
            state: TraceState::Idle,
            config,
        }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn state(&self) -> TraceState {
        self.state
    }

    /// Steps recorded by the most recent run, including a failed one.
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Calls `callable(argument)` in `namespace`, recording a step for every
    /// line executed by it and by the script functions it calls.
    ///
    /// Errors raised by the function are returned unchanged.
    pub fn run(
        &mut self,
        namespace: &Namespace,
        callable: &Callable,
        argument: Value,
    ) -> Result<TraceResult, RuntimeError> {
        let span = tracing::debug_span!("trace_run", function = callable.name());
        let _enter = span.enter();

        self.trace.reset();
        self.state = TraceState::Tracing;

        let mut recorder = StepRecorder::new(&mut self.source_map, &self.snapshotter, &mut self.trace);
        let mut interpreter = Interpreter::new(namespace, self.config.interpreter_config());
        let outcome = {
            let mut hook = ActiveHook::install(&mut interpreter, &mut recorder);
            hook.interpreter().call(callable, vec![argument])
        };
        let output = interpreter.take_output();

        match outcome {
            Ok(value) => {
                let result = self.snapshotter.capture_or_text(&value);
                self.state = TraceState::Completed;
                tracing::debug!(steps = self.trace.step_count(), "trace completed");
                Ok(TraceResult::new(result, self.trace.steps().to_vec(), output))
            }
            Err(err) => {
                self.state = TraceState::Failed;
                tracing::debug!(
                    steps = self.trace.step_count(),
                    kind = err.kind(),
                    error = %err,
                    "trace failed"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;
    use steptrace_core::{compile, FrameView, HookDisposition, InterpreterConfig, TraceEvent};

    fn trace(source: &str, name: &str, argument: Value) -> (Tracer, Result<TraceResult, RuntimeError>) {
        let ns = compile(source).unwrap();
        let callable = ns.callable(name).unwrap();
        let mut tracer = Tracer::default();
        let result = tracer.run(&ns, &callable, argument);
        (tracer, result)
    }

    #[test]
    fn successful_run_completes() {
        let (tracer, result) = trace("def f(x):\n  y = x + 1\n  return y\n", "f", Value::Int(5));
        let result = result.unwrap();
        assert_eq!(result.result(), &Snapshot::Int(6));
        assert_eq!(result.steps().len(), 2);
        assert_eq!(tracer.state(), TraceState::Completed);
    }

    #[test]
    fn failing_run_keeps_partial_steps_on_the_tracer() {
        let (tracer, result) = trace("def f(x):\n  y = x\n  return y / 0\n", "f", Value::Int(1));
        assert_eq!(result.unwrap_err().to_string(), "division by zero");
        assert_eq!(tracer.state(), TraceState::Failed);
        assert_eq!(tracer.trace().step_count(), 2);
    }

    #[test]
    fn second_run_starts_from_an_empty_trace() {
        let ns = compile("def f(x):\n  return x\n\ndef g(x):\n  a = x\n  b = a\n  return b\n").unwrap();
        let mut tracer = Tracer::default();
        let first = tracer.run(&ns, &ns.callable("g").unwrap(), Value::Int(1)).unwrap();
        let second = tracer.run(&ns, &ns.callable("f").unwrap(), Value::Int(2)).unwrap();
        assert_eq!(first.steps().len(), 3);
        assert_eq!(second.steps().len(), 1);
        assert_eq!(second.steps()[0].index(), 0);
    }

    #[test]
    fn printed_output_is_returned() {
        let (_, result) = trace("def f(x):\n  print('got', x)\n  return None\n", "f", Value::Int(3));
        assert_eq!(result.unwrap().output(), ["got 3".to_string()]);
    }

    #[test]
    fn guard_removes_the_hook() {
        let ns = compile("def f(x):\n  return x\n").unwrap();
        let callable = ns.callable("f").unwrap();
        let mut hook = |_: &FrameView<'_>, _: TraceEvent| HookDisposition::Keep;
        let mut interp = Interpreter::new(&ns, InterpreterConfig::default());
        {
            let mut guard = ActiveHook::install(&mut interp, &mut hook);
            assert!(guard.interpreter().has_hook());
            guard.interpreter().call(&callable, vec![Value::Int(1)]).unwrap();
        }
        assert!(!interp.has_hook());
    }

    #[test]
    fn guard_removes_the_hook_when_unwinding() {
        let ns = compile("").unwrap();
        let mut hook = |_: &FrameView<'_>, _: TraceEvent| HookDisposition::Keep;
        let mut interp = Interpreter::new(&ns, InterpreterConfig::default());
        let (interp_ref, hook_ref) = (&mut interp, &mut hook);
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let (interp_ref, hook_ref) = (interp_ref, hook_ref);
            let _guard = ActiveHook::install(interp_ref, hook_ref);
            panic!("boom");
        }));
        assert!(caught.is_err());
        assert!(!interp.has_hook());
    }
}
