//! The line hook that turns interpreter events into steps.

use steptrace_core::{FrameView, HookDisposition, LineHook, TraceEvent};

use crate::snapshot::Snapshotter;
use crate::source_map::{out_of_bounds, SourceMap};
use crate::trace::Trace;

/// Appends one [`Step`](crate::Step) per `Line` event to a [`Trace`].
///
/// Every event answers [`HookDisposition::Keep`], so nested frames and loop
/// iterations are all recorded.
pub struct StepRecorder<'a> {
    source_map: &'a mut SourceMap,
    snapshotter: &'a Snapshotter,
    trace: &'a mut Trace,
}

impl<'a> StepRecorder<'a> {
    pub fn new(source_map: &'a mut SourceMap, snapshotter: &'a Snapshotter, trace: &'a mut Trace) -> Self {
        StepRecorder {
            source_map,
            snapshotter,
            trace,
        }
    }

    fn record(&mut self, frame: &FrameView<'_>) {
        let line = frame.line();
        let text = match self.source_map.lookup(frame.namespace(), frame.function_id()) {
            Some(source) => source.line_or_placeholder(line),
            None => out_of_bounds(line),
        };
        let variables = self.snapshotter.snapshot(frame.locals());
        let index = self.trace.record(line, text, variables);
        tracing::trace!(index, line, function = frame.function_name(), "recorded step");
    }
}

impl LineHook for StepRecorder<'_> {
    fn on_event(&mut self, frame: &FrameView<'_>, event: TraceEvent) -> HookDisposition {
        if event == TraceEvent::Line {
            self.record(frame);
        }
        HookDisposition::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steptrace_core::{compile, Interpreter, InterpreterConfig, Value};

    #[test]
    fn records_only_line_events() {
        let ns = compile("def f(x):\n    y = x * 2\n    return y\n").unwrap();
        let callable = ns.callable("f").unwrap();
        let mut source_map = SourceMap::new();
        let snapshotter = Snapshotter::default();
        let mut trace = Trace::new();
        {
            let mut recorder = StepRecorder::new(&mut source_map, &snapshotter, &mut trace);
            let mut interp = Interpreter::new(&ns, InterpreterConfig::default());
            interp.set_hook(Some(&mut recorder));
            interp.call(&callable, vec![Value::Int(4)]).unwrap();
        }
        let codes: Vec<&str> = trace.steps().iter().map(|s| s.source_text()).collect();
        assert_eq!(codes, vec!["y = x * 2", "return y"]);
        assert_eq!(trace.steps()[1].variables().len(), 2);
        assert_eq!(source_map.len(), 1);
    }
}
