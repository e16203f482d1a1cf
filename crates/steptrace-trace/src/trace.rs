//! Recorded steps and the result of a traced call.

use indexmap::IndexMap;
use serde::Serialize;

use crate::snapshot::Snapshot;

/// One observed line execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    #[serde(rename = "step")]
    index: usize,
    #[serde(rename = "line")]
    line_number: usize,
    #[serde(rename = "code")]
    source_text: String,
    variables: IndexMap<String, Snapshot>,
}

impl Step {
    /// Position in execution order, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// 1-based line number in the submitted code.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Local bindings just before the line ran, in binding order.
    pub fn variables(&self) -> &IndexMap<String, Snapshot> {
        &self.variables
    }
}

/// The steps of one run, in execution order.
///
/// `steps()[i].index() == i` always holds, and `step_count()` equals the
/// number of steps.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    steps: Vec<Step>,
    step_count: usize,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.steps.clear();
        self.step_count = 0;
    }

    /// Appends a step and returns its index.
    pub fn record(&mut self, line_number: usize, source_text: String, variables: IndexMap<String, Snapshot>) -> usize {
        let index = self.step_count;
        self.steps.push(Step {
            index,
            line_number,
            source_text,
            variables,
        });
        self.step_count += 1;
        index
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Outcome of a successful traced call.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceResult {
    result: Snapshot,
    steps: Vec<Step>,
    output: Vec<String>,
}

impl TraceResult {
    pub(crate) fn new(result: Snapshot, steps: Vec<Step>, output: Vec<String>) -> Self {
        TraceResult {
            result,
            steps,
            output,
        }
    }

    /// Snapshot of the function's return value.
    pub fn result(&self) -> &Snapshot {
        &self.result
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Lines the traced code printed.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn into_parts(self) -> (Snapshot, Vec<Step>, Vec<String>) {
        (self.result, self.steps, self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_append_order() {
        let mut trace = Trace::new();
        assert_eq!(trace.record(4, "a = 1".into(), IndexMap::new()), 0);
        assert_eq!(trace.record(2, "b = 2".into(), IndexMap::new()), 1);
        assert_eq!(trace.step_count(), 2);
        let lines: Vec<usize> = trace.steps().iter().map(Step::line_number).collect();
        assert_eq!(lines, vec![4, 2]);

        trace.reset();
        assert!(trace.is_empty());
        assert_eq!(trace.record(1, "c".into(), IndexMap::new()), 0);
    }

    #[test]
    fn step_serializes_with_protocol_names() {
        let mut trace = Trace::new();
        let mut vars = IndexMap::new();
        vars.insert("x".to_string(), Snapshot::Int(5));
        trace.record(2, "y = x + 1".into(), vars);
        let json = serde_json::to_value(&trace.steps()[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"step": 0, "line": 2, "code": "y = x + 1", "variables": {"x": 5}})
        );
    }
}
