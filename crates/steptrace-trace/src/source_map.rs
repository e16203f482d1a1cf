//! Recovers the source lines of traced functions.
//!
//! Lookups are cached per `(namespace, function)` pair. The cache holds a
//! bounded number of entries and evicts the oldest first, so a long-lived
//! tracer that sees a fresh namespace per request does not grow without
//! limit.

use std::sync::Arc;

use indexmap::IndexMap;
use steptrace_core::{FunctionId, Namespace, NamespaceId};

/// Default number of cached functions.
pub const DEFAULT_CAPACITY: usize = 256;

/// The source text of one function, from its `def` line through its last
/// body line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSource {
    first_line: usize,
    lines: Vec<String>,
}

impl FunctionSource {
    pub fn new(first_line: usize, lines: Vec<String>) -> Self {
        FunctionSource { first_line, lines }
    }

    /// 1-based line number of the `def` header in the submitted code.
    pub fn first_line(&self) -> usize {
        self.first_line
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The trimmed text of absolute line `line`, if it belongs to the
    /// function.
    pub fn line(&self, line: usize) -> Option<&str> {
        let offset = line.checked_sub(self.first_line)?;
        self.lines.get(offset).map(|text| text.trim())
    }

    /// Like [`FunctionSource::line`], with a placeholder for lines outside
    /// the function.
    pub fn line_or_placeholder(&self, line: usize) -> String {
        match self.line(line) {
            Some(text) => text.to_string(),
            None => out_of_bounds(line),
        }
    }
}

pub(crate) fn out_of_bounds(line: usize) -> String {
    format!("Line number out of bounds (line: {line})")
}

#[derive(Debug)]
pub struct SourceMap {
    entries: IndexMap<(NamespaceId, FunctionId), Arc<FunctionSource>>,
    capacity: usize,
}

impl Default for SourceMap {
    fn default() -> Self {
        SourceMap::with_capacity(DEFAULT_CAPACITY)
    }
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SourceMap {
            entries: IndexMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns the source of `function` in `namespace`, reading it from the
    /// namespace's source text on first use.
    pub fn lookup(&mut self, namespace: &Namespace, function: FunctionId) -> Option<Arc<FunctionSource>> {
        let key = (namespace.id(), function);
        if let Some(found) = self.entries.get(&key) {
            return Some(Arc::clone(found));
        }

        let def = namespace.function(function)?;
        let first = def.first_line.max(1);
        let count = def.last_line.saturating_sub(first) + 1;
        let lines: Vec<String> = namespace
            .source()
            .lines()
            .skip(first - 1)
            .take(count)
            .map(str::to_string)
            .collect();
        let source = Arc::new(FunctionSource::new(first, lines));

        if self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, Arc::clone(&source));
        tracing::trace!(
            namespace = %namespace.id(),
            function = %function,
            lines = source.lines.len(),
            "cached function source"
        );
        Some(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steptrace_core::compile;

    const SRC: &str = "X = 1\n\ndef f(x):\n    y = x + 1\n    return y\n\ndef g():\n    pass\n";

    #[test]
    fn function_lines_are_offset_by_the_def_line() {
        let ns = compile(SRC).unwrap();
        let mut map = SourceMap::new();
        let source = map.lookup(&ns, FunctionId(0)).unwrap();
        assert_eq!(source.first_line(), 3);
        assert_eq!(source.line(3), Some("def f(x):"));
        assert_eq!(source.line(4), Some("y = x + 1"));
        assert_eq!(source.line(5), Some("return y"));
        assert_eq!(source.line(6), None);
        assert_eq!(source.line(1), None);
    }

    #[test]
    fn out_of_range_lines_get_a_placeholder() {
        let source = FunctionSource::new(3, vec!["def f():".into()]);
        assert_eq!(source.line_or_placeholder(9), "Line number out of bounds (line: 9)");
    }

    #[test]
    fn lookups_are_cached() {
        let ns = compile(SRC).unwrap();
        let mut map = SourceMap::new();
        let a = map.lookup(&ns, FunctionId(1)).unwrap();
        let b = map.lookup(&ns, FunctionId(1)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(map.len(), 1);
        assert!(map.lookup(&ns, FunctionId(9)).is_none());
    }

    #[test]
    fn oldest_entry_is_evicted() {
        let ns = compile(SRC).unwrap();
        let mut map = SourceMap::with_capacity(1);
        let first = map.lookup(&ns, FunctionId(0)).unwrap();
        map.lookup(&ns, FunctionId(1)).unwrap();
        assert_eq!(map.len(), 1);
        let again = map.lookup(&ns, FunctionId(0)).unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(first, again);
    }
}
