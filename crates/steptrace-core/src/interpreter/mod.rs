//! Tree-walking interpreter for submitted scripts, with a line-event hook.
//!
//! Executes the syntax tree produced by [`crate::parser`] directly. Scripts
//! use a small Python-like language: functions, `if`/`while`/`for`, lists,
//! tuples, dicts, strings, comprehensions, and a fixed set of builtins.
//!
//! # Architecture
//!
//! - [`Interpreter`] borrows a [`Namespace`](crate::loader::Namespace) and runs
//!   calls in it. Script function frames are plain Rust recursion, bounded
//!   by [`InterpreterConfig::max_call_depth`].
//! - [`Value`] is the runtime representation. Lists and dicts are shared
//!   through `Rc<RefCell<..>>`, so aliasing behaves the way scripts expect.
//! - [`LineHook`] is the single hook slot. The interpreter reports
//!   [`TraceEvent`]s for every script frame and hands the hook a
//!   [`FrameView`] of the frame's locals.
//! - [`RuntimeError`] is one variant per exception kind. Errors cannot be
//!   caught inside a script; they unwind to the caller of the interpreter.
//!
//! # Usage
//!
//! ```ignore
//! let namespace = compile("def double(x):\n    return x * 2\n")?;
//! let callable = namespace.callable("double")?;
//! let mut interp = Interpreter::new(&namespace, InterpreterConfig::default());
//! let result = interp.call(&callable, vec![Value::Int(21)])?;
//! assert_eq!(result, Value::Int(42));
//! ```

pub mod builtins;
pub mod error;
pub mod eval;
pub mod hook;
pub mod state;
pub mod value;

pub use builtins::Builtin;
pub use error::RuntimeError;
pub use hook::{FrameView, HookDisposition, LineHook, TraceEvent};
pub use state::{Interpreter, InterpreterConfig};
pub use value::{FunctionObject, HashKey, RangeValue, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::compile;

    /// Helper: compile `source` and call `name` with `args`, no hook.
    fn run(source: &str, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        run_with_config(source, name, args, InterpreterConfig::default())
    }

    fn run_with_config(
        source: &str,
        name: &str,
        args: Vec<Value>,
        config: InterpreterConfig,
    ) -> Result<Value, RuntimeError> {
        let namespace = compile(source).unwrap();
        let callable = namespace.callable(name).unwrap();
        let mut interp = Interpreter::new(&namespace, config);
        interp.call(&callable, args)
    }

    /// Helper: run and return printed lines alongside the result.
    fn run_with_output(source: &str, name: &str, args: Vec<Value>) -> (Result<Value, RuntimeError>, Vec<String>) {
        let namespace = compile(source).unwrap();
        let callable = namespace.callable(name).unwrap();
        let mut interp = Interpreter::new(&namespace, InterpreterConfig::default());
        let result = interp.call(&callable, args);
        (result, interp.take_output())
    }

    /// Records every event as `(event, function, line)`, optionally detaching
    /// from one function when its frame starts.
    #[derive(Default)]
    struct EventLog {
        events: Vec<(TraceEvent, String, usize)>,
        detach_from: Option<&'static str>,
    }

    impl LineHook for EventLog {
        fn on_event(&mut self, frame: &FrameView<'_>, event: TraceEvent) -> HookDisposition {
            if event == TraceEvent::Call && self.detach_from == Some(frame.function_name()) {
                return HookDisposition::Detach;
            }
            self.events
                .push((event, frame.function_name().to_string(), frame.line()));
            HookDisposition::Keep
        }
    }

    fn trace_events(source: &str, name: &str, args: Vec<Value>, log: &mut EventLog) -> Result<Value, RuntimeError> {
        let namespace = compile(source).unwrap();
        let callable = namespace.callable(name).unwrap();
        let mut interp = Interpreter::new(&namespace, InterpreterConfig::default());
        interp.set_hook(Some(log));
        interp.call(&callable, args)
    }

    fn lines_of(log: &EventLog, event: TraceEvent) -> Vec<usize> {
        log.events
            .iter()
            .filter(|(e, _, _)| *e == event)
            .map(|(_, _, line)| *line)
            .collect()
    }

    fn list(items: Vec<Value>) -> Value {
        Value::list(items)
    }

    fn s(text: &str) -> Value {
        Value::string(text)
    }

    // -----------------------------------------------------------------------
    // Language semantics
    // -----------------------------------------------------------------------

    #[test]
    fn arithmetic_and_return() {
        let src = "def f(a, b):\n    return a * b + 1\n";
        assert_eq!(run(src, "f", vec![Value::Int(3), Value::Int(4)]).unwrap(), Value::Int(13));
    }

    #[test]
    fn implicit_return_is_none() {
        let src = "def f():\n    x = 1\n";
        assert_eq!(run(src, "f", vec![]).unwrap(), Value::None);
    }

    #[test]
    fn recursion() {
        let src = "def fib(n):\n    if n < 2:\n        return n\n    return fib(n - 1) + fib(n - 2)\n";
        assert_eq!(run(src, "fib", vec![Value::Int(10)]).unwrap(), Value::Int(55));
    }

    #[test]
    fn recursion_limit_is_enforced() {
        let src = "def down(n):\n    return down(n + 1)\n";
        let config = InterpreterConfig { max_call_depth: 8 };
        let err = run_with_config(src, "down", vec![Value::Int(0)], config).unwrap_err();
        assert_eq!(err, RuntimeError::RecursionLimit { limit: 8 });
        assert_eq!(err.kind(), "RecursionError");
    }

    #[test]
    fn while_loop_with_break_and_continue() {
        let src = "\
def f(n):
    i = 0
    total = 0
    while True:
        i += 1
        if i > n:
            break
        if i % 2 == 0:
            continue
        total += i
    return total
";
        assert_eq!(run(src, "f", vec![Value::Int(7)]).unwrap(), Value::Int(16));
    }

    #[test]
    fn for_over_range_and_dict() {
        let src = "\
def f(d):
    out = []
    for k in d:
        out.append(k)
    for i in range(3, 0, -1):
        out.append(i)
    return out
";
        let json = serde_json::json!({"a": 1, "b": 2});
        let result = run(src, "f", vec![Value::from_json(&json)]).unwrap();
        assert_eq!(
            result,
            list(vec![s("a"), s("b"), Value::Int(3), Value::Int(2), Value::Int(1)])
        );
    }

    #[test]
    fn lists_are_shared_by_reference() {
        let src = "def f(xs):\n    ys = xs\n    ys.append(4)\n    return xs\n";
        let result = run(src, "f", vec![list(vec![Value::Int(1)])]).unwrap();
        assert_eq!(result, list(vec![Value::Int(1), Value::Int(4)]));
    }

    #[test]
    fn augmented_add_extends_list_in_place() {
        let src = "def f():\n    a = [1]\n    b = a\n    a += [2]\n    return b\n";
        assert_eq!(run(src, "f", vec![]).unwrap(), list(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn tuple_unpacking_and_swap() {
        let src = "def f():\n    a, b = 1, 2\n    a, b = b, a\n    return (a, b)\n";
        assert_eq!(
            run(src, "f", vec![]).unwrap(),
            Value::tuple(vec![Value::Int(2), Value::Int(1)])
        );
    }

    #[test]
    fn unpacking_count_mismatch() {
        let src = "def f():\n    a, b = [1, 2, 3]\n";
        let err = run(src, "f", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "too many values to unpack (expected 2)");
    }

    #[test]
    fn comprehensions() {
        let src = "\
def f(n):
    squares = [x * x for x in range(n) if x % 2 == 0]
    pairs = dict([(k, v * 10) for k, v in [('a', 1), ('b', 2)]])
    return squares, pairs['b']
";
        let result = run(src, "f", vec![Value::Int(5)]).unwrap();
        assert_eq!(
            result,
            Value::tuple(vec![
                list(vec![Value::Int(0), Value::Int(4), Value::Int(16)]),
                Value::Int(20)
            ])
        );
    }

    #[test]
    fn default_and_keyword_arguments() {
        let src = "\
def greet(name, greeting='Hello'):
    return greeting + ', ' + name

def f():
    return [greet('Ann'), greet('Bo', greeting='Hi'), greet(greeting='Yo', name='Cy')]
";
        assert_eq!(
            run(src, "f", vec![]).unwrap(),
            list(vec![s("Hello, Ann"), s("Hi, Bo"), s("Yo, Cy")])
        );
    }

    #[test]
    fn arity_errors_match_python() {
        let src = "def f(a, b):\n    return a\n";
        let err = run(src, "f", vec![Value::Int(1)]).unwrap_err();
        assert_eq!(err.to_string(), "f() missing 1 required positional argument: 'b'");
        let err = run(src, "f", vec![Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap_err();
        assert_eq!(err.to_string(), "f() takes 2 positional arguments but 3 were given");
    }

    #[test]
    fn name_and_unbound_local_errors() {
        let err = run("def f():\n    return missing\n", "f", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "name 'missing' is not defined");

        let src = "def f():\n    y = x\n    x = 1\n";
        let err = run(src, "f", vec![]).unwrap_err();
        assert_eq!(err.kind(), "UnboundLocalError");
    }

    #[test]
    fn globals_are_visible_in_functions() {
        let src = "SCALE = 10\ndef f(x):\n    return x * SCALE\n";
        assert_eq!(run(src, "f", vec![Value::Int(4)]).unwrap(), Value::Int(40));
    }

    #[test]
    fn raise_builds_typed_errors() {
        let src = "def f(x):\n    if x < 0:\n        raise ValueError('negative')\n    return x\n";
        let err = run(src, "f", vec![Value::Int(-1)]).unwrap_err();
        assert_eq!(err, RuntimeError::Value { message: "negative".into() });

        let src = "def f():\n    raise CustomError('boom')\n";
        let err = run(src, "f", vec![]).unwrap_err();
        assert_eq!(err.kind(), "CustomError");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn assert_failure() {
        let src = "def f(x):\n    assert x > 0, 'x must be positive'\n";
        let err = run(src, "f", vec![Value::Int(0)]).unwrap_err();
        assert_eq!(err.to_string(), "x must be positive");
        assert_eq!(err.kind(), "AssertionError");
    }

    #[test]
    fn builtins_and_methods() {
        let src = "\
def f(words):
    longest = max(words, key=len)
    ordered = sorted(words, reverse=True)
    joined = '-'.join(w.upper() for w in ordered)
    counts = {}
    for w in words:
        counts[w[0]] = counts.get(w[0], 0) + 1
    return [longest, joined, counts['b'], sum(len(w) for w in words), list(enumerate('ab', 1))]
";
        let words = list(vec![s("apple"), s("banana"), s("blueberry")]);
        let result = run(src, "f", vec![words]).unwrap();
        assert_eq!(
            result.repr(),
            "['blueberry', 'BLUEBERRY-BANANA-APPLE', 2, 20, [(1, 'a'), (2, 'b')]]"
        );
    }

    #[test]
    fn print_is_captured() {
        let src = "def f(n):\n    for i in range(n):\n        print('line', i, sep=': ')\n    print('done', end='!')\n";
        let (result, output) = run_with_output(src, "f", vec![Value::Int(2)]);
        assert_eq!(result.unwrap(), Value::None);
        assert_eq!(output, vec!["line: 0", "line: 1", "done!"]);
    }

    #[test]
    fn calling_a_builtin_directly() {
        let namespace = compile("size = len\n").unwrap();
        let callable = namespace.callable("size").unwrap();
        let mut interp = Interpreter::new(&namespace, InterpreterConfig::default());
        let result = interp.call(&callable, vec![s("hello")]).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn type_errors_carry_python_messages() {
        let err = run("def f():\n    return 'a' + 1\n", "f", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "can only concatenate str (not \"int\") to str");
        let err = run("def f():\n    return [1][3]\n", "f", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "list index out of range");
        let err = run("def f():\n    return {}['k']\n", "f", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "'k'");
        let err = run("def f():\n    return [].nope()\n", "f", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "'list' object has no attribute 'nope'");
    }

    // -----------------------------------------------------------------------
    // Hook events
    // -----------------------------------------------------------------------

    #[test]
    fn straight_line_events() {
        let src = "def add(a, b):\n    total = a + b\n    return total\n";
        let mut log = EventLog::default();
        let result = trace_events(src, "add", vec![Value::Int(1), Value::Int(2)], &mut log).unwrap();
        assert_eq!(result, Value::Int(3));
        assert_eq!(
            log.events,
            vec![
                (TraceEvent::Call, "add".to_string(), 1),
                (TraceEvent::Line, "add".to_string(), 2),
                (TraceEvent::Line, "add".to_string(), 3),
                (TraceEvent::Return, "add".to_string(), 3),
            ]
        );
    }

    #[test]
    fn while_header_fires_once_per_test() {
        let src = "def count(n):\n    i = 0\n    while i < n:\n        i += 1\n    return i\n";
        let mut log = EventLog::default();
        trace_events(src, "count", vec![Value::Int(2)], &mut log).unwrap();
        assert_eq!(lines_of(&log, TraceEvent::Line), vec![2, 3, 4, 3, 4, 3, 5]);
    }

    #[test]
    fn for_header_fires_once_per_fetch() {
        let src = "def total(xs):\n    s = 0\n    for x in xs:\n        s += x\n    return s\n";
        let mut log = EventLog::default();
        let xs = list(vec![Value::Int(1), Value::Int(2)]);
        trace_events(src, "total", vec![xs], &mut log).unwrap();
        assert_eq!(lines_of(&log, TraceEvent::Line), vec![2, 3, 4, 3, 4, 3, 5]);
    }

    #[test]
    fn semicolon_statements_share_one_event() {
        let src = "def f():\n    a = 1; b = 2\n    return a + b\n";
        let mut log = EventLog::default();
        trace_events(src, "f", vec![], &mut log).unwrap();
        assert_eq!(lines_of(&log, TraceEvent::Line), vec![2, 3]);
    }

    #[test]
    fn docstrings_fire_no_line_event() {
        let src = "def f(x):\n    \"\"\"Returns x.\"\"\"\n    return x\n";
        let mut log = EventLog::default();
        trace_events(src, "f", vec![Value::Int(1)], &mut log).unwrap();
        assert_eq!(lines_of(&log, TraceEvent::Line), vec![3]);
    }

    #[test]
    fn huge_range_len_overflows_but_still_indexes() {
        let src = "def f(n):\n    r = range(-9223372036854775807 - 1, 9223372036854775807)\n    first = r[0]\n    return len(r)\n";
        let err = run(src, "f", vec![Value::Int(0)]).unwrap_err();
        assert_eq!(err.kind(), "OverflowError");
        let src = "def f(n):\n    r = range(-9223372036854775807 - 1, 9223372036854775807)\n    return r[1]\n";
        assert_eq!(run(src, "f", vec![Value::Int(0)]).unwrap(), Value::Int(i64::MIN + 1));
    }

    #[test]
    fn errors_fire_exception_then_return() {
        let src = "def f(x):\n    y = x + 1\n    return y / 0\n";
        let mut log = EventLog::default();
        let err = trace_events(src, "f", vec![Value::Int(1)], &mut log).unwrap_err();
        assert_eq!(err.to_string(), "division by zero");
        let tail: Vec<TraceEvent> = log.events.iter().rev().take(2).map(|(e, _, _)| *e).collect();
        assert_eq!(tail, vec![TraceEvent::Return, TraceEvent::Exception]);
        assert_eq!(log.events.last().map(|(_, _, line)| *line), Some(3));
    }

    #[test]
    fn nested_calls_are_traced() {
        let src = "def sq(x):\n    return x * x\n\ndef f(x):\n    y = sq(x)\n    return y\n";
        let mut log = EventLog::default();
        trace_events(src, "f", vec![Value::Int(3)], &mut log).unwrap();
        let names: Vec<&str> = log.events.iter().map(|(_, name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["f", "f", "sq", "sq", "sq", "f", "f"]);
    }

    #[test]
    fn detach_on_call_skips_the_frame() {
        let src = "def sq(x):\n    return x * x\n\ndef f(x):\n    y = sq(x)\n    return y\n";
        let mut log = EventLog {
            detach_from: Some("sq"),
            ..EventLog::default()
        };
        trace_events(src, "f", vec![Value::Int(3)], &mut log).unwrap();
        assert!(log.events.iter().all(|(_, name, _)| name == "f"));
        assert_eq!(lines_of(&log, TraceEvent::Line), vec![5, 6]);
    }

    #[test]
    fn detach_on_line_stops_the_frame() {
        let src = "def f():\n    a = 1\n    b = 2\n    return a + b\n";
        let namespace = compile(src).unwrap();
        let callable = namespace.callable("f").unwrap();
        let mut seen = Vec::new();
        let mut hook = |frame: &FrameView<'_>, event: TraceEvent| {
            seen.push((event, frame.line()));
            if event == TraceEvent::Line {
                HookDisposition::Detach
            } else {
                HookDisposition::Keep
            }
        };
        {
            let mut interp = Interpreter::new(&namespace, InterpreterConfig::default());
            interp.set_hook(Some(&mut hook));
            assert!(interp.has_hook());
            assert_eq!(interp.call(&callable, vec![]).unwrap(), Value::Int(3));
        }
        assert_eq!(seen, vec![(TraceEvent::Call, 1), (TraceEvent::Line, 2)]);
    }

    #[test]
    fn frame_view_lists_bound_locals_in_order() {
        let src = "def f(a, b):\n    c = a + b\n    d = c * 2\n    return d\n";
        let namespace = compile(src).unwrap();
        let callable = namespace.callable("f").unwrap();
        let mut snapshots = Vec::new();
        let mut hook = |frame: &FrameView<'_>, event: TraceEvent| {
            if event == TraceEvent::Line {
                let names: Vec<String> = frame.locals().map(|(name, _)| name.to_string()).collect();
                snapshots.push((frame.line(), names));
            }
            HookDisposition::Keep
        };
        {
            let mut interp = Interpreter::new(&namespace, InterpreterConfig::default());
            interp.set_hook(Some(&mut hook));
            interp.call(&callable, vec![Value::Int(1), Value::Int(2)]).unwrap();
        }
        assert_eq!(
            snapshots,
            vec![
                (2, vec!["a".to_string(), "b".to_string()]),
                (3, vec!["a".to_string(), "b".to_string(), "c".to_string()]),
                (4, vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()]),
            ]
        );
    }

    #[test]
    fn set_hook_returns_previous_hook() {
        let namespace = compile("").unwrap();
        let mut log = EventLog::default();
        let mut interp = Interpreter::new(&namespace, InterpreterConfig::default());
        assert!(interp.set_hook(Some(&mut log)).is_none());
        assert!(interp.set_hook(None).is_some());
        assert!(!interp.has_hook());
    }
}
