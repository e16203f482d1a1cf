//! End-to-end tests for the tracing engine and its JSON protocol.
//!
//! Tests go through the public API only: compile code, trace a call, and
//! inspect the steps or the serialized response.

use proptest::prelude::*;
use serde_json::json;

use steptrace_core::{compile, Value};
use steptrace_trace::{handle, handle_json, Request, Snapshot, Step, TraceConfig, TraceResult, Tracer};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn run(code: &str, name: &str, argument: Value) -> TraceResult {
    let namespace = compile(code).unwrap();
    let callable = namespace.callable(name).unwrap();
    Tracer::default().run(&namespace, &callable, argument).unwrap()
}

fn lines(result: &TraceResult) -> Vec<usize> {
    result.steps().iter().map(Step::line_number).collect()
}

fn response_json(tracer: &mut Tracer, body: serde_json::Value) -> String {
    let response = handle_json(tracer, &body.to_string());
    response.to_json(true).unwrap()
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

#[test]
fn increment_example() {
    let mut tracer = Tracer::default();
    let out = response_json(
        &mut tracer,
        json!({"code": "def f(x):\n  y = x + 1\n  return y", "functionName": "f", "parameterValue": 5}),
    );
    insta::assert_snapshot!(out, @r###"
    {
      "result": 6,
      "steps": [
        {
          "step": 0,
          "line": 2,
          "code": "y = x + 1",
          "variables": {
            "x": 5
          }
        },
        {
          "step": 1,
          "line": 3,
          "code": "return y",
          "variables": {
            "x": 5,
            "y": 6
          }
        }
      ]
    }
    "###);
}

#[test]
fn unknown_function_is_an_error_only() {
    let mut tracer = Tracer::default();
    let out = response_json(
        &mut tracer,
        json!({"code": "def f(x):\n  return x\n", "functionName": "nope", "parameterValue": 1}),
    );
    insta::assert_snapshot!(out, @r###"
    {
      "error": "name 'nope' is not defined"
    }
    "###);
}

#[test]
fn loop_over_a_dict_argument() {
    let code = "\
def tally(scores):
    total = 0
    for name in scores:
        total += scores[name]
    return {'total': total, 'count': len(scores)}
";
    let mut tracer = Tracer::default();
    let response = handle(
        &mut tracer,
        &Request {
            code: code.to_string(),
            function_name: "tally".to_string(),
            parameter_value: json!({"a": 2, "b": 3}),
        },
    );
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["result"], json!({"total": 5, "count": 2}));
    let lines: Vec<u64> = value["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["line"].as_u64().unwrap())
        .collect();
    assert_eq!(lines, vec![2, 3, 4, 3, 4, 3, 5]);
    assert_eq!(value["steps"][6]["variables"]["name"], json!("b"));
}

// ---------------------------------------------------------------------------
// Trace properties
// ---------------------------------------------------------------------------

#[test]
fn builtin_callable_has_an_empty_trace() {
    let result = run("size = len\n", "size", Value::string("abc"));
    assert!(result.steps().is_empty());
    assert_eq!(result.result(), &Snapshot::Int(3));
}

#[test]
fn earlier_steps_are_not_changed_by_later_mutation() {
    let code = "def f(x):\n  xs = []\n  xs.append(1)\n  xs.append(2)\n  return xs\n";
    let result = run(code, "f", Value::None);
    let xs_at = |i: usize| result.steps()[i].variables().get("xs").cloned();
    assert_eq!(xs_at(0), None);
    assert_eq!(xs_at(1), Some(Snapshot::List(vec![])));
    assert_eq!(xs_at(2), Some(Snapshot::List(vec![Snapshot::Int(1)])));
    assert_eq!(
        xs_at(3),
        Some(Snapshot::List(vec![Snapshot::Int(1), Snapshot::Int(2)]))
    );
}

#[test]
fn unclonable_locals_are_kept_as_text() {
    let code = "def f(x):\n  it = iter(x)\n  a = 1\n  b = 2\n  return a + b\n";
    let result = run(code, "f", Value::list(vec![Value::Int(9)]));
    let last = result.steps().last().unwrap().variables();
    let names: Vec<&str> = last.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["x", "it", "a", "b"]);
    assert_eq!(last["it"], Snapshot::Text("<list_iterator object>".to_string()));
    assert_eq!(last["a"], Snapshot::Int(1));
}

#[test]
fn unclonable_return_value_is_text() {
    let result = run("def f(x):\n  return range(x)\n", "f", Value::Int(4));
    assert_eq!(result.result(), &Snapshot::Text("range(0, 4)".to_string()));
}

#[test]
fn very_deep_return_value_is_bounded_text() {
    // Dropping a 10 000-level list recurses once per level.
    let worker = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let code = "A = []\nfor i in range(10000):\n    A = [A]\n\ndef f(x):\n    return A\n";
            let mut tracer = Tracer::default();
            let response = handle_json(
                &mut tracer,
                &json!({"code": code, "functionName": "f", "parameterValue": 0}).to_string(),
            );
            response.to_json(false).unwrap()
        })
        .unwrap();
    let out: serde_json::Value = serde_json::from_str(&worker.join().unwrap()).unwrap();
    let text = out["result"].as_str().unwrap();
    assert!(text.starts_with("[[["));
    assert!(text.contains("..."));
    assert!(text.len() < 1024);
    assert_eq!(out["steps"].as_array().unwrap().len(), 1);
}

#[test]
fn docstring_is_not_a_step() {
    let result = run("def f(x):\n    \"\"\"doc\"\"\"\n    return x\n", "f", Value::Int(1));
    assert_eq!(lines(&result), vec![3]);
    assert_eq!(result.steps()[0].source_text(), "return x");
}

#[test]
fn rerunning_gives_identical_steps() {
    let code = "def f(n):\n  acc = []\n  for i in range(n):\n    acc.append(i * i)\n  return acc\n";
    let namespace = compile(code).unwrap();
    let callable = namespace.callable("f").unwrap();
    let mut tracer = Tracer::default();
    let first = tracer.run(&namespace, &callable, Value::Int(3)).unwrap();
    let second = tracer.run(&namespace, &callable, Value::Int(3)).unwrap();
    assert_eq!(first.steps(), second.steps());
}

#[test]
fn nested_calls_are_recorded_inline() {
    let code = "\
def square(v):
    return v * v

def f(x):
    a = square(x)
    return a + 1
";
    let result = run(code, "f", Value::Int(3));
    assert_eq!(lines(&result), vec![5, 2, 6]);
    assert_eq!(result.steps()[1].source_text(), "return v * v");
    assert_eq!(result.steps()[1].variables().len(), 1);
}

#[test]
fn failure_then_success_does_not_leak_steps() {
    let code = "def bad(x):\n  y = 1\n  return x / 0\n\ndef good(x):\n  return x\n";
    let namespace = compile(code).unwrap();
    let mut tracer = Tracer::default();
    assert!(tracer.run(&namespace, &namespace.callable("bad").unwrap(), Value::Int(1)).is_err());
    let ok = tracer.run(&namespace, &namespace.callable("good").unwrap(), Value::Int(1)).unwrap();
    assert_eq!(lines(&ok), vec![6]);
}

#[test]
fn recursion_limit_comes_from_config() {
    let code = "def f(n):\n  return f(n + 1)\n";
    let namespace = compile(code).unwrap();
    let callable = namespace.callable("f").unwrap();
    let mut tracer = Tracer::new(TraceConfig {
        max_call_depth: 10,
        ..TraceConfig::default()
    });
    let err = tracer.run(&namespace, &callable, Value::Int(0)).unwrap_err();
    assert_eq!(err.kind(), "RecursionError");
    assert_eq!(tracer.trace().step_count(), 10);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn loop_body_runs_once_per_iteration(n in 0i64..40) {
        let code = "def f(n):\n  total = 0\n  for i in range(n):\n    total += i\n  return total\n";
        let result = run(code, "f", Value::Int(n));
        let count = |line: usize| result.steps().iter().filter(|s| s.line_number() == line).count();
        prop_assert_eq!(count(4), n as usize);
        prop_assert_eq!(count(3), n as usize + 1);
        prop_assert_eq!(result.result(), &Snapshot::Int(n * (n - 1) / 2));
        for (i, step) in result.steps().iter().enumerate() {
            prop_assert_eq!(step.index(), i);
        }
    }

    #[test]
    fn straight_line_code_has_one_step_per_line(k in 1usize..25) {
        let mut code = String::from("def f(x):\n");
        for i in 0..k {
            code.push_str(&format!("  v{i} = x + {i}\n"));
        }
        code.push_str("  return x\n");
        let result = run(&code, "f", Value::Int(1));
        prop_assert_eq!(lines(&result), (2..=k + 2).collect::<Vec<_>>());
        let last = result.steps().last().unwrap();
        prop_assert_eq!(last.variables().len(), k + 1);
    }
}
