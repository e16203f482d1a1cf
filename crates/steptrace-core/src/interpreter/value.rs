//! Runtime value representation for the script interpreter.
//!
//! [`Value`] is the dynamic counterpart of the script language's literals and
//! containers. Lists and dicts are shared, mutable handles (`Rc<RefCell<..>>`)
//! so aliasing behaves the way script authors expect: `b = a; b.append(1)`
//! is visible through `a`. Values are therefore neither `Send` nor safe to
//! keep across a trace; the trace layer copies them into owned snapshots.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use super::builtins::Builtin;
use super::error::RuntimeError;
use crate::id::{FunctionId, NamespaceId};

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type DictRef = Rc<RefCell<IndexMap<HashKey, Value>>>;

/// A runtime value produced by evaluating script expressions.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(ListRef),
    Tuple(Rc<[Value]>),
    /// Insertion-ordered mapping; keys are restricted to hashable values.
    Dict(DictRef),
    Function(Rc<FunctionObject>),
    Builtin(Builtin),
    Range(RangeValue),
    /// Iterator objects returned by `iter`, `enumerate`, `zip` and `reversed`.
    Iterator(Rc<RefCell<IterState>>),
}

/// A script function bound in a namespace.
#[derive(Debug)]
pub struct FunctionObject {
    pub namespace: NamespaceId,
    pub id: FunctionId,
    pub name: String,
    /// Default values for the trailing parameters that declare one,
    /// evaluated once when the `def` statement ran.
    pub defaults: Vec<Value>,
}

/// Nesting limit for [`Value::repr`]; deeper containers render as `...`.
pub const REPR_MAX_DEPTH: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValue {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeValue {
    /// Number of elements. Fails with `OverflowError` when the count does
    /// not fit in an `i64`.
    pub fn len(&self) -> Result<i64, RuntimeError> {
        i64::try_from(self.span()).map_err(|_| RuntimeError::Overflow)
    }

    /// Exact number of elements; every `i64` range fits.
    pub(crate) fn span(&self) -> u64 {
        let (start, stop, step) = (self.start as i128, self.stop as i128, self.step as i128);
        let len = if step > 0 && start < stop {
            (stop - start - 1) / step + 1
        } else if step < 0 && start > stop {
            (start - stop - 1) / (-step) + 1
        } else {
            0
        };
        u64::try_from(len).unwrap_or(u64::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.span() == 0
    }

    /// Element at a non-negative position, if in range.
    pub fn get(&self, index: i64) -> Option<i64> {
        if index < 0 || index as u64 >= self.span() {
            return None;
        }
        Some((self.start as i128 + index as i128 * self.step as i128) as i64)
    }

    pub fn contains(&self, value: i64) -> bool {
        let offset = value as i128 - self.start as i128;
        let step = self.step as i128;
        if offset % step != 0 {
            return false;
        }
        let index = offset / step;
        index >= 0 && index < self.span() as i128
    }
}

/// A hashable dict key.
///
/// Numeric keys compare across representations the way script code expects:
/// `1`, `1.0` and `True` are the same key, and the first one inserted is the
/// one that is kept.
#[derive(Debug, Clone)]
pub enum HashKey {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Tuple(Rc<[HashKey]>),
}

impl HashKey {
    pub fn to_value(&self) -> Value {
        match self {
            HashKey::None => Value::None,
            HashKey::Bool(b) => Value::Bool(*b),
            HashKey::Int(i) => Value::Int(*i),
            HashKey::Float(f) => Value::Float(*f),
            HashKey::Str(s) => Value::Str(s.clone()),
            HashKey::Tuple(items) => Value::Tuple(items.iter().map(HashKey::to_value).collect()),
        }
    }

    fn as_number(&self) -> Option<Number> {
        match self {
            HashKey::Bool(b) => Some(Number::Int(*b as i64)),
            HashKey::Int(i) => Some(Number::Int(*i)),
            HashKey::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return match (a, b) {
                (Number::Float(x), Number::Float(y)) if x.is_nan() && y.is_nan() => true,
                _ => a.num_eq(b),
            };
        }
        match (self, other) {
            (HashKey::None, HashKey::None) => true,
            (HashKey::Str(a), HashKey::Str(b)) => a == b,
            (HashKey::Tuple(a), HashKey::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for HashKey {}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Some(n) = self.as_number() {
            match n {
                Number::Int(i) => {
                    state.write_u8(1);
                    i.hash(state);
                }
                Number::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => {
                    state.write_u8(1);
                    (f as i64).hash(state);
                }
                Number::Float(f) => {
                    state.write_u8(2);
                    f.to_bits().hash(state);
                }
            }
            return;
        }
        match self {
            HashKey::Str(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            HashKey::Tuple(items) => {
                state.write_u8(4);
                items.hash(state);
            }
            _ => state.write_u8(0),
        }
    }
}

/// Numeric view of `bool`, `int` and `float` values.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn num_eq(self, other: Number) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }

    fn num_cmp(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

/// Iterator object state.
///
/// Sequences are snapshotted into `Items` when the iterator is created,
/// except lists, which are walked by index so appends made during a loop
/// are seen by that loop.
#[derive(Debug)]
pub struct IterState {
    kind: &'static str,
    source: IterSource,
}

#[derive(Debug)]
enum IterSource {
    Items(std::vec::IntoIter<Value>),
    List { list: ListRef, index: usize },
    Range { next: i64, remaining: u64, step: i64 },
}

impl IterState {
    pub(crate) fn from_items(kind: &'static str, items: Vec<Value>) -> Self {
        IterState {
            kind,
            source: IterSource::Items(items.into_iter()),
        }
    }

    /// Type name of the iterator, e.g. `list_iterator` or `enumerate`.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub(crate) fn next_item(&mut self) -> Option<Value> {
        match &mut self.source {
            IterSource::Items(items) => items.next(),
            IterSource::List { list, index } => {
                let item = list.borrow().get(*index).cloned();
                if item.is_some() {
                    *index += 1;
                }
                item
            }
            IterSource::Range {
                next,
                remaining,
                step,
            } => {
                if *remaining == 0 {
                    return None;
                }
                let value = *next;
                *remaining -= 1;
                *next = next.wrapping_add(*step);
                Some(Value::Int(value))
            }
        }
    }
}

/// Iteration over any iterable: a fresh iterator, or a shared iterator
/// object that is advanced in place.
pub(crate) enum ValueIter {
    Owned(IterState),
    Shared(Rc<RefCell<IterState>>),
}

impl ValueIter {
    pub(crate) fn next_item(&mut self) -> Option<Value> {
        match self {
            ValueIter::Owned(state) => state.next_item(),
            ValueIter::Shared(state) => state.borrow_mut().next_item(),
        }
    }

    /// Converts into an iterator object value.
    pub(crate) fn into_value(self) -> Value {
        match self {
            ValueIter::Owned(state) => Value::Iterator(Rc::new(RefCell::new(state))),
            ValueIter::Shared(state) => Value::Iterator(state),
        }
    }
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::from(items))
    }

    pub fn dict(entries: IndexMap<HashKey, Value>) -> Value {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    /// Converts a JSON request value into a script value.
    ///
    /// Integers that fit in `i64` become `int`, other numbers `float`;
    /// arrays become lists and objects become dicts with string keys.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                Value::list(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::dict(
                map.iter()
                    .map(|(k, v)| (HashKey::Str(Rc::from(k.as_str())), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Python-style type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Range(_) => "range",
            Value::Iterator(state) => state.borrow().kind(),
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Builtin(_))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(map) => !map.borrow().is_empty(),
            Value::Range(r) => !r.is_empty(),
            Value::Function(_) | Value::Builtin(_) | Value::Iterator(_) => true,
        }
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(*b as i64)),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Integer view for indices and counts; `bool` counts as an integer.
    pub(crate) fn as_index(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn to_hash_key(&self) -> Result<HashKey, RuntimeError> {
        match self {
            Value::None => Ok(HashKey::None),
            Value::Bool(b) => Ok(HashKey::Bool(*b)),
            Value::Int(i) => Ok(HashKey::Int(*i)),
            Value::Float(f) => Ok(HashKey::Float(*f)),
            Value::Str(s) => Ok(HashKey::Str(s.clone())),
            Value::Tuple(items) => Ok(HashKey::Tuple(
                items
                    .iter()
                    .map(Value::to_hash_key)
                    .collect::<Result<Vec<_>, _>>()?
                    .into(),
            )),
            other => Err(RuntimeError::type_error(format!(
                "unhashable type: '{}'",
                other.type_name()
            ))),
        }
    }

    /// Structural equality with numeric cross-type comparison.
    pub fn py_eq(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.num_eq(b);
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || seq_eq(&a.borrow(), &b.borrow())
            }
            (Value::Tuple(a), Value::Tuple(b)) => seq_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.py_eq(other)))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Range(a), Value::Range(b)) => {
                a.span() == b.span() && (a.is_empty() || (a.start == b.start && a.step == b.step))
            }
            (Value::Iterator(a), Value::Iterator(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Identity comparison for `is`.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Iterator(a), Value::Iterator(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Ordering for `<`-style comparisons. `Ok(None)` means the operands
    /// are comparable but unordered (a NaN was involved).
    pub fn py_cmp(&self, other: &Value, op: &str) -> Result<Option<Ordering>, RuntimeError> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Ok(a.num_cmp(b));
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            (Value::List(a), Value::List(b)) => {
                let (a, b) = (a.borrow().clone(), b.borrow().clone());
                seq_cmp(&a, &b, op)
            }
            (Value::Tuple(a), Value::Tuple(b)) => seq_cmp(a, b, op),
            _ => Err(RuntimeError::type_error(format!(
                "'{op}' not supported between instances of '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Starts iterating this value.
    pub(crate) fn iterate(&self) -> Result<ValueIter, RuntimeError> {
        let state = match self {
            Value::List(list) => IterState {
                kind: "list_iterator",
                source: IterSource::List {
                    list: list.clone(),
                    index: 0,
                },
            },
            Value::Tuple(items) => IterState::from_items("tuple_iterator", items.to_vec()),
            Value::Str(s) => IterState::from_items(
                "str_iterator",
                s.chars().map(|c| Value::string(c.encode_utf8(&mut [0; 4]))).collect(),
            ),
            Value::Dict(map) => IterState::from_items(
                "dict_keyiterator",
                map.borrow().keys().map(HashKey::to_value).collect(),
            ),
            Value::Range(r) => IterState {
                kind: "range_iterator",
                source: IterSource::Range {
                    next: r.start,
                    remaining: r.span(),
                    step: r.step,
                },
            },
            Value::Iterator(state) => return Ok(ValueIter::Shared(state.clone())),
            other => {
                return Err(RuntimeError::type_error(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )))
            }
        };
        Ok(ValueIter::Owned(state))
    }

    /// Drains an iterable into a vector of its items.
    pub(crate) fn collect_items(&self) -> Result<Vec<Value>, RuntimeError> {
        let mut iter = self.iterate()?;
        let mut items = Vec::new();
        while let Some(item) = iter.next_item() {
            items.push(item);
        }
        Ok(items)
    }

    /// Text produced by `str(value)`.
    pub fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.repr(),
        }
    }

    /// Text produced by `repr(value)`. Self-containing containers render
    /// the back reference as `[...]` or `{...}`.
    pub fn repr(&self) -> String {
        self.repr_bounded(REPR_MAX_DEPTH)
    }

    /// Like [`Value::repr`], but containers nested more than `max_depth`
    /// levels deep render as `...`.
    pub fn repr_bounded(&self, max_depth: usize) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, &mut Vec::new(), max_depth);
        out
    }

    fn write_repr(&self, out: &mut String, active: &mut Vec<usize>, budget: usize) {
        if budget == 0 && matches!(self, Value::List(_) | Value::Tuple(_) | Value::Dict(_)) {
            out.push_str("...");
            return;
        }
        let inner = budget.saturating_sub(1);
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Value::Float(f) => out.push_str(&format_float(*f)),
            Value::Str(s) => out.push_str(&quote_str(s)),
            Value::List(list) => {
                let addr = Rc::as_ptr(list) as *const () as usize;
                if active.contains(&addr) {
                    out.push_str("[...]");
                    return;
                }
                active.push(addr);
                out.push('[');
                for (i, item) in list.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, active, inner);
                }
                out.push(']');
                active.pop();
            }
            Value::Tuple(items) => {
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, active, inner);
                }
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Dict(map) => {
                let addr = Rc::as_ptr(map) as *const () as usize;
                if active.contains(&addr) {
                    out.push_str("{...}");
                    return;
                }
                active.push(addr);
                out.push('{');
                for (i, (key, value)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.to_value().write_repr(out, active, inner);
                    out.push_str(": ");
                    value.write_repr(out, active, inner);
                }
                out.push('}');
                active.pop();
            }
            Value::Function(func) => {
                let _ = write!(out, "<function {}>", func.name);
            }
            Value::Builtin(b) => {
                let _ = write!(out, "<built-in function {}>", b.name());
            }
            Value::Range(r) => {
                if r.step == 1 {
                    let _ = write!(out, "range({}, {})", r.start, r.stop);
                } else {
                    let _ = write!(out, "range({}, {}, {})", r.start, r.stop, r.step);
                }
            }
            Value::Iterator(state) => {
                let _ = write!(out, "<{} object>", state.borrow().kind());
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.py_eq(other)
    }
}

fn seq_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
}

fn seq_cmp(a: &[Value], b: &[Value], op: &str) -> Result<Option<Ordering>, RuntimeError> {
    for (x, y) in a.iter().zip(b) {
        if !x.py_eq(y) {
            return x.py_cmp(y, op);
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

/// Formats a float the way `repr(float)` does: shortest round-trip digits,
/// a trailing `.0` for integral values, exponent form outside `[1e-4, 1e16)`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    let abs = f.abs();
    if !(1e-4..1e16).contains(&abs) {
        let formatted = format!("{f:e}");
        let (mantissa, exponent) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }
    let mut text = format!("{f}");
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

/// Quotes a string the way `repr(str)` does.
pub fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
