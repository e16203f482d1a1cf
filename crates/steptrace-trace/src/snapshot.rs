//! Independent, thread-safe copies of runtime values.
//!
//! A [`Snapshot`] owns all of its data, so mutating a live list after a step
//! is recorded never changes what that step shows. Values that cannot be
//! copied (iterators, functions, cyclic containers, very deep nesting) fall
//! back to [`Snapshot::Text`] holding the value's repr, one value at a time.

use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use steptrace_core::interpreter::value::{format_float, quote_str};
use steptrace_core::Value;

/// Default limit on container nesting while copying.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// An owned copy of a runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Snapshot>),
    Tuple(Vec<Snapshot>),
    /// Entries in insertion order.
    Dict(Vec<(Snapshot, Snapshot)>),
    /// Textual fallback for a value that could not be copied.
    Text(String),
}

impl Snapshot {
    /// The string used when this snapshot is a JSON object key.
    pub fn key_string(&self) -> String {
        match self {
            Snapshot::None => "null".to_string(),
            Snapshot::Bool(b) => b.to_string(),
            Snapshot::Int(i) => i.to_string(),
            Snapshot::Float(f) => format_float(*f),
            Snapshot::Str(s) | Snapshot::Text(s) => s.clone(),
            other => other.repr(),
        }
    }

    /// Script-syntax rendering, used for keys that JSON cannot express.
    pub fn repr(&self) -> String {
        match self {
            Snapshot::None => "None".to_string(),
            Snapshot::Bool(true) => "True".to_string(),
            Snapshot::Bool(false) => "False".to_string(),
            Snapshot::Int(i) => i.to_string(),
            Snapshot::Float(f) => format_float(*f),
            Snapshot::Str(s) => quote_str(s),
            Snapshot::Text(s) => s.clone(),
            Snapshot::List(items) => {
                let inner: Vec<String> = items.iter().map(Snapshot::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            Snapshot::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            Snapshot::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(Snapshot::repr).collect();
                format!("({})", inner.join(", "))
            }
            Snapshot::Dict(entries) => {
                let inner: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Snapshot::None => serializer.serialize_unit(),
            Snapshot::Bool(b) => serializer.serialize_bool(*b),
            Snapshot::Int(i) => serializer.serialize_i64(*i),
            Snapshot::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Snapshot::Float(_) => serializer.serialize_unit(),
            Snapshot::Str(s) | Snapshot::Text(s) => serializer.serialize_str(s),
            Snapshot::List(items) | Snapshot::Tuple(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Snapshot::Dict(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.key_string(), value)?;
                }
                map.end()
            }
        }
    }
}

/// Why a value could not be copied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("'{type_name}' objects have no data form")]
    Opaque { type_name: &'static str },

    #[error("container refers to itself")]
    Cycle,

    #[error("nesting exceeds {limit} levels")]
    TooDeep { limit: usize },
}

/// Copies runtime values into [`Snapshot`]s.
#[derive(Debug, Clone)]
pub struct Snapshotter {
    max_depth: usize,
}

impl Default for Snapshotter {
    fn default() -> Self {
        Snapshotter::new(DEFAULT_MAX_DEPTH)
    }
}

impl Snapshotter {
    pub fn new(max_depth: usize) -> Self {
        Snapshotter { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Copies every binding, substituting the repr for values that cannot
    /// be copied. Names keep their order.
    pub fn snapshot<'v, I>(&self, bindings: I) -> IndexMap<String, Snapshot>
    where
        I: IntoIterator<Item = (&'v str, &'v Value)>,
    {
        bindings
            .into_iter()
            .map(|(name, value)| (name.to_string(), self.capture_named(name, value)))
            .collect()
    }

    /// Copies one value, falling back to its repr.
    pub fn capture_or_text(&self, value: &Value) -> Snapshot {
        self.capture_named("<value>", value)
    }

    fn capture_named(&self, name: &str, value: &Value) -> Snapshot {
        match self.capture(value) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::debug!(name, error = %err, "snapshot fell back to repr");
                Snapshot::Text(value.repr_bounded(self.max_depth))
            }
        }
    }

    /// Copies `value` exactly, or reports why it cannot be copied.
    pub fn capture(&self, value: &Value) -> Result<Snapshot, SnapshotError> {
        let mut active = Vec::new();
        self.copy(value, 0, &mut active)
    }

    fn copy(&self, value: &Value, depth: usize, active: &mut Vec<usize>) -> Result<Snapshot, SnapshotError> {
        if depth > self.max_depth {
            return Err(SnapshotError::TooDeep {
                limit: self.max_depth,
            });
        }
        Ok(match value {
            Value::None => Snapshot::None,
            Value::Bool(b) => Snapshot::Bool(*b),
            Value::Int(i) => Snapshot::Int(*i),
            Value::Float(f) => Snapshot::Float(*f),
            Value::Str(s) => Snapshot::Str(s.to_string()),
            Value::Tuple(items) => Snapshot::Tuple(
                items
                    .iter()
                    .map(|item| self.copy(item, depth + 1, active))
                    .collect::<Result<_, _>>()?,
            ),
            Value::List(list) => {
                let id = Rc::as_ptr(list) as *const () as usize;
                enter(active, id)?;
                let items = list
                    .borrow()
                    .iter()
                    .map(|item| self.copy(item, depth + 1, active))
                    .collect::<Result<_, _>>();
                active.pop();
                Snapshot::List(items?)
            }
            Value::Dict(dict) => {
                let id = Rc::as_ptr(dict) as *const () as usize;
                enter(active, id)?;
                let entries = dict
                    .borrow()
                    .iter()
                    .map(|(key, item)| {
                        Ok((
                            self.copy(&key.to_value(), depth + 1, active)?,
                            self.copy(item, depth + 1, active)?,
                        ))
                    })
                    .collect::<Result<_, _>>();
                active.pop();
                Snapshot::Dict(entries?)
            }
            Value::Function(_) | Value::Builtin(_) | Value::Range(_) | Value::Iterator(_) => {
                return Err(SnapshotError::Opaque {
                    type_name: value.type_name(),
                })
            }
        })
    }
}

fn enter(active: &mut Vec<usize>, id: usize) -> Result<(), SnapshotError> {
    if active.contains(&id) {
        return Err(SnapshotError::Cycle);
    }
    active.push(id);
    Ok(())
}
