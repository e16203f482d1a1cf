//! Operator semantics: arithmetic, comparison, membership, indexing and
//! slicing over runtime [`Value`]s.
//!
//! Integer arithmetic is checked; results that do not fit in `i64` raise
//! [`RuntimeError::Overflow`] instead of wrapping.

use std::cmp::Ordering;

use crate::ast::{BinOp, CmpOp, UnaryOp};

use super::error::RuntimeError;
use super::value::{Number, RangeValue, Value};

pub(crate) fn unary_op(op: UnaryOp, operand: &Value) -> Result<Value, RuntimeError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.truthy())),
        UnaryOp::Neg => match operand.as_number() {
            Some(Number::Int(i)) => i.checked_neg().map(Value::Int).ok_or(RuntimeError::Overflow),
            Some(Number::Float(f)) => Ok(Value::Float(-f)),
            None => Err(RuntimeError::type_error(format!(
                "bad operand type for unary -: '{}'",
                operand.type_name()
            ))),
        },
        UnaryOp::Pos => match operand.as_number() {
            Some(Number::Int(i)) => Ok(Value::Int(i)),
            Some(Number::Float(f)) => Ok(Value::Float(f)),
            None => Err(RuntimeError::type_error(format!(
                "bad operand type for unary +: '{}'",
                operand.type_name()
            ))),
        },
    }
}

pub(crate) fn binary_op(op: BinOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return match (a, b) {
            (Number::Int(x), Number::Int(y)) => int_op(op, x, y),
            _ => float_op(op, a.as_f64(), b.as_f64()),
        };
    }

    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::string(&joined))
        }
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinOp::Add, Value::Str(_) | Value::List(_) | Value::Tuple(_), other) => {
            Err(RuntimeError::type_error(format!(
                "can only concatenate {} (not \"{}\") to {}",
                left.type_name(),
                other.type_name(),
                left.type_name()
            )))
        }
        (BinOp::Mul, _, _) => match repeat(left, right).or_else(|| repeat(right, left)) {
            Some(result) => result,
            None => Err(unsupported(op, left, right)),
        },
        _ => Err(unsupported(op, left, right)),
    }
}

fn unsupported(op: BinOp, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

/// Sequence repetition `seq * n`; `None` when the operands do not fit.
fn repeat(seq: &Value, count: &Value) -> Option<Result<Value, RuntimeError>> {
    let count = count.as_index()?;
    let times = usize::try_from(count.max(0)).unwrap_or(0);
    let result = match seq {
        Value::Str(s) => s
            .len()
            .checked_mul(times)
            .map(|_| Value::string(&s.repeat(times))),
        Value::List(items) => {
            let items = items.borrow();
            items.len().checked_mul(times).map(|_| {
                Value::list(items.iter().cloned().cycle().take(items.len() * times).collect())
            })
        }
        Value::Tuple(items) => items.len().checked_mul(times).map(|_| {
            Value::tuple(items.iter().cloned().cycle().take(items.len() * times).collect())
        }),
        _ => return None,
    };
    Some(result.ok_or(RuntimeError::Overflow))
}

fn int_op(op: BinOp, x: i64, y: i64) -> Result<Value, RuntimeError> {
    let checked = match op {
        BinOp::Add => x.checked_add(y),
        BinOp::Sub => x.checked_sub(y),
        BinOp::Mul => x.checked_mul(y),
        BinOp::Div => {
            if y == 0 {
                return Err(RuntimeError::zero_division("division by zero"));
            }
            return Ok(Value::Float(x as f64 / y as f64));
        }
        BinOp::FloorDiv => {
            if y == 0 {
                return Err(RuntimeError::zero_division(
                    "integer division or modulo by zero",
                ));
            }
            x.checked_div(y).map(|q| {
                if (x % y != 0) && ((x < 0) != (y < 0)) {
                    q - 1
                } else {
                    q
                }
            })
        }
        BinOp::Mod => {
            if y == 0 {
                return Err(RuntimeError::zero_division("integer modulo by zero"));
            }
            x.checked_rem(y).map(|r| {
                if r != 0 && ((r < 0) != (y < 0)) {
                    r + y
                } else {
                    r
                }
            })
        }
        BinOp::Pow => {
            if y < 0 {
                if x == 0 {
                    return Err(RuntimeError::zero_division(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Value::Float((x as f64).powf(y as f64)));
            }
            match u32::try_from(y) {
                Ok(exp) => x.checked_pow(exp),
                Err(_) => match x {
                    0 | 1 => Some(x),
                    -1 => Some(if y % 2 == 0 { 1 } else { -1 }),
                    _ => None,
                },
            }
        }
    };
    checked.map(Value::Int).ok_or(RuntimeError::Overflow)
}

fn float_op(op: BinOp, x: f64, y: f64) -> Result<Value, RuntimeError> {
    let result = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => {
            if y == 0.0 {
                return Err(RuntimeError::zero_division("float division by zero"));
            }
            x / y
        }
        BinOp::FloorDiv => {
            if y == 0.0 {
                return Err(RuntimeError::zero_division("float floor division by zero"));
            }
            (x / y).floor()
        }
        BinOp::Mod => {
            if y == 0.0 {
                return Err(RuntimeError::zero_division("float modulo by zero"));
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }
        }
        BinOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(RuntimeError::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            if x < 0.0 && y.fract() != 0.0 {
                return Err(RuntimeError::value_error(
                    "negative number cannot be raised to a fractional power",
                ));
            }
            x.powf(y)
        }
    };
    Ok(Value::Float(result))
}

pub(crate) fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, RuntimeError> {
    let ordered = |expected: &[Ordering]| -> Result<bool, RuntimeError> {
        Ok(left
            .py_cmp(right, op.symbol())?
            .is_some_and(|ord| expected.contains(&ord)))
    };
    match op {
        CmpOp::Eq => Ok(left.py_eq(right)),
        CmpOp::NotEq => Ok(!left.py_eq(right)),
        CmpOp::Lt => ordered(&[Ordering::Less]),
        CmpOp::Le => ordered(&[Ordering::Less, Ordering::Equal]),
        CmpOp::Gt => ordered(&[Ordering::Greater]),
        CmpOp::Ge => ordered(&[Ordering::Greater, Ordering::Equal]),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|found| !found),
        CmpOp::Is => Ok(left.is_same(right)),
        CmpOp::IsNot => Ok(!left.is_same(right)),
    }
}

/// Membership test `item in container`.
pub(crate) fn contains(container: &Value, item: &Value) -> Result<bool, RuntimeError> {
    match container {
        Value::List(items) => Ok(items.borrow().iter().any(|v| v.py_eq(item))),
        Value::Tuple(items) => Ok(items.iter().any(|v| v.py_eq(item))),
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_ref())),
            other => Err(RuntimeError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Dict(map) => {
            let key = item.to_hash_key()?;
            Ok(map.borrow().contains_key(&key))
        }
        Value::Range(range) => Ok(match item.as_number() {
            Some(Number::Int(i)) => range.contains(i),
            Some(Number::Float(f)) if f.fract() == 0.0 => range.contains(f as i64),
            _ => false,
        }),
        Value::Iterator(_) => {
            let mut iter = container.iterate()?;
            while let Some(candidate) = iter.next_item() {
                if candidate.py_eq(item) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        other => Err(RuntimeError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// Resolves a possibly negative index against `len`.
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        Some(resolved as usize)
    } else {
        None
    }
}

fn sequence_index(container: &Value, index: &Value, noun: &str) -> Result<i64, RuntimeError> {
    index.as_index().ok_or_else(|| match container {
        Value::Str(_) => RuntimeError::type_error(format!(
            "string indices must be integers, not '{}'",
            index.type_name()
        )),
        _ => RuntimeError::type_error(format!(
            "{noun} indices must be integers or slices, not {}",
            index.type_name()
        )),
    })
}

pub(crate) fn get_item(container: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match container {
        Value::List(items) => {
            let i = sequence_index(container, index, "list")?;
            let items = items.borrow();
            normalize_index(i, items.len())
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(|| RuntimeError::index_error("list index out of range"))
        }
        Value::Tuple(items) => {
            let i = sequence_index(container, index, "tuple")?;
            normalize_index(i, items.len())
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(|| RuntimeError::index_error("tuple index out of range"))
        }
        Value::Str(s) => {
            let i = sequence_index(container, index, "string")?;
            let len = s.chars().count();
            normalize_index(i, len)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::string(c.encode_utf8(&mut [0; 4])))
                .ok_or_else(|| RuntimeError::index_error("string index out of range"))
        }
        Value::Dict(map) => {
            let key = index.to_hash_key()?;
            map.borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| RuntimeError::Key { key: index.repr() })
        }
        Value::Range(range) => {
            let i = sequence_index(container, index, "range")?;
            let resolved = if i < 0 { i + range.len()? } else { i };
            range
                .get(resolved)
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::index_error("range object index out of range"))
        }
        other => Err(RuntimeError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

pub(crate) fn set_item(container: &Value, index: &Value, value: Value) -> Result<(), RuntimeError> {
    match container {
        Value::List(items) => {
            let i = sequence_index(container, index, "list")?;
            let mut items = items.borrow_mut();
            let len = items.len();
            match normalize_index(i, len).and_then(|i| items.get_mut(i)) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(RuntimeError::index_error(
                    "list assignment index out of range",
                )),
            }
        }
        Value::Dict(map) => {
            let key = index.to_hash_key()?;
            map.borrow_mut().insert(key, value);
            Ok(())
        }
        other => Err(RuntimeError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

fn slice_bound(value: Option<Value>) -> Result<Option<i64>, RuntimeError> {
    match value {
        None | Some(Value::None) => Ok(None),
        Some(v) => v.as_index().map(Some).ok_or_else(|| {
            RuntimeError::type_error(
                "slice indices must be integers or None or have an __index__ method",
            )
        }),
    }
}

/// Start and stop of a slice over `len` items, clamped the way sequence
/// slicing clamps them.
fn slice_bounds(len: i64, lower: Option<i64>, upper: Option<i64>, step: i64) -> (i64, i64) {
    let adjust = |i: i64| -> i64 {
        if i < 0 {
            let j = i.saturating_add(len);
            if j < 0 {
                if step < 0 {
                    -1
                } else {
                    0
                }
            } else {
                j
            }
        } else if i >= len {
            if step < 0 {
                len - 1
            } else {
                len
            }
        } else {
            i
        }
    };
    let start = lower
        .map(adjust)
        .unwrap_or(if step < 0 { len - 1 } else { 0 });
    let stop = upper.map(adjust).unwrap_or(if step < 0 { -1 } else { len });
    (start, stop)
}

fn slice_positions(start: i64, stop: i64, step: i64) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        positions.push(i as usize);
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    positions
}

pub(crate) fn get_slice(
    container: &Value,
    lower: Option<Value>,
    upper: Option<Value>,
    step: Option<Value>,
) -> Result<Value, RuntimeError> {
    let lower = slice_bound(lower)?;
    let upper = slice_bound(upper)?;
    let step = slice_bound(step)?.unwrap_or(1);
    if step == 0 {
        return Err(RuntimeError::value_error("slice step cannot be zero"));
    }

    match container {
        Value::List(items) => {
            let items = items.borrow();
            let (start, stop) = slice_bounds(items.len() as i64, lower, upper, step);
            Ok(Value::list(
                slice_positions(start, stop, step)
                    .into_iter()
                    .filter_map(|i| items.get(i).cloned())
                    .collect(),
            ))
        }
        Value::Tuple(items) => {
            let (start, stop) = slice_bounds(items.len() as i64, lower, upper, step);
            Ok(Value::tuple(
                slice_positions(start, stop, step)
                    .into_iter()
                    .filter_map(|i| items.get(i).cloned())
                    .collect(),
            ))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (start, stop) = slice_bounds(chars.len() as i64, lower, upper, step);
            let text: String = slice_positions(start, stop, step)
                .into_iter()
                .filter_map(|i| chars.get(i))
                .collect();
            Ok(Value::string(&text))
        }
        Value::Range(range) => {
            let (start, stop) = slice_bounds(range.len()?, lower, upper, step);
            Ok(Value::Range(RangeValue {
                start: range.start.saturating_add(start.saturating_mul(range.step)),
                stop: range.start.saturating_add(stop.saturating_mul(range.step)),
                step: range.step.saturating_mul(step),
            }))
        }
        other => Err(RuntimeError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

pub(crate) fn attribute_error(object: &Value, name: &str) -> RuntimeError {
    RuntimeError::Attribute {
        type_name: object.type_name().to_string(),
        attr: name.to_string(),
    }
}
