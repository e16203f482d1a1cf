//! Builtin functions and the methods of `list`, `dict` and `str`.
//!
//! Builtins run without a frame of their own, so they never produce hook
//! events; script functions they call back into (a `key=` function passed to
//! `sorted`, say) are traced like any other call.

use std::cmp::Ordering;
use std::rc::Rc;

use indexmap::IndexMap;

use super::error::RuntimeError;
use super::eval::{self, normalize_index};
use super::state::Interpreter;
use super::value::{HashKey, IterState, Number, RangeValue, Value};
use crate::ast::BinOp;

macro_rules! builtins {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// A builtin function, bound in every namespace's builtin scope.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Builtin {
            $($variant),*
        }

        impl Builtin {
            pub const ALL: &'static [Builtin] = &[$(Builtin::$variant),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Builtin::$variant => $name),*
                }
            }

            pub fn from_name(name: &str) -> Option<Builtin> {
                match name {
                    $($name => Some(Builtin::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

builtins! {
    Print => "print",
    Len => "len",
    Range => "range",
    Abs => "abs",
    Min => "min",
    Max => "max",
    Sum => "sum",
    Str => "str",
    Int => "int",
    Float => "float",
    Bool => "bool",
    List => "list",
    Tuple => "tuple",
    Dict => "dict",
    Sorted => "sorted",
    Reversed => "reversed",
    Enumerate => "enumerate",
    Zip => "zip",
    Round => "round",
    Iter => "iter",
    Next => "next",
    Repr => "repr",
    Ord => "ord",
    Chr => "chr",
    Any => "any",
    All => "all",
}

type Kwargs = Vec<(String, Value)>;

/// Removes keyword argument `name`, if present.
fn take_kwarg(kwargs: &mut Kwargs, name: &str) -> Option<Value> {
    let index = kwargs.iter().position(|(k, _)| k == name)?;
    Some(kwargs.remove(index).1)
}

fn reject_kwargs(func: &str, kwargs: &Kwargs) -> Result<(), RuntimeError> {
    match kwargs.first() {
        None => Ok(()),
        Some((name, _)) => Err(RuntimeError::type_error(format!(
            "{func}() got an unexpected keyword argument '{name}'"
        ))),
    }
}

fn arity(func: &str, args: &[Value], min: usize, max: usize) -> Result<(), RuntimeError> {
    let given = args.len();
    if (min..=max).contains(&given) {
        return Ok(());
    }
    let message = if min == max && min == 1 {
        format!("{func}() takes exactly one argument ({given} given)")
    } else if min == max && min == 0 {
        format!("{func}() takes no arguments ({given} given)")
    } else if given < min {
        format!(
            "{func} expected at least {min} argument{}, got {given}",
            if min == 1 { "" } else { "s" }
        )
    } else {
        format!(
            "{func} expected at most {max} argument{}, got {given}",
            if max == 1 { "" } else { "s" }
        )
    };
    Err(RuntimeError::type_error(message))
}

fn int_arg(value: &Value) -> Result<i64, RuntimeError> {
    value.as_index().ok_or_else(|| {
        RuntimeError::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

fn str_arg<'v>(func: &str, value: &'v Value) -> Result<&'v str, RuntimeError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::type_error(format!(
            "{func}() argument must be str, not {}",
            other.type_name()
        ))),
    }
}

fn text_kwarg(kwargs: &mut Kwargs, name: &str, default: &str) -> Result<String, RuntimeError> {
    match take_kwarg(kwargs, name) {
        None | Some(Value::None) => Ok(default.to_string()),
        Some(Value::Str(s)) => Ok(s.to_string()),
        Some(other) => Err(RuntimeError::type_error(format!(
            "{name} must be None or a string, not {}",
            other.type_name()
        ))),
    }
}

fn char_value(c: char) -> Value {
    Value::string(c.encode_utf8(&mut [0; 4]))
}

fn float_to_int(f: f64) -> Result<i64, RuntimeError> {
    if f.is_nan() {
        return Err(RuntimeError::value_error(
            "cannot convert float NaN to integer",
        ));
    }
    if !f.is_finite() || f.abs() >= 9.223_372_036_854_775_807e18 {
        return Err(RuntimeError::Overflow);
    }
    Ok(f as i64)
}

fn less_than(a: &Value, b: &Value) -> Result<bool, RuntimeError> {
    Ok(matches!(a.py_cmp(b, "<")?, Some(Ordering::Less)))
}

/// Stable merge sort over `(key, item)` pairs using only `<`, so a failed
/// comparison surfaces as an error instead of an inconsistent order.
fn merge_sort(
    mut entries: Vec<(Value, Value)>,
    reverse: bool,
) -> Result<Vec<(Value, Value)>, RuntimeError> {
    if entries.len() <= 1 {
        return Ok(entries);
    }
    let right = entries.split_off(entries.len() / 2);
    let left = merge_sort(entries, reverse)?;
    let right = merge_sort(right, reverse)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some((lk, _)), Some((rk, _))) => {
                if reverse {
                    less_than(lk, rk)?
                } else {
                    less_than(rk, lk)?
                }
            }
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        if let Some(entry) = next {
            merged.push(entry);
        }
    }
    Ok(merged)
}

impl<'n, 'h> Interpreter<'n, 'h> {
    pub(crate) fn call_builtin(
        &mut self,
        builtin: Builtin,
        mut args: Vec<Value>,
        mut kwargs: Kwargs,
    ) -> Result<Value, RuntimeError> {
        let name = builtin.name();
        match builtin {
            Builtin::Print => {
                let sep = text_kwarg(&mut kwargs, "sep", " ")?;
                let end = text_kwarg(&mut kwargs, "end", "\n")?;
                reject_kwargs(name, &kwargs)?;
                let text = args.iter().map(Value::to_str).collect::<Vec<_>>().join(&sep);
                self.write_output(&text);
                self.write_output(&end);
                Ok(Value::None)
            }
            Builtin::Len => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 1)?;
                let len = match &args[0] {
                    Value::Str(s) => s.chars().count() as i64,
                    Value::List(items) => items.borrow().len() as i64,
                    Value::Tuple(items) => items.len() as i64,
                    Value::Dict(map) => map.borrow().len() as i64,
                    Value::Range(range) => range.len()?,
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )))
                    }
                };
                Ok(Value::Int(len))
            }
            Builtin::Range => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 3)?;
                let ints = args.iter().map(int_arg).collect::<Result<Vec<_>, _>>()?;
                let (start, stop, step) = match ints.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => (0, 0, 1),
                };
                if step == 0 {
                    return Err(RuntimeError::value_error("range() arg 3 must not be zero"));
                }
                Ok(Value::Range(RangeValue { start, stop, step }))
            }
            Builtin::Abs => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 1)?;
                match args[0].as_number() {
                    Some(Number::Int(i)) => i.checked_abs().map(Value::Int).ok_or(RuntimeError::Overflow),
                    Some(Number::Float(f)) => Ok(Value::Float(f.abs())),
                    None => Err(RuntimeError::type_error(format!(
                        "bad operand type for abs(): '{}'",
                        args[0].type_name()
                    ))),
                }
            }
            Builtin::Min | Builtin::Max => self.min_max(builtin, args, kwargs),
            Builtin::Sum => {
                let start = take_kwarg(&mut kwargs, "start");
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 2)?;
                let mut total = match start.or_else(|| args.get(1).cloned()) {
                    Some(Value::Str(_)) => {
                        return Err(RuntimeError::type_error(
                            "sum() can't sum strings [use ''.join(seq) instead]",
                        ))
                    }
                    Some(start) => start,
                    None => Value::Int(0),
                };
                for item in args[0].collect_items()? {
                    total = eval::binary_op(BinOp::Add, &total, &item)?;
                }
                Ok(total)
            }
            Builtin::Str => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 0, 1)?;
                Ok(match args.first() {
                    Some(value) => Value::string(&value.to_str()),
                    None => Value::string(""),
                })
            }
            Builtin::Int => {
                let base = take_kwarg(&mut kwargs, "base");
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 0, 2)?;
                let base = base.or_else(|| args.get(1).cloned());
                match (args.first(), base) {
                    (None, _) => Ok(Value::Int(0)),
                    (Some(Value::Str(s)), base) => {
                        let radix = match base {
                            Some(b) => int_arg(&b)?,
                            None => 10,
                        };
                        parse_int(s, radix).map(Value::Int)
                    }
                    (Some(_), Some(_)) => Err(RuntimeError::type_error(
                        "int() can't convert non-string with explicit base",
                    )),
                    (Some(value), None) => match value.as_number() {
                        Some(Number::Int(i)) => Ok(Value::Int(i)),
                        Some(Number::Float(f)) => float_to_int(f.trunc()).map(Value::Int),
                        None => Err(RuntimeError::type_error(format!(
                            "int() argument must be a string or a real number, not '{}'",
                            value.type_name()
                        ))),
                    },
                }
            }
            Builtin::Float => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 0, 1)?;
                match args.first() {
                    None => Ok(Value::Float(0.0)),
                    Some(Value::Str(s)) => {
                        let text = s.trim().replace('_', "");
                        text.parse::<f64>().map(Value::Float).map_err(|_| {
                            RuntimeError::value_error(format!(
                                "could not convert string to float: {}",
                                args[0].repr()
                            ))
                        })
                    }
                    Some(value) => match value.as_number() {
                        Some(n) => Ok(Value::Float(n.as_f64())),
                        None => Err(RuntimeError::type_error(format!(
                            "float() argument must be a string or a real number, not '{}'",
                            value.type_name()
                        ))),
                    },
                }
            }
            Builtin::Bool => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 0, 1)?;
                Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
            }
            Builtin::List => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 0, 1)?;
                match args.first() {
                    Some(iterable) => Ok(Value::list(iterable.collect_items()?)),
                    None => Ok(Value::list(Vec::new())),
                }
            }
            Builtin::Tuple => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 0, 1)?;
                match args.first() {
                    Some(Value::Tuple(items)) => Ok(Value::Tuple(items.clone())),
                    Some(iterable) => Ok(Value::tuple(iterable.collect_items()?)),
                    None => Ok(Value::tuple(Vec::new())),
                }
            }
            Builtin::Dict => {
                arity(name, &args, 0, 1)?;
                let mut map = IndexMap::new();
                if let Some(source) = args.first() {
                    update_dict(&mut map, source)?;
                }
                for (key, value) in kwargs {
                    map.insert(HashKey::Str(Rc::from(key.as_str())), value);
                }
                Ok(Value::dict(map))
            }
            Builtin::Sorted => {
                let key = take_kwarg(&mut kwargs, "key");
                let reverse = take_kwarg(&mut kwargs, "reverse");
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 1)?;
                let items = args[0].collect_items()?;
                let sorted = self.sort_items(items, key, reverse)?;
                Ok(Value::list(sorted))
            }
            Builtin::Reversed => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 1)?;
                let kind = match &args[0] {
                    Value::List(_) => "list_reverseiterator",
                    Value::Range(_) => "range_iterator",
                    Value::Tuple(_) | Value::Str(_) => "reversed",
                    Value::Dict(_) => "dict_reversekeyiterator",
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "'{}' object is not reversible",
                            other.type_name()
                        )))
                    }
                };
                let mut items = args[0].collect_items()?;
                items.reverse();
                Ok(Value::Iterator(Rc::new(std::cell::RefCell::new(
                    IterState::from_items(kind, items),
                ))))
            }
            Builtin::Enumerate => {
                let start = take_kwarg(&mut kwargs, "start");
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 2)?;
                let start = match start.or_else(|| args.get(1).cloned()) {
                    Some(v) => int_arg(&v)?,
                    None => 0,
                };
                let mut pairs = Vec::new();
                for (offset, item) in args[0].collect_items()?.into_iter().enumerate() {
                    let index = start
                        .checked_add(offset as i64)
                        .ok_or(RuntimeError::Overflow)?;
                    pairs.push(Value::tuple(vec![Value::Int(index), item]));
                }
                Ok(Value::Iterator(Rc::new(std::cell::RefCell::new(
                    IterState::from_items("enumerate", pairs),
                ))))
            }
            Builtin::Zip => {
                reject_kwargs(name, &kwargs)?;
                let columns = args
                    .iter()
                    .map(Value::collect_items)
                    .collect::<Result<Vec<_>, _>>()?;
                let len = columns.iter().map(Vec::len).min().unwrap_or(0);
                let rows = (0..len)
                    .map(|i| {
                        Value::tuple(columns.iter().filter_map(|c| c.get(i).cloned()).collect())
                    })
                    .collect();
                Ok(Value::Iterator(Rc::new(std::cell::RefCell::new(
                    IterState::from_items("zip", rows),
                ))))
            }
            Builtin::Round => {
                let ndigits = take_kwarg(&mut kwargs, "ndigits");
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 2)?;
                let ndigits = match ndigits.or_else(|| args.get(1).cloned()) {
                    None | Some(Value::None) => None,
                    Some(v) => Some(int_arg(&v)?),
                };
                round(&args[0], ndigits)
            }
            Builtin::Iter => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 1)?;
                Ok(args[0].iterate()?.into_value())
            }
            Builtin::Next => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 2)?;
                let Value::Iterator(state) = &args[0] else {
                    return Err(RuntimeError::type_error(format!(
                        "'{}' object is not an iterator",
                        args[0].type_name()
                    )));
                };
                let next = state.borrow_mut().next_item();
                match next {
                    Some(item) => Ok(item),
                    None => args.get(1).cloned().ok_or(RuntimeError::StopIteration),
                }
            }
            Builtin::Repr => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 1)?;
                Ok(Value::string(&args[0].repr()))
            }
            Builtin::Ord => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 1)?;
                let Value::Str(s) = &args[0] else {
                    return Err(RuntimeError::type_error(format!(
                        "ord() expected string of length 1, but {} found",
                        args[0].type_name()
                    )));
                };
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Int(c as i64)),
                    _ => Err(RuntimeError::type_error(format!(
                        "ord() expected a character, but string of length {} found",
                        s.chars().count()
                    ))),
                }
            }
            Builtin::Chr => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 1)?;
                let code = int_arg(&args[0])?;
                u32::try_from(code)
                    .ok()
                    .and_then(char::from_u32)
                    .map(char_value)
                    .ok_or_else(|| RuntimeError::value_error("chr() arg not in range(0x110000)"))
            }
            Builtin::Any | Builtin::All => {
                reject_kwargs(name, &kwargs)?;
                arity(name, &args, 1, 1)?;
                let want = builtin == Builtin::Any;
                let mut iter = args.remove(0).iterate()?;
                while let Some(item) = iter.next_item() {
                    if item.truthy() == want {
                        return Ok(Value::Bool(want));
                    }
                }
                Ok(Value::Bool(!want))
            }
        }
    }

    fn min_max(
        &mut self,
        builtin: Builtin,
        args: Vec<Value>,
        mut kwargs: Kwargs,
    ) -> Result<Value, RuntimeError> {
        let name = builtin.name();
        let key = take_kwarg(&mut kwargs, "key").filter(|k| !matches!(k, Value::None));
        let default = take_kwarg(&mut kwargs, "default");
        reject_kwargs(name, &kwargs)?;
        arity(name, &args, 1, usize::MAX)?;

        let items = if args.len() == 1 {
            args[0].collect_items()?
        } else {
            args
        };

        let mut best: Option<(Value, Value)> = None;
        for item in items {
            let score = match &key {
                Some(key) => self.call_value(key, vec![item.clone()], Vec::new())?,
                None => item.clone(),
            };
            let replace = match &best {
                None => true,
                Some((best_score, _)) => match builtin {
                    Builtin::Min => less_than(&score, best_score)?,
                    _ => less_than(best_score, &score)?,
                },
            };
            if replace {
                best = Some((score, item));
            }
        }

        match (best, default) {
            (Some((_, item)), _) => Ok(item),
            (None, Some(default)) => Ok(default),
            (None, None) => Err(RuntimeError::value_error(format!(
                "{name}() iterable argument is empty"
            ))),
        }
    }

    /// Sorts items by an optional key function; ties keep their order.
    fn sort_items(
        &mut self,
        items: Vec<Value>,
        key: Option<Value>,
        reverse: Option<Value>,
    ) -> Result<Vec<Value>, RuntimeError> {
        let reverse = reverse.is_some_and(|r| r.truthy());
        let key = key.filter(|k| !matches!(k, Value::None));
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let score = match &key {
                Some(key) => self.call_value(key, vec![item.clone()], Vec::new())?,
                None => item.clone(),
            };
            entries.push((score, item));
        }
        Ok(merge_sort(entries, reverse)?
            .into_iter()
            .map(|(_, item)| item)
            .collect())
    }

    pub(crate) fn call_method(
        &mut self,
        object: &Value,
        method: &str,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<Value, RuntimeError> {
        match object {
            Value::List(_) => self.list_method(object, method, args, kwargs),
            Value::Dict(_) => dict_method(object, method, args, kwargs),
            Value::Str(s) => {
                reject_kwargs(method, &kwargs)?;
                str_method(object, s, method, args)
            }
            _ => Err(eval::attribute_error(object, method)),
        }
    }

    fn list_method(
        &mut self,
        object: &Value,
        method: &str,
        mut args: Vec<Value>,
        mut kwargs: Kwargs,
    ) -> Result<Value, RuntimeError> {
        let Value::List(list) = object else {
            return Err(eval::attribute_error(object, method));
        };
        if method == "sort" {
            let key = take_kwarg(&mut kwargs, "key");
            let reverse = take_kwarg(&mut kwargs, "reverse");
            reject_kwargs(method, &kwargs)?;
            arity(method, &args, 0, 0)?;
            let items = list.borrow().clone();
            let sorted = self.sort_items(items, key, reverse)?;
            *list.borrow_mut() = sorted;
            return Ok(Value::None);
        }
        reject_kwargs(method, &kwargs)?;

        match method {
            "append" => {
                arity(method, &args, 1, 1)?;
                list.borrow_mut().push(args.remove(0));
                Ok(Value::None)
            }
            "pop" => {
                arity(method, &args, 0, 1)?;
                let mut items = list.borrow_mut();
                if items.is_empty() {
                    return Err(RuntimeError::index_error("pop from empty list"));
                }
                let index = match args.first() {
                    Some(v) => int_arg(v)?,
                    None => -1,
                };
                let index = normalize_index(index, items.len())
                    .ok_or_else(|| RuntimeError::index_error("pop index out of range"))?;
                Ok(items.remove(index))
            }
            "insert" => {
                arity(method, &args, 2, 2)?;
                let value = args.remove(1);
                let index = int_arg(&args[0])?;
                let mut items = list.borrow_mut();
                let len = items.len() as i64;
                let position = if index < 0 {
                    (index + len).max(0)
                } else {
                    index.min(len)
                };
                items.insert(position as usize, value);
                Ok(Value::None)
            }
            "extend" => {
                arity(method, &args, 1, 1)?;
                let extra = args[0].collect_items()?;
                list.borrow_mut().extend(extra);
                Ok(Value::None)
            }
            "remove" => {
                arity(method, &args, 1, 1)?;
                let mut items = list.borrow_mut();
                match items.iter().position(|v| v.py_eq(&args[0])) {
                    Some(index) => {
                        items.remove(index);
                        Ok(Value::None)
                    }
                    None => Err(RuntimeError::value_error("list.remove(x): x not in list")),
                }
            }
            "index" => {
                arity(method, &args, 1, 1)?;
                list.borrow()
                    .iter()
                    .position(|v| v.py_eq(&args[0]))
                    .map(|i| Value::Int(i as i64))
                    .ok_or_else(|| {
                        RuntimeError::value_error(format!("{} is not in list", args[0].repr()))
                    })
            }
            "count" => {
                arity(method, &args, 1, 1)?;
                let count = list.borrow().iter().filter(|v| v.py_eq(&args[0])).count();
                Ok(Value::Int(count as i64))
            }
            "reverse" => {
                arity(method, &args, 0, 0)?;
                list.borrow_mut().reverse();
                Ok(Value::None)
            }
            "copy" => {
                arity(method, &args, 0, 0)?;
                Ok(Value::list(list.borrow().clone()))
            }
            "clear" => {
                arity(method, &args, 0, 0)?;
                list.borrow_mut().clear();
                Ok(Value::None)
            }
            _ => Err(eval::attribute_error(object, method)),
        }
    }
}

fn update_dict(map: &mut IndexMap<HashKey, Value>, source: &Value) -> Result<(), RuntimeError> {
    if let Value::Dict(other) = source {
        for (key, value) in other.borrow().iter() {
            map.insert(key.clone(), value.clone());
        }
        return Ok(());
    }
    for (position, pair) in source.collect_items()?.into_iter().enumerate() {
        let items = pair.collect_items().map_err(|_| {
            RuntimeError::type_error(format!(
                "cannot convert dictionary update sequence element #{position} to a sequence"
            ))
        })?;
        let [key, value]: [Value; 2] = items.try_into().map_err(|items: Vec<Value>| {
            RuntimeError::value_error(format!(
                "dictionary update sequence element #{position} has length {}; 2 is required",
                items.len()
            ))
        })?;
        map.insert(key.to_hash_key()?, value);
    }
    Ok(())
}

fn dict_method(
    object: &Value,
    method: &str,
    mut args: Vec<Value>,
    kwargs: Kwargs,
) -> Result<Value, RuntimeError> {
    let Value::Dict(dict) = object else {
        return Err(eval::attribute_error(object, method));
    };
    if method != "update" {
        reject_kwargs(method, &kwargs)?;
    }
    match method {
        "get" => {
            arity(method, &args, 1, 2)?;
            let key = args[0].to_hash_key()?;
            let found = dict.borrow().get(&key).cloned();
            Ok(found.or_else(|| args.get(1).cloned()).unwrap_or(Value::None))
        }
        "keys" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::list(dict.borrow().keys().map(HashKey::to_value).collect()))
        }
        "values" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::list(dict.borrow().values().cloned().collect()))
        }
        "items" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::list(
                dict.borrow()
                    .iter()
                    .map(|(k, v)| Value::tuple(vec![k.to_value(), v.clone()]))
                    .collect(),
            ))
        }
        "pop" => {
            arity(method, &args, 1, 2)?;
            let key = args[0].to_hash_key()?;
            let removed = dict.borrow_mut().shift_remove(&key);
            match removed {
                Some(value) => Ok(value),
                None if args.len() == 2 => Ok(args.remove(1)),
                None => Err(RuntimeError::Key {
                    key: args[0].repr(),
                }),
            }
        }
        "update" => {
            arity(method, &args, 0, 1)?;
            let mut updated = dict.borrow().clone();
            if let Some(source) = args.first() {
                update_dict(&mut updated, source)?;
            }
            for (key, value) in kwargs {
                updated.insert(HashKey::Str(Rc::from(key.as_str())), value);
            }
            *dict.borrow_mut() = updated;
            Ok(Value::None)
        }
        "copy" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::dict(dict.borrow().clone()))
        }
        _ => Err(eval::attribute_error(object, method)),
    }
}

fn str_method(object: &Value, s: &str, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match method {
        "upper" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::string(&s.to_uppercase()))
        }
        "lower" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::string(&s.to_lowercase()))
        }
        "strip" => {
            arity(method, &args, 0, 1)?;
            match args.first() {
                None | Some(Value::None) => Ok(Value::string(s.trim())),
                Some(chars) => {
                    let chars: Vec<char> = str_arg(method, chars)?.chars().collect();
                    Ok(Value::string(s.trim_matches(|c: char| chars.contains(&c))))
                }
            }
        }
        "split" => {
            arity(method, &args, 0, 2)?;
            let maxsplit = match args.get(1) {
                Some(v) => int_arg(v)?,
                None => -1,
            };
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => split_whitespace(s, maxsplit),
                Some(sep) => {
                    let sep = str_arg(method, sep)?;
                    if sep.is_empty() {
                        return Err(RuntimeError::value_error("empty separator"));
                    }
                    if maxsplit < 0 {
                        s.split(sep).map(Value::string).collect()
                    } else {
                        s.splitn(maxsplit as usize + 1, sep).map(Value::string).collect()
                    }
                }
            };
            Ok(Value::list(parts))
        }
        "join" => {
            arity(method, &args, 1, 1)?;
            let mut pieces = Vec::new();
            for (i, item) in args[0].collect_items()?.into_iter().enumerate() {
                match item {
                    Value::Str(piece) => pieces.push(piece),
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "sequence item {i}: expected str instance, {} found",
                            other.type_name()
                        )))
                    }
                }
            }
            let joined = pieces
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<&str>>()
                .join(s);
            Ok(Value::string(&joined))
        }
        "replace" => {
            arity(method, &args, 2, 2)?;
            let old = str_arg(method, &args[0])?;
            let new = str_arg(method, &args[1])?;
            Ok(Value::string(&s.replace(old, new)))
        }
        "startswith" => {
            arity(method, &args, 1, 1)?;
            Ok(Value::Bool(s.starts_with(str_arg(method, &args[0])?)))
        }
        "endswith" => {
            arity(method, &args, 1, 1)?;
            Ok(Value::Bool(s.ends_with(str_arg(method, &args[0])?)))
        }
        "find" => {
            arity(method, &args, 1, 1)?;
            let needle = str_arg(method, &args[0])?;
            let index = s
                .find(needle)
                .map(|byte| s[..byte].chars().count() as i64)
                .unwrap_or(-1);
            Ok(Value::Int(index))
        }
        "count" => {
            arity(method, &args, 1, 1)?;
            let needle = str_arg(method, &args[0])?;
            let count = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(needle).count()
            };
            Ok(Value::Int(count as i64))
        }
        "isdigit" => {
            arity(method, &args, 0, 0)?;
            Ok(Value::Bool(
                !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()),
            ))
        }
        _ => Err(eval::attribute_error(object, method)),
    }
}

fn split_whitespace(s: &str, maxsplit: i64) -> Vec<Value> {
    if maxsplit < 0 {
        return s.split_whitespace().map(Value::string).collect();
    }
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if parts.len() as i64 == maxsplit {
            parts.push(Value::string(rest));
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(Value::string(&rest[..end]));
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(Value::string(rest));
                break;
            }
        }
    }
    parts
}

fn parse_int(text: &str, radix: i64) -> Result<i64, RuntimeError> {
    let invalid = || {
        RuntimeError::value_error(format!(
            "invalid literal for int() with base {radix}: {}",
            Value::string(text).repr()
        ))
    };
    if !(2..=36).contains(&radix) {
        return Err(RuntimeError::value_error(
            "int() base must be >= 2 and <= 36, or 0",
        ));
    }
    let cleaned = text.trim().replace('_', "");
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest.to_string()),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned).to_string()),
    };
    if digits.is_empty() {
        return Err(invalid());
    }
    let magnitude = i128::from_str_radix(&digits, radix as u32).map_err(|_| invalid())?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).map_err(|_| RuntimeError::Overflow)
}

fn round(value: &Value, ndigits: Option<i64>) -> Result<Value, RuntimeError> {
    match (value.as_number(), ndigits) {
        (Some(Number::Int(i)), None) => Ok(Value::Int(i)),
        (Some(Number::Int(i)), Some(n)) if n >= 0 => Ok(Value::Int(i)),
        (Some(Number::Int(i)), Some(n)) => {
            let factor = u32::try_from(-n)
                .ok()
                .and_then(|exp| 10i64.checked_pow(exp));
            let Some(factor) = factor else {
                return Ok(Value::Int(0));
            };
            let rounded = (i as f64 / factor as f64).round_ties_even() * factor as f64;
            float_to_int(rounded).map(Value::Int)
        }
        (Some(Number::Float(f)), None) => float_to_int(f.round_ties_even()).map(Value::Int),
        (Some(Number::Float(f)), Some(n)) => {
            let factor = 10f64.powi(n.clamp(-308, 308) as i32);
            let rounded = (f * factor).round_ties_even() / factor;
            Ok(Value::Float(if rounded.is_finite() { rounded } else { f }))
        }
        (None, _) => Err(RuntimeError::type_error(format!(
            "type {} doesn't define __round__ method",
            value.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(*builtin));
        }
        assert_eq!(Builtin::from_name("eval"), None);
    }

    #[test]
    fn int_parsing() {
        assert_eq!(parse_int(" 42 ", 10).unwrap(), 42);
        assert_eq!(parse_int("-ff", 16).unwrap(), -255);
        let err = parse_int("abc", 10).unwrap_err();
        assert_eq!(err.to_string(), "invalid literal for int() with base 10: 'abc'");
    }

    #[test]
    fn rounding_uses_bankers_rule() {
        assert_eq!(round(&Value::Float(2.5), None).unwrap(), Value::Int(2));
        assert_eq!(round(&Value::Float(3.5), None).unwrap(), Value::Int(4));
        let v = round(&Value::Float(1.234), Some(2)).unwrap();
        assert!(matches!(v, Value::Float(f) if (f - 1.23).abs() < 1e-9));
    }

    #[test]
    fn whitespace_split_honours_maxsplit() {
        let parts = split_whitespace("  a b  c ", 1);
        assert_eq!(parts, vec![Value::string("a"), Value::string("b  c ")]);
        assert_eq!(split_whitespace("a b", -1).len(), 2);
    }

    #[test]
    fn merge_sort_is_stable_in_both_directions() {
        let entries = vec![
            (Value::Int(1), Value::string("a")),
            (Value::Int(0), Value::string("b")),
            (Value::Int(1), Value::string("c")),
        ];
        let sorted: Vec<Value> = merge_sort(entries.clone(), false)
            .unwrap()
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(sorted, vec![Value::string("b"), Value::string("a"), Value::string("c")]);
        let sorted: Vec<Value> = merge_sort(entries, true)
            .unwrap()
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(sorted, vec![Value::string("a"), Value::string("c"), Value::string("b")]);
    }

    #[test]
    fn sorting_mixed_types_fails() {
        let entries = vec![
            (Value::Int(1), Value::Int(1)),
            (Value::string("x"), Value::string("x")),
        ];
        assert!(merge_sort(entries, false).is_err());
    }
}
