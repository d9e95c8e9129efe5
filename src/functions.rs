// Reserved array and string properties.
//
// Scalar names (`empty`, `last`, `length`, `count`, `multiple`) resolve to
// values directly; the method names (`every`, `some`, `map`, `slice`, `pop`,
// `shift`) resolve to function values wrapping the native behaviour, so they
// can be called, stored or passed around like any other function. Strings
// behave as arrays of one-character strings, except that `slice`, `pop` and
// `shift` stay string-valued.

use std::rc::Rc;

use crate::evaluator::{Env, EvalError};
use crate::value::{FuncValue, Value};

/// The first argument of a higher-order method must be a function.
fn func_arg<'a>(args: &'a [Value], method: &str) -> Result<&'a FuncValue, EvalError> {
    match args.first().and_then(Value::as_function) {
        Some(f) => Ok(f),
        None => Err(EvalError::Type(format!(
            "{} expects a function argument",
            method
        ))),
    }
}

/// Numeric property names index into the sequence.
fn parse_index(name: &str) -> Option<usize> {
    name.trim().parse::<usize>().ok()
}

/// How many elements `pop`/`shift` remove: first argument, default 1.
fn take_count(args: &[Value], len: usize) -> usize {
    let n = match args.first() {
        None | Some(Value::Null) => 1.0,
        Some(v) => {
            let n = v.to_number();
            if n.is_nan() {
                1.0
            } else {
                n.trunc().max(0.0)
            }
        }
    };
    (n as usize).min(len)
}

/// `slice(start, end?)` bounds with negative-from-the-end indexing.
fn slice_bounds(args: &[Value], len: usize) -> (usize, usize) {
    let len = len as i64;
    let resolve = |v: Option<&Value>, default: i64| -> i64 {
        match v {
            None | Some(Value::Null) => default,
            Some(v) => {
                let n = v.to_number();
                if n.is_nan() {
                    0
                } else {
                    n.trunc() as i64
                }
            }
        }
    };
    let clamp = |i: i64| -> i64 {
        if i < 0 {
            (len + i).max(0)
        } else {
            i.min(len)
        }
    };
    let start = clamp(resolve(args.first(), 0));
    let end = clamp(resolve(args.get(1), len));
    (start as usize, end.max(start) as usize)
}

fn every_fn(items: Rc<Vec<Value>>) -> Value {
    Value::function(move |args| {
        let f = func_arg(args, "every")?;
        for item in items.iter() {
            if !f.call(&[item.clone()])?.is_truthy() {
                return Ok(Value::Bool(false));
            }
        }
        Ok(Value::Bool(true))
    })
}

fn some_fn(items: Rc<Vec<Value>>) -> Value {
    Value::function(move |args| {
        let f = func_arg(args, "some")?;
        for item in items.iter() {
            if f.call(&[item.clone()])?.is_truthy() {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    })
}

fn map_fn(items: Rc<Vec<Value>>) -> Value {
    Value::function(move |args| {
        let f = func_arg(args, "map")?;
        let mut out = Vec::with_capacity(items.len());
        for item in items.iter() {
            out.push(f.call(&[item.clone()])?);
        }
        Ok(Value::array(out))
    })
}

pub(crate) mod sequence {
    use super::*;

    /// Resolve one property access on an array.
    pub(crate) fn access(
        arr: &Rc<Vec<Value>>,
        name: &str,
        env: &Env,
    ) -> Result<Value, EvalError> {
        if let Some(idx) = parse_index(name) {
            return Ok(arr.get(idx).cloned().unwrap_or(Value::Null));
        }
        let items = arr.clone();
        let value = match name {
            "empty" => Value::Bool(items.is_empty()),
            "last" => items.last().cloned().unwrap_or(Value::Null),
            "length" | "count" => Value::from(items.len()),
            "multiple" => Value::Bool(items.len() > 1),
            "every" => every_fn(items),
            "some" => some_fn(items),
            "map" => map_fn(items),
            "slice" => Value::function(move |args| {
                let (start, end) = slice_bounds(args, items.len());
                Ok(Value::array(items[start..end].to_vec()))
            }),
            "pop" => Value::function(move |args| take(&items, args, true)),
            "shift" => Value::function(move |args| take(&items, args, false)),
            _ => {
                if env.state.safe_nav {
                    Value::Null
                } else {
                    return Err(EvalError::Type(format!(
                        "unknown array property '{}'",
                        name
                    )));
                }
            }
        };
        Ok(value)
    }

    /// `pop(n?, handler?)` / `shift(n?, handler?)`: remove `n` elements from
    /// the end or the front. The result is the removed element (`n` = 1) or
    /// the removed run; a handler function instead receives the remainder
    /// and its return value becomes the result.
    fn take(items: &Rc<Vec<Value>>, args: &[Value], from_end: bool) -> Result<Value, EvalError> {
        let n = take_count(args, items.len());
        let cut = if from_end { items.len() - n } else { n };
        let (removed, remainder) = if from_end {
            (&items[cut..], &items[..cut])
        } else {
            (&items[..cut], &items[cut..])
        };
        if let Some(handler) = args.get(1) {
            let f = handler
                .as_function()
                .ok_or_else(|| EvalError::Type("pop/shift handler must be a function".to_string()))?;
            return f.call(&[Value::array(remainder.to_vec())]);
        }
        if n == 1 {
            Ok(removed.first().cloned().unwrap_or(Value::Null))
        } else {
            Ok(Value::array(removed.to_vec()))
        }
    }
}

pub(crate) mod text {
    use super::*;

    fn char_values(s: &str) -> Vec<Value> {
        s.chars().map(|c| Value::from(c.to_string())).collect()
    }

    /// Resolve one property access on a string (an array of characters for
    /// this purpose).
    pub(crate) fn access(s: &Rc<str>, name: &str, env: &Env) -> Result<Value, EvalError> {
        let count = s.chars().count();
        if let Some(idx) = parse_index(name) {
            return Ok(s
                .chars()
                .nth(idx)
                .map(|c| Value::from(c.to_string()))
                .unwrap_or(Value::Null));
        }
        let value = match name {
            "empty" => Value::Bool(s.is_empty()),
            "last" => s
                .chars()
                .last()
                .map(|c| Value::from(c.to_string()))
                .unwrap_or(Value::Null),
            "length" | "count" => Value::from(count),
            "multiple" => Value::Bool(count > 1),
            "every" => every_fn(Rc::new(char_values(s))),
            "some" => some_fn(Rc::new(char_values(s))),
            "map" => map_fn(Rc::new(char_values(s))),
            "slice" => {
                let s = s.clone();
                Value::function(move |args| {
                    let (start, end) = slice_bounds(args, s.chars().count());
                    let out: String = s.chars().skip(start).take(end - start).collect();
                    Ok(Value::from(out))
                })
            }
            "pop" => {
                let s = s.clone();
                Value::function(move |args| take(&s, args, true))
            }
            "shift" => {
                let s = s.clone();
                Value::function(move |args| take(&s, args, false))
            }
            _ => {
                if env.state.safe_nav {
                    Value::Null
                } else {
                    return Err(EvalError::Type(format!(
                        "unknown string property '{}'",
                        name
                    )));
                }
            }
        };
        Ok(value)
    }

    /// String-flavoured `pop`/`shift`: the removed run and the remainder
    /// both stay strings.
    fn take(s: &Rc<str>, args: &[Value], from_end: bool) -> Result<Value, EvalError> {
        let chars: Vec<char> = s.chars().collect();
        let n = take_count(args, chars.len());
        let cut = if from_end { chars.len() - n } else { n };
        let (removed, remainder): (String, String) = if from_end {
            (chars[cut..].iter().collect(), chars[..cut].iter().collect())
        } else {
            (chars[..cut].iter().collect(), chars[cut..].iter().collect())
        };
        if let Some(handler) = args.get(1) {
            let f = handler
                .as_function()
                .ok_or_else(|| EvalError::Type("pop/shift handler must be a function".to_string()))?;
            return f.call(&[Value::from(remainder)]);
        }
        Ok(Value::from(removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(v: &Value, args: &[Value]) -> Value {
        v.as_function().unwrap().call(args).unwrap()
    }

    fn nums(ns: &[i64]) -> Rc<Vec<Value>> {
        Rc::new(ns.iter().map(|n| Value::from(*n)).collect())
    }

    #[test]
    fn test_slice_bounds() {
        assert_eq!(slice_bounds(&[], 3), (0, 3));
        assert_eq!(slice_bounds(&[Value::from(1i64)], 3), (1, 3));
        assert_eq!(
            slice_bounds(&[Value::from(-2i64)], 3),
            (1, 3)
        );
        assert_eq!(
            slice_bounds(&[Value::from(0i64), Value::from(-1i64)], 3),
            (0, 2)
        );
        assert_eq!(
            slice_bounds(&[Value::from(5i64), Value::from(1i64)], 3),
            (3, 3)
        );
    }

    #[test]
    fn test_map_over_items() {
        let double = Value::function(|args| {
            Ok(Value::Number(args[0].to_number() * 2.0))
        });
        let mapped = call(&map_fn(nums(&[1, 2, 3])), &[double]);
        assert_eq!(
            mapped,
            Value::array(vec![Value::from(2i64), Value::from(4i64), Value::from(6i64)])
        );
    }

    #[test]
    fn test_every_and_some() {
        let positive = Value::function(|args| Ok(Value::Bool(args[0].to_number() > 0.0)));
        assert_eq!(call(&every_fn(nums(&[1, 2])), &[positive.clone()]), Value::Bool(true));
        assert_eq!(call(&every_fn(nums(&[1, -2])), &[positive.clone()]), Value::Bool(false));
        assert_eq!(call(&some_fn(nums(&[-1, 2])), &[positive.clone()]), Value::Bool(true));
        assert_eq!(call(&some_fn(nums(&[-1, -2])), &[positive]), Value::Bool(false));
    }

    #[test]
    fn test_higher_order_rejects_non_function() {
        let result = every_fn(nums(&[1]))
            .as_function()
            .unwrap()
            .call(&[Value::from(5i64)]);
        assert!(matches!(result, Err(EvalError::Type(_))));
    }

    #[test]
    fn test_take_count_defaults() {
        assert_eq!(take_count(&[], 3), 1);
        assert_eq!(take_count(&[Value::from(2i64)], 3), 2);
        assert_eq!(take_count(&[Value::from(99i64)], 3), 3);
    }
}
