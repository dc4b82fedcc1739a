//! Tree-walking evaluator and builtin functions.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

use super::parser::{BinOp, Expr};
use super::{Environment, ExprError};
use crate::model::{ParamType, describe, render};

pub(crate) fn eval(expr: &Expr, env: &Environment<'_>) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name(name) => env
            .lookup(name)
            .cloned()
            .ok_or_else(|| ExprError::UnresolvedName(name.clone())),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, env))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Map(entries) => {
            let mut map = Map::new();
            for (key, item) in entries {
                map.insert(key.clone(), eval(item, env)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Attr(base, attr) => match eval(base, env)? {
            Value::Object(mut map) => map
                .remove(attr)
                .ok_or_else(|| ExprError::MissingKey(attr.clone())),
            other => Err(ExprError::type_error(format!(
                "{} has no attribute '{}'",
                describe(&other),
                attr
            ))),
        },
        Expr::Index(base, index) => {
            let base = eval(base, env)?;
            let index = eval(index, env)?;
            index_value(base, &index)
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|arg| eval(arg, env))
                .collect::<Result<Vec<_>, _>>()?;
            call_builtin(name, args, env)
        }
        Expr::Neg(inner) => match num(&eval(inner, env)?) {
            Some(Num::Int(i)) => i.checked_neg().map(Value::from).ok_or(ExprError::Overflow),
            Some(Num::Float(f)) => float(-f),
            None => Err(ExprError::type_error("bad operand for unary -")),
        },
        Expr::Binary(op, lhs, rhs) => binary(*op, eval(lhs, env)?, eval(rhs, env)?),
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn num(value: &Value) -> Option<Num> {
    let Value::Number(n) = value else {
        return None;
    };
    n.as_i64()
        .map(Num::Int)
        .or_else(|| n.as_f64().map(Num::Float))
}

fn float(f: f64) -> Result<Value, ExprError> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or(ExprError::Overflow)
}

/// Longest string a repetition may produce, in bytes.
pub(crate) const MAX_STRING_LEN: usize = 1 << 20;

fn binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, ExprError> {
    match (op, lhs, rhs) {
        (BinOp::Add, Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
        (BinOp::Add, Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (BinOp::Mul, Value::String(s), Value::Number(n)) | (BinOp::Mul, Value::Number(n), Value::String(s)) => {
            let Some(times) = n.as_i64().and_then(|t| usize::try_from(t).ok()) else {
                return Err(ExprError::type_error("can only repeat a string a non-negative integer number of times"));
            };
            match s.len().checked_mul(times) {
                Some(len) if len <= MAX_STRING_LEN => Ok(Value::String(s.repeat(times))),
                _ => Err(ExprError::Overflow),
            }
        }
        (op, lhs, rhs) => {
            let (Some(a), Some(b)) = (num(&lhs), num(&rhs)) else {
                return Err(ExprError::type_error(format!(
                    "unsupported operands for {:?}: {} and {}",
                    op,
                    describe(&lhs),
                    describe(&rhs)
                )));
            };
            arithmetic(op, a, b)
        }
    }
}

fn arithmetic(op: BinOp, a: Num, b: Num) -> Result<Value, ExprError> {
    if matches!(op, BinOp::Div | BinOp::Rem) && b.as_f64() == 0.0 {
        return Err(ExprError::DivisionByZero);
    }

    match (op, a, b) {
        (BinOp::Div, a, b) => float(a.as_f64() / b.as_f64()),
        (op, Num::Int(a), Num::Int(b)) => {
            let result = match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Sub => a.checked_sub(b),
                BinOp::Mul => a.checked_mul(b),
                BinOp::Rem => a.checked_rem(b).map(|r| if r != 0 && (r < 0) != (b < 0) { r + b } else { r }),
                BinOp::Div => None,
            };
            result.map(Value::from).ok_or(ExprError::Overflow)
        }
        (op, a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Rem => {
                    let r = a % b;
                    if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }
                }
                BinOp::Div => a / b,
            };
            float(result)
        }
    }
}

fn index_value(base: Value, index: &Value) -> Result<Value, ExprError> {
    match (base, index) {
        (Value::Array(mut items), Value::Number(n)) => {
            let len = items.len();
            let pos = n
                .as_i64()
                .ok_or_else(|| ExprError::type_error("list index must be an integer"))?;
            let slot = position(pos, len)?;
            Ok(items.swap_remove(slot))
        }
        (Value::String(s), Value::Number(n)) => {
            let chars: Vec<char> = s.chars().collect();
            let pos = n
                .as_i64()
                .ok_or_else(|| ExprError::type_error("string index must be an integer"))?;
            let slot = position(pos, chars.len())?;
            Ok(Value::String(chars[slot].to_string()))
        }
        (Value::Object(mut map), Value::String(key)) => map
            .remove(key)
            .ok_or_else(|| ExprError::MissingKey(key.clone())),
        (base, index) => Err(ExprError::type_error(format!(
            "cannot index {} with {}",
            describe(&base),
            describe(index)
        ))),
    }
}

/// Python-style index: negative values count from the end.
fn position(index: i64, len: usize) -> Result<usize, ExprError> {
    let resolved = if index < 0 {
        i64::try_from(len).ok().and_then(|l| l.checked_add(index))
    } else {
        Some(index)
    };
    resolved
        .and_then(|i| usize::try_from(i).ok())
        .filter(|&i| i < len)
        .ok_or(ExprError::IndexOutOfRange { index, len })
}

fn arity(name: &str, args: &[Value], expected: &'static str, ok: bool) -> Result<(), ExprError> {
    if ok {
        Ok(())
    } else {
        Err(ExprError::Arity {
            function: name.to_string(),
            expected,
            found: args.len(),
        })
    }
}

fn call_builtin(name: &str, args: Vec<Value>, env: &Environment<'_>) -> Result<Value, ExprError> {
    match name {
        "len" => {
            arity(name, &args, "1", args.len() == 1)?;
            let len = match &args[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => {
                    return Err(ExprError::type_error(format!("{} has no len()", describe(other))));
                }
            };
            Ok(Value::from(len))
        }
        "str" | "int" | "float" | "bool" => {
            arity(name, &args, "1", args.len() == 1)?;
            let target = match name {
                "str" => ParamType::Str,
                "int" => ParamType::Int,
                "float" => ParamType::Float,
                _ => ParamType::Bool,
            };
            let value = args.into_iter().next().unwrap_or(Value::Null);
            if value.is_null() {
                return Err(ExprError::type_error(format!("{}() of null", name)));
            }
            target
                .coerce(value)
                .map_err(|e| ExprError::type_error(e.to_string()))
        }
        "upper" | "lower" => {
            arity(name, &args, "1", args.len() == 1)?;
            match &args[0] {
                Value::String(s) if name == "upper" => Ok(Value::String(s.to_uppercase())),
                Value::String(s) => Ok(Value::String(s.to_lowercase())),
                other => Err(ExprError::type_error(format!(
                    "{}() expects a string, got {}",
                    name,
                    describe(other)
                ))),
            }
        }
        "abs" => {
            arity(name, &args, "1", args.len() == 1)?;
            match num(&args[0]) {
                Some(Num::Int(i)) => i.checked_abs().map(Value::from).ok_or(ExprError::Overflow),
                Some(Num::Float(f)) => float(f.abs()),
                None => Err(ExprError::type_error("abs() expects a number")),
            }
        }
        "min" | "max" => {
            arity(name, &args, "at least 1", !args.is_empty())?;
            let items = match args.as_slice() {
                [Value::Array(items)] => items.clone(),
                _ => args,
            };
            extremum(name, items)
        }
        "env" if !env.is_safe() => {
            arity(name, &args, "1", args.len() == 1)?;
            match &args[0] {
                Value::String(var) => Ok(std::env::var(var).map(Value::String).unwrap_or(Value::Null)),
                other => Err(ExprError::type_error(format!(
                    "env() expects a variable name, got {}",
                    describe(other)
                ))),
            }
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

fn extremum(name: &str, items: Vec<Value>) -> Result<Value, ExprError> {
    let want = if name == "min" { Ordering::Less } else { Ordering::Greater };
    let mut best: Option<Value> = None;

    for item in items {
        let replace = match &best {
            None => true,
            Some(current) => compare(&item, current)? == want,
        };
        if replace {
            best = Some(item);
        }
    }
    best.ok_or_else(|| ExprError::type_error(format!("{}() of an empty list", name)))
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, ExprError> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => match (num(a), num(b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => Ok(x.cmp(&y)),
            (Some(x), Some(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .ok_or_else(|| ExprError::type_error("incomparable numbers")),
            _ => Err(ExprError::type_error(format!(
                "cannot compare {} with {}",
                render(a),
                render(b)
            ))),
        },
    }
}
