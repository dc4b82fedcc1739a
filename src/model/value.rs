//! Parameter value types and coercion.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::CoerceError;

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Str => "str",
            ParamType::List => "list",
            ParamType::Map => "map",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bool" | "boolean" => Some(ParamType::Bool),
            "int" | "integer" => Some(ParamType::Int),
            "float" | "number" => Some(ParamType::Float),
            "str" | "string" => Some(ParamType::Str),
            "list" | "array" => Some(ParamType::List),
            "map" | "dict" | "object" => Some(ParamType::Map),
            _ => None,
        }
    }

    /// Whether `value` already is an instance of this type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (ParamType::Bool, Value::Bool(_)) => true,
            (ParamType::Int, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (ParamType::Float, Value::Number(n)) => n.is_f64(),
            (ParamType::Str, Value::String(_)) => true,
            (ParamType::List, Value::Array(_)) => true,
            (ParamType::Map, Value::Object(_)) => true,
            _ => false,
        }
    }

    /// Convert `value` to this type.
    ///
    /// `null` stands for "unset" and passes through untouched.
    pub fn coerce(&self, value: Value) -> Result<Value, CoerceError> {
        if value.is_null() || self.matches(&value) {
            return Ok(value);
        }

        let fail = |v: &Value| CoerceError::new(self.as_str(), describe(v));

        match self {
            ParamType::Bool => match &value {
                Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
                Value::String(s) => parse_bool(s).map(Value::Bool).ok_or_else(|| fail(&value)),
                _ => Err(fail(&value)),
            },
            ParamType::Int => match &value {
                Value::Bool(b) => Ok(Value::from(i64::from(*b))),
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                        Ok(Value::from(f as i64))
                    }
                    _ => Err(fail(&value)),
                },
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| fail(&value)),
                _ => Err(fail(&value)),
            },
            ParamType::Float => {
                let parsed = match &value {
                    Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                parsed
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| fail(&value))
            }
            ParamType::Str => Ok(Value::String(render(&value))),
            ParamType::List => match &value {
                Value::String(s) => match serde_json::from_str::<Value>(s) {
                    Ok(parsed @ Value::Array(_)) => Ok(parsed),
                    _ => Err(fail(&value)),
                },
                _ => Err(fail(&value)),
            },
            ParamType::Map => match &value {
                Value::String(s) => match serde_json::from_str::<Value>(s) {
                    Ok(parsed @ Value::Object(_)) => Ok(parsed),
                    _ => Err(fail(&value)),
                },
                _ => Err(fail(&value)),
            },
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Render a value the way a string parameter shows it: bare strings, JSON otherwise.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Short type-and-value description for error messages.
pub fn describe(value: &Value) -> String {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    };
    let mut shown = value.to_string();
    if shown.len() > 40 {
        let cut = (0..=40).rev().find(|i| shown.is_char_boundary(*i)).unwrap_or(0);
        shown.truncate(cut);
        shown.push_str("...");
    }
    format!("{} {}", kind, shown)
}
