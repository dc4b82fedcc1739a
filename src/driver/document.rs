//! Shared document shape for the structured drivers.

use serde_json::Value;

use super::ParseError;
use crate::model::{Category, Configuration, Parameter};

/// Prefix marking a string value as an expression.
pub const EXPRESSION_MARKER: char = '=';

/// Build a configuration from a `{category: {parameter: value}}` document.
///
/// A string starting with `=` becomes the parameter's `svalue`; anything else
/// is its literal value. A parameter already known to `hints` takes its
/// declared type.
pub fn document_to_conf(document: Value, hints: &Configuration) -> Result<Configuration, ParseError> {
    let Value::Object(categories) = document else {
        if document.is_null() {
            return Ok(Configuration::new());
        }
        return Err(ParseError::Shape {
            expected: "a map of categories",
            at: "<root>".to_string(),
        });
    };

    let mut conf = Configuration::new();
    for (cname, params) in categories {
        let params = match params {
            Value::Object(params) => params,
            Value::Null => Default::default(),
            _ => {
                return Err(ParseError::Shape {
                    expected: "a map of parameters",
                    at: cname,
                });
            }
        };

        let mut category = Category::new(cname.as_str());
        for (pname, raw) in params {
            let param = parameter(&cname, pname, raw, hints);
            category.add(param);
        }
        conf.add_category(category);
    }
    Ok(conf)
}

/// Build one parameter from a raw source value.
pub(crate) fn parameter(category: &str, name: String, raw: Value, hints: &Configuration) -> Parameter {
    let vtype = hints
        .category(category)
        .and_then(|cat| cat.get(&name))
        .and_then(Parameter::vtype);

    let mut param = match raw {
        Value::String(s) if s.starts_with(EXPRESSION_MARKER) => {
            Parameter::new(name).with_svalue(s[EXPRESSION_MARKER.len_utf8()..].trim())
        }
        other => Parameter::new(name).with_value(other),
    };
    param.set_vtype(vtype);
    param
}
