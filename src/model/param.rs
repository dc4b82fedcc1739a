//! A single named configuration value.

use serde_json::Value;

use super::value::ParamType;
use crate::error::{CoerceError, ResolutionError};
use crate::resolver::{Environment, ResolveOptions, Resolver};

/// Named configuration value with an optional unresolved source expression.
///
/// `value` holds the last resolved (or literally assigned) value and `svalue`
/// the expression it comes from. The two may diverge until [`Parameter::resolve`]
/// or [`crate::Configuration::resolve`] runs. When `error` is set, `value` is stale
/// and must not be applied anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: Value,
    svalue: Option<String>,
    vtype: Option<ParamType>,
    error: Option<ResolutionError>,
    local: bool,
}

impl Parameter {
    /// Create an unset, untyped, local parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::Null,
            svalue: None,
            vtype: None,
            error: None,
            local: true,
        }
    }

    /// Set the literal value as-is. Type checks happen at resolution.
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_svalue(mut self, svalue: impl Into<String>) -> Self {
        self.svalue = Some(svalue.into());
        self
    }

    pub fn with_vtype(mut self, vtype: ParamType) -> Self {
        self.vtype = Some(vtype);
        self
    }

    pub fn with_local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn svalue(&self) -> Option<&str> {
        self.svalue.as_deref()
    }

    pub fn vtype(&self) -> Option<ParamType> {
        self.vtype
    }

    pub fn error(&self) -> Option<&ResolutionError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Declared by the owner (true) or merged in from another source (false).
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Overwrite the value, converting it to `vtype` first.
    ///
    /// On a conversion failure the previous value is left untouched.
    pub fn set_value(&mut self, value: Value) -> Result<(), CoerceError> {
        self.value = match self.vtype {
            Some(vtype) => vtype.coerce(value)?,
            None => value,
        };
        Ok(())
    }

    pub fn set_svalue(&mut self, svalue: Option<String>) {
        self.svalue = svalue;
    }

    pub fn set_vtype(&mut self, vtype: Option<ParamType>) {
        self.vtype = vtype;
    }

    pub fn set_local(&mut self, local: bool) {
        self.local = local;
    }

    /// Independent copy carrying a new `local` flag.
    pub fn copy(&self, local: bool) -> Self {
        Self {
            local,
            ..self.clone()
        }
    }

    /// Compute the resolved value without touching `self`.
    ///
    /// Without `svalue` the literal value is converted to `vtype`; with one, the
    /// expression is evaluated in `env` and the result converted.
    pub fn evaluate(
        &self,
        resolver: &dyn Resolver,
        env: &Environment<'_>,
    ) -> Result<Value, ResolutionError> {
        let raw = match self.svalue.as_deref() {
            Some(expr) => resolver
                .evaluate(expr, env)
                .map_err(|e| ResolutionError::new(&self.name, e))?,
            None => self.value.clone(),
        };

        match self.vtype {
            Some(vtype) => vtype
                .coerce(raw)
                .map_err(|e| ResolutionError::new(&self.name, e)),
            None => Ok(raw),
        }
    }

    /// Store the outcome of [`Parameter::evaluate`].
    ///
    /// Failures are always recorded in `error`; they are returned only when
    /// `besteffort` is off.
    pub fn record(
        &mut self,
        outcome: Result<Value, ResolutionError>,
        besteffort: bool,
    ) -> Result<(), ResolutionError> {
        match outcome {
            Ok(value) => {
                self.value = value;
                self.error = None;
                Ok(())
            }
            Err(err) => {
                self.error = Some(err.clone());
                if besteffort { Ok(()) } else { Err(err) }
            }
        }
    }

    /// Resolve against the caller scope only.
    pub fn resolve(
        &mut self,
        resolver: &dyn Resolver,
        options: &ResolveOptions,
    ) -> Result<(), ResolutionError> {
        let env = Environment::new(&options.scope, options.safe);
        let outcome = self.evaluate(resolver, &env);
        self.record(outcome, options.besteffort)
    }
}
