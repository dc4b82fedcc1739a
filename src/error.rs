//! Structured error types for merge, resolution, lookup and application.
//!
//! Errors fall in three families with different propagation rules:
//! - lookup errors (`pvalue` on a missing category/parameter) always surface;
//! - resolution errors are recorded on the parameter and only surface when
//!   best-effort resolution is off;
//! - merge and apply anomalies ([`ApplyError`]) are absorbed where they happen.

use std::path::PathBuf;
use thiserror::Error;

use crate::resolver::ExprError;

/// Failure to convert a value to a declared parameter type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot convert {found} to {expected}")]
pub struct CoerceError {
    /// Type name that was expected.
    pub expected: &'static str,
    /// Short rendering of the offending value.
    pub found: String,
}

impl CoerceError {
    pub fn new(expected: &'static str, found: impl Into<String>) -> Self {
        Self {
            expected,
            found: found.into(),
        }
    }
}

/// Why a parameter could not be resolved.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionFailure {
    /// The source expression failed to evaluate.
    #[error("expression failed: {0}")]
    Expression(#[from] ExprError),

    /// The evaluated value did not fit the declared type.
    #[error("type mismatch: {0}")]
    Coercion(#[from] CoerceError),
}

/// A parameter failed to resolve. Recorded on the parameter itself.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("parameter '{parameter}': {failure}")]
pub struct ResolutionError {
    pub parameter: String,
    pub failure: ResolutionFailure,
}

impl ResolutionError {
    pub fn new(parameter: impl Into<String>, failure: impl Into<ResolutionFailure>) -> Self {
        Self {
            parameter: parameter.into(),
            failure: failure.into(),
        }
    }
}

/// A resolved value could not be set on a target.
///
/// Never aborts an apply pass: the parameter is skipped and reported.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApplyError {
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("invalid value for '{name}': {message}")]
    InvalidValue { name: String, message: String },

    #[error("'{0}' does not accept sub-configured objects")]
    Unsupported(String),
}

impl ApplyError {
    pub fn invalid(name: &str, message: impl std::fmt::Display) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

/// Top-level error for configuration operations.
#[derive(Error, Debug)]
pub enum ConfError {
    /// Named category is not part of the configuration.
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    /// No category defines the parameter.
    #[error("Parameter not found: {name}{}", category_suffix(.category))]
    ParameterNotFound {
        name: String,
        category: Option<String>,
    },

    /// History index reaches past the oldest definition.
    #[error("Parameter {name} has {available} definition(s), history {history} requested")]
    HistoryOutOfRange {
        name: String,
        history: usize,
        available: usize,
    },

    /// Resolution aborted (best-effort disabled).
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Sub-configuration chain loops back on an ancestor.
    #[error("Sub-configuration cycle: {}", .chain.join(" -> "))]
    SubConfCycle { chain: Vec<String> },

    /// A driver accepted a source but its content is malformed.
    #[error("{driver} driver failed on {}: {message}", .path.display())]
    Driver {
        driver: &'static str,
        path: PathBuf,
        message: String,
    },

    /// Reading a source failed.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn category_suffix(category: &Option<String>) -> String {
    match category {
        Some(name) => format!(" in category {}", name),
        None => String::new(),
    }
}

impl ConfError {
    pub fn parameter_not_found(name: &str, category: Option<&str>) -> Self {
        Self::ParameterNotFound {
            name: name.to_string(),
            category: category.map(str::to_string),
        }
    }

    pub fn driver(driver: &'static str, path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Driver {
            driver,
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// True for the lookup family (`pvalue` misses).
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::CategoryNotFound(_) | Self::ParameterNotFound { .. } | Self::HistoryOutOfRange { .. }
        )
    }
}

/// Result type for configuration operations.
pub type ConfResult<T> = std::result::Result<T, ConfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_not_found_message() {
        let err = ConfError::parameter_not_found("port", Some("server"));
        assert_eq!(err.to_string(), "Parameter not found: port in category server");

        let err = ConfError::parameter_not_found("port", None);
        assert_eq!(err.to_string(), "Parameter not found: port");
        assert!(err.is_lookup());
    }

    #[test]
    fn test_cycle_message() {
        let err = ConfError::SubConfCycle {
            chain: vec!["widget".into(), "child".into(), "widget".into()],
        };
        assert_eq!(err.to_string(), "Sub-configuration cycle: widget -> child -> widget");
        assert!(!err.is_lookup());
    }

    #[test]
    fn test_apply_error_message() {
        let err = ApplyError::invalid("port", "expected u16");
        assert_eq!(err.to_string(), "invalid value for 'port': expected u16");
    }

    #[test]
    fn test_resolution_error_message() {
        let err = ResolutionError::new("timeout", CoerceError::new("int", "\"abc\""));
        assert_eq!(
            err.to_string(),
            "parameter 'timeout': type mismatch: cannot convert \"abc\" to int"
        );
    }
}
