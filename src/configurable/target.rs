//! Objects that resolved configuration values are applied to.

use heck::ToSnakeCase;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::error::ApplyError;

/// Something a configuration can be applied to.
///
/// Implementors decide which names they accept; an unknown name is reported
/// as [`ApplyError::UnknownAttribute`] and skipped by the caller.
pub trait ConfigTarget {
    /// Set one resolved value.
    fn set_config_value(&mut self, name: &str, value: &Value) -> Result<(), ApplyError>;

    /// Receive an object built from the sub-configuration of parameter `name`.
    fn set_config_child(
        &mut self,
        name: &str,
        _child: Box<dyn ConfigTarget>,
    ) -> Result<(), ApplyError> {
        Err(ApplyError::Unsupported(name.to_string()))
    }

    /// Downcasting hook for callers that need the concrete type back.
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
}

/// Setter stored in a [`Setters`] table.
pub type Setter<T> = fn(&mut T, &Value) -> Result<(), ApplyError>;

/// Name to setter table for one target type.
///
/// Build it once per type (typically in a `static OnceLock`) and delegate
/// [`ConfigTarget::set_config_value`] to [`Setters::apply`]. Names are
/// normalized to snake_case on both sides, so `maxRetries`, `MaxRetries` and
/// `max_retries` all reach the same setter.
pub struct Setters<T> {
    entries: HashMap<String, Setter<T>>,
}

impl<T> Setters<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with(mut self, name: &str, setter: Setter<T>) -> Self {
        self.entries.insert(name.to_snake_case(), setter);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_snake_case())
    }

    pub fn apply(&self, target: &mut T, name: &str, value: &Value) -> Result<(), ApplyError> {
        let setter = self
            .entries
            .get(&name.to_snake_case())
            .ok_or_else(|| ApplyError::UnknownAttribute(name.to_string()))?;
        setter(target, value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<T> Default for Setters<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Setters<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("Setters").field("names", &names).finish()
    }
}

/// Deserialize a resolved value for attribute `name`.
pub fn config_value<V: DeserializeOwned>(name: &str, value: &Value) -> Result<V, ApplyError> {
    V::deserialize(value).map_err(|e| ApplyError::invalid(name, e))
}

/// Outcome of applying a configuration to one target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Names set successfully.
    pub applied: Vec<String>,
    /// Names skipped, with the reason.
    pub skipped: Vec<(String, ApplyError)>,
    /// Sub-configured children handed to their parent.
    pub children: Vec<String>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Fold a child's report in, prefixing its names with `prefix.`.
    pub fn absorb(&mut self, prefix: &str, child: ApplyReport) {
        let qualify = |name: String| format!("{}.{}", prefix, name);
        self.applied.extend(child.applied.into_iter().map(qualify));
        self.skipped
            .extend(child.skipped.into_iter().map(|(n, e)| (qualify(n), e)));
        self.children.extend(child.children.into_iter().map(qualify));
    }

    /// Append another report for the same target.
    pub fn extend(&mut self, other: ApplyReport) {
        self.applied.extend(other.applied);
        self.skipped.extend(other.skipped);
        self.children.extend(other.children);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Server {
        port: u16,
        max_retries: u32,
    }

    fn setters() -> Setters<Server> {
        Setters::<Server>::new()
            .with("port", |s, v| {
                s.port = config_value("port", v)?;
                Ok(())
            })
            .with("maxRetries", |s, v| {
                s.max_retries = config_value("max_retries", v)?;
                Ok(())
            })
    }

    #[test]
    fn test_setters_normalize_names() {
        let table = setters();
        let mut server = Server::default();
        table.apply(&mut server, "MaxRetries", &json!(3)).unwrap();
        table.apply(&mut server, "max_retries", &json!(4)).unwrap();
        assert_eq!(server.max_retries, 4);
        assert!(table.contains("maxRetries"));
    }

    #[test]
    fn test_setters_errors() {
        let table = setters();
        let mut server = Server::default();
        assert_eq!(
            table.apply(&mut server, "host", &json!("x")),
            Err(ApplyError::UnknownAttribute("host".into()))
        );
        assert!(matches!(
            table.apply(&mut server, "port", &json!(70000)),
            Err(ApplyError::InvalidValue { .. })
        ));
        assert_eq!(server.port, 0);
    }

    #[test]
    fn test_report_absorb_prefixes_names() {
        let mut report = ApplyReport {
            applied: vec!["a".into()],
            ..Default::default()
        };
        report.absorb(
            "widget",
            ApplyReport {
                applied: vec!["label".into()],
                skipped: vec![("size".into(), ApplyError::UnknownAttribute("size".into()))],
                children: vec!["icon".into()],
            },
        );
        assert_eq!(report.applied, vec!["a", "widget.label"]);
        assert_eq!(report.skipped[0].0, "widget.size");
        assert_eq!(report.children, vec!["widget.icon"]);
        assert!(!report.is_clean());
    }
}
