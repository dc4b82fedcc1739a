//! Sub-configuration expansion.
//!
//! A category `:widget` configures an object built from parameter `widget`.
//! The parameter resolves to the name of a factory registered in a
//! [`FactoryRegistry`]; the factory receives the sub-category's values as a
//! JSON object, and the object it returns is configured in turn with
//! [`Configuration::nested`] before being handed to its parent through
//! [`ConfigTarget::set_config_child`].

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use super::target::{ApplyReport, ConfigTarget};
use crate::error::{ConfError, ConfResult};
use crate::logging::{Diagnostic, DiagnosticSink, Severity};
use crate::model::{Category, Configuration, SUB_CONF_PREFIX, describe, is_sub_conf_name};

/// Deepest allowed sub-configuration nesting.
pub const MAX_SUB_CONF_DEPTH: usize = 32;

/// Builds an object from its sub-configuration arguments.
pub type Factory =
    Arc<dyn Fn(&Map<String, Value>) -> anyhow::Result<Box<dyn ConfigTarget>> + Send + Sync>;

/// Factories addressable by name from a configuration.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Factory>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Map<String, Value>) -> anyhow::Result<Box<dyn ConfigTarget>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Factory> {
        self.factories.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort_unstable();
        f.debug_struct("FactoryRegistry").field("factories", &names).finish()
    }
}

/// Resolved, non-failing values of a sub-category as factory arguments.
pub fn factory_args(category: &Category) -> Map<String, Value> {
    category
        .iter()
        .filter(|param| !param.has_error())
        .map(|param| (param.name().to_string(), param.value().clone()))
        .collect()
}

/// Applies a resolved configuration onto a target, recursing into
/// sub-configurations.
pub(crate) struct Applier<'a> {
    pub factories: &'a FactoryRegistry,
    pub foreigns: bool,
    pub sink: &'a dyn DiagnosticSink,
}

impl Applier<'_> {
    pub fn configure(
        &self,
        conf: &Configuration,
        target: &mut dyn ConfigTarget,
    ) -> ConfResult<ApplyReport> {
        self.configure_at(conf, target, &mut Vec::new())
    }

    fn configure_at(
        &self,
        conf: &Configuration,
        target: &mut dyn ConfigTarget,
        chain: &mut Vec<String>,
    ) -> ConfResult<ApplyReport> {
        let unified = conf.unify();
        let mut report = ApplyReport::default();

        for param in unified.errors().iter() {
            trace!(parameter = %param.name(), "Skipping failed parameter");
        }

        let mut expand = Vec::new();
        for param in unified.applicable(self.foreigns) {
            if conf.sub_conf(param.name()).is_some() {
                expand.push(param);
                continue;
            }
            match target.set_config_value(param.name(), param.value()) {
                Ok(()) => report.applied.push(param.name().to_string()),
                Err(err) => {
                    self.report(Severity::Warning, param.name(), err.to_string());
                    report.skipped.push((param.name().to_string(), err));
                }
            }
        }

        for category in conf.iter().filter(|cat| is_sub_conf_name(cat.name())) {
            let parent = &category.name()[SUB_CONF_PREFIX.len()..];
            let orphan = !parent.contains(SUB_CONF_PREFIX)
                && !unified.applicable(self.foreigns).any(|p| p.name() == parent);
            if orphan {
                debug!(category = %category.name(), "Sub-configuration has no applicable parent parameter");
            }
        }

        for param in expand {
            let name = param.name();
            if chain.iter().any(|ancestor| ancestor == name) || chain.len() >= MAX_SUB_CONF_DEPTH {
                let mut cycle = chain.clone();
                cycle.push(name.to_string());
                return Err(ConfError::SubConfCycle { chain: cycle });
            }

            let Value::String(factory_name) = param.value() else {
                self.report(
                    Severity::Warning,
                    name,
                    format!("factory must be named by a string, got {}", describe(param.value())),
                );
                continue;
            };
            let Some(factory) = self.factories.get(factory_name) else {
                self.report(Severity::Warning, name, format!("unknown factory '{}'", factory_name));
                continue;
            };

            let args = conf.sub_conf(name).map(factory_args).unwrap_or_default();
            let mut child = match factory(&args) {
                Ok(child) => child,
                Err(err) => {
                    self.report(
                        Severity::Error,
                        name,
                        format!("factory '{}' failed: {:#}", factory_name, err),
                    );
                    continue;
                }
            };

            chain.push(name.to_string());
            let outcome = self.configure_at(&conf.nested(name), child.as_mut(), chain);
            chain.pop();
            let child_report = outcome?;

            debug!(parameter = %name, factory = %factory_name, "Built sub-configured object");
            report.absorb(name, child_report);
            match target.set_config_child(name, child) {
                Ok(()) => report.children.push(name.to_string()),
                Err(err) => {
                    self.report(Severity::Warning, name, err.to_string());
                    report.skipped.push((name.to_string(), err));
                }
            }
        }

        Ok(report)
    }

    fn report(&self, severity: Severity, subject: &str, message: String) {
        self.sink.report(Diagnostic {
            severity,
            subject: subject.to_string(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApplyError;
    use crate::logging::CollectingSink;
    use crate::model::Parameter;
    use std::any::Any;

    #[derive(Default)]
    struct Node {
        values: Map<String, Value>,
        children: Vec<(String, Box<dyn ConfigTarget>)>,
    }

    impl ConfigTarget for Node {
        fn set_config_value(&mut self, name: &str, value: &Value) -> Result<(), ApplyError> {
            if name.starts_with('x') {
                return Err(ApplyError::UnknownAttribute(name.to_string()));
            }
            self.values.insert(name.to_string(), value.clone());
            Ok(())
        }

        fn set_config_child(
            &mut self,
            name: &str,
            child: Box<dyn ConfigTarget>,
        ) -> Result<(), ApplyError> {
            self.children.push((name.to_string(), child));
            Ok(())
        }

        fn as_any(&self) -> Option<&dyn Any> {
            Some(self)
        }
    }

    fn node_factories() -> FactoryRegistry {
        let mut factories = FactoryRegistry::new();
        factories.register("node", |args| {
            let mut node = Node::default();
            node.values.insert("built_with".into(), Value::from(args.len()));
            Ok(Box::new(node) as Box<dyn ConfigTarget>)
        });
        factories.register("broken", |_| anyhow::bail!("no resources"));
        factories
    }

    fn child<'a>(node: &'a Node, name: &str) -> &'a Node {
        let (_, child) = node
            .children
            .iter()
            .find(|(n, _)| n == name)
            .unwrap();
        child.as_any().unwrap().downcast_ref::<Node>().unwrap()
    }

    #[test]
    fn test_expands_nested_sub_configurations() {
        let conf = Configuration::from_categories([
            Category::with_params(
                "main",
                [
                    Parameter::new("name").with_value("root"),
                    Parameter::new("widget").with_value("node"),
                ],
            ),
            Category::with_params(
                ":widget",
                [
                    Parameter::new("label").with_value("ok"),
                    Parameter::new("icon").with_value("node"),
                ],
            ),
            Category::with_params(":widget:icon", [Parameter::new("size").with_value(16)]),
        ]);
        let factories = node_factories();
        let sink = CollectingSink::new();
        let applier = Applier {
            factories: &factories,
            foreigns: true,
            sink: &sink,
        };

        let mut root = Node::default();
        let report = applier.configure(&conf, &mut root).unwrap();

        assert_eq!(root.values.get("name"), Some(&Value::from("root")));
        assert!(!root.values.contains_key("widget"));
        let widget = child(&root, "widget");
        assert_eq!(widget.values.get("label"), Some(&Value::from("ok")));
        assert_eq!(widget.values.get("built_with"), Some(&Value::from(2)));
        let icon = child(widget, "icon");
        assert_eq!(icon.values.get("size"), Some(&Value::from(16)));

        assert_eq!(report.children, vec!["widget.icon", "widget"]);
        assert!(report.applied.contains(&"widget.icon.size".to_string()));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_factory_problems_are_diagnostics() {
        let conf = Configuration::from_categories([
            Category::with_params(
                "main",
                [
                    Parameter::new("a").with_value("missing"),
                    Parameter::new("b").with_value("broken"),
                    Parameter::new("c").with_value(3),
                    Parameter::new("xray").with_value(1),
                ],
            ),
            Category::new(":a"),
            Category::new(":b"),
            Category::new(":c"),
        ]);
        let factories = node_factories();
        let sink = CollectingSink::new();
        let applier = Applier {
            factories: &factories,
            foreigns: true,
            sink: &sink,
        };

        let mut root = Node::default();
        let report = applier.configure(&conf, &mut root).unwrap();

        assert!(root.children.is_empty());
        let subjects: Vec<String> = sink.entries().into_iter().map(|d| d.subject).collect();
        assert_eq!(subjects, vec!["xray", "a", "b", "c"]);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_cycle_is_an_error() {
        let conf = Configuration::from_categories([
            Category::with_params("main", [Parameter::new("loop").with_value("node")]),
            Category::with_params(":loop", [Parameter::new("loop").with_value("node")]),
            Category::with_params(":loop:loop", [Parameter::new("loop").with_value("node")]),
        ]);
        let factories = node_factories();
        let sink = CollectingSink::new();
        let applier = Applier {
            factories: &factories,
            foreigns: true,
            sink: &sink,
        };

        let err = applier.configure(&conf, &mut Node::default()).unwrap_err();
        match err {
            ConfError::SubConfCycle { chain } => assert_eq!(chain, vec!["loop", "loop"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_foreigns_policy() {
        let conf = Configuration::from_category(Category::with_params(
            "main",
            [
                Parameter::new("mine").with_value(1),
                Parameter::new("theirs").with_value(2).with_local(false),
            ],
        ));
        let factories = FactoryRegistry::new();
        let sink = CollectingSink::new();
        let applier = Applier {
            factories: &factories,
            foreigns: false,
            sink: &sink,
        };

        let mut root = Node::default();
        let report = applier.configure(&conf, &mut root).unwrap();
        assert_eq!(report.applied, vec!["mine"]);
        assert!(!root.values.contains_key("theirs"));
    }
}
