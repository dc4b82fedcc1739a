//! Lookup tables held by the caller instead of by configured objects.
//!
//! - [`ClassConfRegistry`] maps a Rust type to the builder of its default
//!   configuration.
//! - [`ConfigurableRegistry`] owns configurables and records which of them
//!   are bound to which target.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::Configurable;
use super::target::{ApplyReport, ConfigTarget};
use crate::error::ConfResult;
use crate::model::Configuration;

/// Builds the default configuration of a type.
pub type ConfBuilder = fn() -> Configuration;

/// Per-type default configurations.
#[derive(Default)]
pub struct ClassConfRegistry {
    builders: HashMap<TypeId, (&'static str, ConfBuilder)>,
}

impl ClassConfRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: 'static>(&mut self, builder: ConfBuilder) -> &mut Self {
        self.builders
            .insert(TypeId::of::<T>(), (type_name::<T>(), builder));
        self
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.builders.contains_key(&TypeId::of::<T>())
    }

    /// Fresh default configuration of `T`, if one is registered.
    pub fn conf_of<T: 'static>(&self) -> Option<Configuration> {
        self.builders
            .get(&TypeId::of::<T>())
            .map(|(_, builder)| builder())
    }
}

impl fmt::Debug for ClassConfRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.builders.values().map(|(name, _)| *name).collect();
        f.debug_struct("ClassConfRegistry").field("types", &names).finish()
    }
}

/// Handle of a configurable owned by a [`ConfigurableRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigurableId(u64);

/// Identity of a configured object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

static NEXT_TARGET: AtomicU64 = AtomicU64::new(1);

impl TargetId {
    /// A process-unique identity.
    pub fn next() -> Self {
        Self(NEXT_TARGET.fetch_add(1, Ordering::Relaxed))
    }
}

impl From<u64> for TargetId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Configurables and the targets they are bound to.
#[derive(Debug, Default)]
pub struct ConfigurableRegistry {
    next_id: u64,
    configurables: HashMap<ConfigurableId, Configurable>,
    bindings: HashMap<TargetId, Vec<ConfigurableId>>,
}

impl ConfigurableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, configurable: Configurable) -> ConfigurableId {
        self.next_id += 1;
        let id = ConfigurableId(self.next_id);
        self.configurables.insert(id, configurable);
        id
    }

    pub fn get(&self, id: ConfigurableId) -> Option<&Configurable> {
        self.configurables.get(&id)
    }

    pub fn get_mut(&mut self, id: ConfigurableId) -> Option<&mut Configurable> {
        self.configurables.get_mut(&id)
    }

    /// Drop a configurable and every binding to it.
    pub fn remove(&mut self, id: ConfigurableId) -> Option<Configurable> {
        let removed = self.configurables.remove(&id)?;
        self.bindings.retain(|_, ids| {
            ids.retain(|bound| *bound != id);
            !ids.is_empty()
        });
        Some(removed)
    }

    /// Record that `id` configures `target`.
    ///
    /// Returns false when nothing was recorded: unknown id, a configurable
    /// whose `store` option is off, or an existing binding.
    pub fn bind(&mut self, target: TargetId, id: ConfigurableId) -> bool {
        let Some(configurable) = self.configurables.get(&id) else {
            return false;
        };
        if !configurable.options().store {
            debug!(?target, ?id, "Configurable does not store its targets");
            return false;
        }
        let ids = self.bindings.entry(target).or_default();
        if ids.contains(&id) {
            return false;
        }
        ids.push(id);
        true
    }

    /// Remove one binding. Targets left without configurables are forgotten.
    pub fn unbind(&mut self, target: TargetId, id: ConfigurableId) -> bool {
        let Some(ids) = self.bindings.get_mut(&target) else {
            return false;
        };
        let before = ids.len();
        ids.retain(|bound| *bound != id);
        let removed = ids.len() != before;
        if ids.is_empty() {
            self.bindings.remove(&target);
        }
        removed
    }

    /// Configurables bound to `target`, in bind order.
    pub fn configurables_of(&self, target: TargetId) -> Vec<ConfigurableId> {
        self.bindings.get(&target).cloned().unwrap_or_default()
    }

    pub fn is_bound(&self, target: TargetId) -> bool {
        self.bindings.contains_key(&target)
    }

    /// Apply every configurable bound to `target`, in bind order.
    pub fn apply_configuration(
        &self,
        target_id: TargetId,
        target: &mut dyn ConfigTarget,
    ) -> ConfResult<ApplyReport> {
        let mut report = ApplyReport::default();
        for id in self.bindings.get(&target_id).into_iter().flatten() {
            if let Some(configurable) = self.configurables.get(id) {
                report.extend(configurable.apply_configuration(target)?);
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configurable::ConfigurableOptions;
    use crate::model::{Category, Parameter};

    struct Widget;
    struct Gadget;

    fn widget_conf() -> Configuration {
        Configuration::from_category(Category::with_params(
            "widget",
            [Parameter::new("size").with_value(3)],
        ))
    }

    #[test]
    fn test_class_conf_lookup_by_type() {
        let mut registry = ClassConfRegistry::new();
        registry.register::<Widget>(widget_conf);

        assert!(registry.contains::<Widget>());
        assert!(!registry.contains::<Gadget>());
        let conf = registry.conf_of::<Widget>().unwrap();
        assert!(conf.contains("widget"));
        assert!(registry.conf_of::<Gadget>().is_none());
    }

    #[test]
    fn test_bind_and_unbind() {
        let mut registry = ConfigurableRegistry::new();
        let first = registry.insert(Configurable::new());
        let second = registry.insert(Configurable::new());
        let target = TargetId::next();

        assert!(registry.bind(target, first));
        assert!(!registry.bind(target, first));
        assert!(registry.bind(target, second));
        assert_eq!(registry.configurables_of(target), vec![first, second]);

        assert!(registry.unbind(target, first));
        assert!(!registry.unbind(target, first));
        assert!(registry.unbind(target, second));
        assert!(!registry.is_bound(target));
        assert!(registry.configurables_of(target).is_empty());
    }

    #[test]
    fn test_bind_honours_store() {
        let mut registry = ConfigurableRegistry::new();
        let options = ConfigurableOptions {
            store: false,
            ..Default::default()
        };
        let id = registry.insert(Configurable::with_options(options));
        let target = TargetId::from(7);
        assert!(!registry.bind(target, id));
        assert!(!registry.is_bound(target));
    }

    #[test]
    fn test_remove_drops_bindings() {
        let mut registry = ConfigurableRegistry::new();
        let id = registry.insert(Configurable::new());
        let target = TargetId::next();
        registry.bind(target, id);
        assert!(registry.remove(id).is_some());
        assert!(!registry.is_bound(target));
        assert!(registry.get(id).is_none());
    }
}
