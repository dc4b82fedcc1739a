//! Orchestration: load sources, resolve, apply to targets.
//!
//! A [`Configurable`] owns a base [`Configuration`] plus the policy used to
//! complete it: the source paths and drivers, the resolver and its flags, and
//! the factories used for sub-configurations.
//!
//! ## Pipeline
//! [`Configurable::apply_configuration`] runs three steps:
//! 1. [`Configurable::get_conf`] merges every driver result for every path on
//!    top of the base configuration;
//! 2. the result is resolved with the configurable's scope and flags;
//! 3. [`Configurable::configure`] applies the unified values to the target and
//!    expands sub-configurations.
//!
//! ## Inherited configuration
//! With `inherited_conf` on (the default), the base configuration starts from
//! the configurable's own `CONFIGURABLE` category and the registered default
//! configuration of its type, and the default paths are searched before the
//! explicit ones.

mod registry;
mod subconf;
mod target;

pub use registry::{ClassConfRegistry, ConfBuilder, ConfigurableId, ConfigurableRegistry, TargetId};
pub use subconf::{Factory, FactoryRegistry, MAX_SUB_CONF_DEPTH, factory_args};
pub use target::{ApplyReport, ConfigTarget, Setter, Setters, config_value};

use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

use crate::driver::{ConfDriver, default_drivers};
use crate::error::{ApplyError, ConfResult};
use crate::logging::{DiagnosticSink, TracingSink};
use crate::model::{Category, Configuration, ParamType, Parameter, ResolveSummary};
use crate::paths::ConfPaths;
use crate::resolver::{
    DEFAULT_BESTEFFORT, DEFAULT_SAFE, ExprResolver, ResolveOptions, Resolver, Scope,
};
use subconf::Applier;

/// Category holding a configurable's own options.
pub const CATEGORY: &str = "CONFIGURABLE";

/// Paths searched when `inherited_conf` is on.
pub const DEFAULT_CONF_PATHS: &[&str] = &["cfgweave.json", "cfgweave.yaml", "cfgweave.ini"];

pub const DEFAULT_FOREIGNS: bool = true;
pub const DEFAULT_STORE: bool = true;
pub const DEFAULT_INHERITED_CONF: bool = true;

/// Policy of a [`Configurable`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurableOptions {
    /// Also apply parameters the base configuration did not declare.
    pub foreigns: bool,
    /// Resolve without ambient capabilities.
    pub safe: bool,
    /// Record resolution failures instead of aborting.
    pub besteffort: bool,
    /// Let a [`ConfigurableRegistry`] remember the targets this configures.
    pub store: bool,
    /// Start from the descriptor and type defaults, search default paths.
    pub inherited_conf: bool,
    /// Explicit source paths.
    pub paths: Vec<PathBuf>,
    /// Names visible to expressions.
    pub scope: Scope,
}

impl Default for ConfigurableOptions {
    fn default() -> Self {
        Self {
            foreigns: DEFAULT_FOREIGNS,
            safe: DEFAULT_SAFE,
            besteffort: DEFAULT_BESTEFFORT,
            store: DEFAULT_STORE,
            inherited_conf: DEFAULT_INHERITED_CONF,
            paths: Vec::new(),
            scope: Scope::new(),
        }
    }
}

fn paths_value(name: &str, value: &Value) -> Result<Vec<PathBuf>, ApplyError> {
    match value {
        Value::String(path) => Ok(vec![PathBuf::from(path)]),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(path) => Ok(PathBuf::from(path)),
                other => Err(ApplyError::invalid(name, format!("not a path: {}", other))),
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(ApplyError::invalid(name, format!("not a path list: {}", other))),
    }
}

fn option_setters() -> &'static Setters<ConfigurableOptions> {
    static SETTERS: OnceLock<Setters<ConfigurableOptions>> = OnceLock::new();
    SETTERS.get_or_init(|| {
        Setters::new()
            .with("foreigns", |o: &mut ConfigurableOptions, v| {
                o.foreigns = config_value("foreigns", v)?;
                Ok(())
            })
            .with("safe", |o: &mut ConfigurableOptions, v| {
                o.safe = config_value("safe", v)?;
                Ok(())
            })
            .with("besteffort", |o: &mut ConfigurableOptions, v| {
                o.besteffort = config_value("besteffort", v)?;
                Ok(())
            })
            .with("store", |o: &mut ConfigurableOptions, v| {
                o.store = config_value("store", v)?;
                Ok(())
            })
            .with("inherited_conf", |o: &mut ConfigurableOptions, v| {
                o.inherited_conf = config_value("inherited_conf", v)?;
                Ok(())
            })
            .with("paths", |o: &mut ConfigurableOptions, v| {
                o.paths = paths_value("paths", v)?;
                Ok(())
            })
            .with("scope", |o: &mut ConfigurableOptions, v| {
                o.scope = config_value("scope", v)?;
                Ok(())
            })
    })
}

impl ConfigTarget for ConfigurableOptions {
    fn set_config_value(&mut self, name: &str, value: &Value) -> Result<(), ApplyError> {
        option_setters().apply(self, name, value)
    }
}

/// Loads, resolves and applies configuration.
pub struct Configurable {
    conf: Configuration,
    class_conf: Option<Configuration>,
    options: ConfigurableOptions,
    drivers: Vec<Box<dyn ConfDriver>>,
    resolver: Box<dyn Resolver>,
    factories: FactoryRegistry,
    search: ConfPaths,
    sink: Arc<dyn DiagnosticSink>,
}

impl Default for Configurable {
    fn default() -> Self {
        Self::new()
    }
}

impl Configurable {
    pub fn new() -> Self {
        Self::with_options(ConfigurableOptions::default())
    }

    pub fn with_options(options: ConfigurableOptions) -> Self {
        let mut configurable = Self {
            conf: Configuration::new(),
            class_conf: None,
            options,
            drivers: default_drivers(),
            resolver: Box::new(ExprResolver),
            factories: FactoryRegistry::new(),
            search: ConfPaths::discover(),
            sink: Arc::new(TracingSink),
        };
        configurable.set_conf(Configuration::new());
        configurable
    }

    /// Configurable for type `T`, inheriting its registered default conf.
    pub fn for_type<T: 'static>(registry: &ClassConfRegistry, options: ConfigurableOptions) -> Self {
        let mut configurable = Self::with_options(options);
        configurable.class_conf = registry.conf_of::<T>();
        configurable.set_conf(Configuration::new());
        configurable
    }

    pub fn with_drivers(mut self, drivers: Vec<Box<dyn ConfDriver>>) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn with_resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_factories(mut self, factories: FactoryRegistry) -> Self {
        self.factories = factories;
        self
    }

    pub fn with_search(mut self, search: ConfPaths) -> Self {
        self.search = search;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn options(&self) -> &ConfigurableOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ConfigurableOptions {
        &mut self.options
    }

    pub fn conf(&self) -> &Configuration {
        &self.conf
    }

    pub fn factories_mut(&mut self) -> &mut FactoryRegistry {
        &mut self.factories
    }

    /// The `CONFIGURABLE` category describing the current options.
    pub fn descriptor(&self) -> Category {
        let paths: Vec<Value> = self
            .options
            .paths
            .iter()
            .map(|p| Value::String(p.display().to_string()))
            .collect();
        Category::with_params(
            CATEGORY,
            [
                Parameter::new("safe")
                    .with_value(self.options.safe)
                    .with_vtype(ParamType::Bool),
                Parameter::new("besteffort")
                    .with_value(self.options.besteffort)
                    .with_vtype(ParamType::Bool),
                Parameter::new("foreigns")
                    .with_value(self.options.foreigns)
                    .with_vtype(ParamType::Bool),
                Parameter::new("store")
                    .with_value(self.options.store)
                    .with_vtype(ParamType::Bool),
                Parameter::new("paths")
                    .with_value(paths)
                    .with_vtype(ParamType::List),
            ],
        )
    }

    /// Replace the base configuration.
    ///
    /// With `inherited_conf`, `conf` is merged on top of the descriptor and
    /// the type's default configuration instead of replacing them.
    pub fn set_conf(&mut self, conf: Configuration) {
        if !self.options.inherited_conf {
            self.conf = conf;
            return;
        }
        let mut base = Configuration::from_category(self.descriptor());
        if let Some(class_conf) = &self.class_conf {
            base.update(class_conf);
        }
        base.update(&conf);
        self.conf = base;
    }

    /// Source paths: defaults first when inherited, then explicit ones.
    pub fn paths(&self) -> Vec<PathBuf> {
        let defaults = self
            .options
            .inherited_conf
            .then_some(DEFAULT_CONF_PATHS)
            .unwrap_or_default()
            .iter()
            .map(PathBuf::from);
        defaults.chain(self.options.paths.iter().cloned()).collect()
    }

    /// Merge every driver result for every path on top of `conf` (or the
    /// base configuration).
    pub fn get_conf(
        &self,
        conf: Option<&Configuration>,
        paths: Option<&[PathBuf]>,
    ) -> ConfResult<Configuration> {
        let hints = conf.unwrap_or(&self.conf);
        let mut result = hints.clone();
        let own_paths;
        let paths = match paths {
            Some(paths) => paths,
            None => {
                own_paths = self.paths();
                own_paths.as_slice()
            }
        };

        for path in paths {
            let located = self.search.locate(path);
            if located.is_empty() {
                debug!(path = %path.display(), "Configuration source not found");
            }
            for file in located {
                if !self.load_into(&file, hints, &mut result)? {
                    warn!(path = %file.display(), "No driver found for configuration source");
                }
            }
        }
        Ok(result)
    }

    fn load_into(&self, file: &Path, hints: &Configuration, result: &mut Configuration) -> ConfResult<bool> {
        let mut loaded = false;
        for driver in &self.drivers {
            if let Some(conf) = driver.get_conf(file, hints)? {
                info!(path = %file.display(), driver = driver.name(), categories = conf.len(), "Loaded configuration source");
                result.update(&conf);
                loaded = true;
            }
        }
        Ok(loaded)
    }

    /// Resolve `conf` with this configurable's scope and flags.
    pub fn resolve(&self, conf: &mut Configuration) -> ConfResult<ResolveSummary> {
        let options = ResolveOptions {
            scope: self.options.scope.clone(),
            safe: self.options.safe,
            besteffort: self.options.besteffort,
        };
        let summary = conf.resolve(self.resolver.as_ref(), &options)?;
        info!(
            resolved = summary.resolved,
            failed = summary.failed,
            "Resolved configuration"
        );
        Ok(summary)
    }

    /// Load and resolve the configuration applied to targets.
    ///
    /// The `CONFIGURABLE` category steers this configurable and is left out;
    /// see [`Configurable::reconfigure`].
    fn target_conf(&self) -> ConfResult<Configuration> {
        let mut conf = self.get_conf(None, None)?;
        self.resolve(&mut conf)?;
        Ok(Configuration::from_categories(
            conf.iter().filter(|cat| cat.name() != CATEGORY).cloned(),
        ))
    }

    /// Load, resolve and apply onto `target`.
    pub fn apply_configuration(&self, target: &mut dyn ConfigTarget) -> ConfResult<ApplyReport> {
        let conf = self.target_conf()?;
        self.configure(&conf, target)
    }

    /// Load and resolve once, then apply onto every target in order.
    pub fn apply_configuration_to(
        &self,
        targets: &mut [&mut dyn ConfigTarget],
    ) -> ConfResult<Vec<ApplyReport>> {
        let conf = self.target_conf()?;
        self.configure_all(&conf, targets)
    }

    /// Apply an already resolved configuration onto `target`.
    pub fn configure(&self, conf: &Configuration, target: &mut dyn ConfigTarget) -> ConfResult<ApplyReport> {
        let applier = Applier {
            factories: &self.factories,
            foreigns: self.options.foreigns,
            sink: self.sink.as_ref(),
        };
        applier.configure(conf, target)
    }

    /// Apply an already resolved configuration onto every target in order.
    ///
    /// Stops at the first fatal error; earlier targets stay configured.
    pub fn configure_all(
        &self,
        conf: &Configuration,
        targets: &mut [&mut dyn ConfigTarget],
    ) -> ConfResult<Vec<ApplyReport>> {
        debug!(targets = targets.len(), "Configuring targets");
        targets
            .iter_mut()
            .map(|target| self.configure(conf, &mut **target))
            .collect()
    }

    /// Apply the loaded `CONFIGURABLE` category to this configurable's own
    /// options.
    pub fn reconfigure(&mut self) -> ConfResult<ApplyReport> {
        let mut conf = self.get_conf(None, None)?;
        self.resolve(&mut conf)?;
        let own = conf
            .category(CATEGORY)
            .cloned()
            .map(Configuration::from_category)
            .unwrap_or_default();

        let mut options = self.options.clone();
        let report = self.configure(&own, &mut options)?;
        self.options = options;
        Ok(report)
    }
}

impl fmt::Debug for Configurable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let drivers: Vec<&str> = self.drivers.iter().map(|d| d.name()).collect();
        f.debug_struct("Configurable")
            .field("options", &self.options)
            .field("categories", &self.conf.len())
            .field("drivers", &drivers)
            .field("factories", &self.factories)
            .finish()
    }
}
