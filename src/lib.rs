//! cfgweave: layered, expression-aware configuration
//!
//! This module exports the core components for embedding and testing.

pub mod cli;
pub mod configurable;
pub mod driver;
pub mod error;
pub mod format;
pub mod logging;
pub mod model;
pub mod paths;
pub mod resolver;

pub use configurable::{
    ConfigTarget, Configurable, ConfigurableOptions, ConfigurableRegistry, FactoryRegistry, Setters,
};
pub use error::{ApplyError, ConfError, ConfResult, ResolutionError};
pub use model::{Category, Configuration, ParamType, Parameter, Unified};
pub use resolver::{ExprResolver, ResolveOptions, Resolver, Scope};
