//! Configuration data model.
//!
//! Three levels, leaves first:
//! - [`Parameter`] - a named value with an optional source expression
//! - [`Category`] - an ordered, name-unique group of parameters
//! - [`Configuration`] - an ordered group of categories
//!
//! ## Precedence
//! Categories added later override earlier ones for parameters of the same
//! name. [`Configuration::update`] merges another configuration in place:
//! already-declared parameters take the newcomer's expression (and value, when
//! it fits the declared type), unknown parameters arrive as *foreign*
//! parameters, unknown categories are appended whole.
//!
//! ## Sub-configurations
//! A category named `:<param>` configures the object built from parameter
//! `<param>`. Such categories are skipped by [`Configuration::unify`].

mod category;
mod conf;
mod param;
mod unified;
mod value;

pub use category::Category;
pub use conf::{
    Configuration, ERRORS, FOREIGNS, ResolveSummary, SUB_CONF_PREFIX, VALUES, is_reserved_name,
    is_sub_conf_name, sub_conf_name,
};
pub use param::Parameter;
pub use unified::Unified;
pub use value::{ParamType, describe, render};
