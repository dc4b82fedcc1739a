//! Flattened views over a configuration.

use super::category::Category;
use super::conf::{Configuration, ERRORS, FOREIGNS, VALUES};
use super::param::Parameter;

/// Local values, foreign values and failed parameters of a configuration.
///
/// Built by [`Configuration::unify`]. A parameter name appears in at most one
/// view, and a parameter with an error never appears in `values` or `foreigns`.
#[derive(Debug, Clone, PartialEq)]
pub struct Unified {
    values: Category,
    foreigns: Category,
    errors: Category,
}

impl Unified {
    pub(crate) fn from_winners(winners: Category) -> Self {
        let mut unified = Self {
            values: Category::new(VALUES),
            foreigns: Category::new(FOREIGNS),
            errors: Category::new(ERRORS),
        };
        for param in winners.iter() {
            let view = if param.has_error() {
                &mut unified.errors
            } else if param.is_local() {
                &mut unified.values
            } else {
                &mut unified.foreigns
            };
            view.add(param.clone());
        }
        unified
    }

    /// Parameters declared by the owner.
    pub fn values(&self) -> &Category {
        &self.values
    }

    /// Parameters supplied by merged-in sources.
    pub fn foreigns(&self) -> &Category {
        &self.foreigns
    }

    /// Parameters whose last resolution failed.
    pub fn errors(&self) -> &Category {
        &self.errors
    }

    /// View by reserved name (`:VALUES`, `:FOREIGN`, `:ERRORS`).
    pub fn view(&self, name: &str) -> Option<&Category> {
        match name {
            VALUES => Some(&self.values),
            FOREIGNS => Some(&self.foreigns),
            ERRORS => Some(&self.errors),
            _ => None,
        }
    }

    /// Parameters that may be applied to a target, values first.
    pub fn applicable(&self, foreigns: bool) -> impl Iterator<Item = &Parameter> {
        let foreign_iter = foreigns.then(|| self.foreigns.iter()).into_iter().flatten();
        self.values.iter().chain(foreign_iter)
    }

    pub fn into_configuration(self) -> Configuration {
        Configuration::from_categories([self.values, self.foreigns, self.errors])
    }
}
