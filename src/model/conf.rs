//! Ordered collection of categories: the mergeable, resolvable unit.

use serde_json::Value;
use std::collections::HashMap;
use std::ops::AddAssign;
use tracing::{debug, trace};

use super::category::Category;
use super::param::Parameter;
use super::unified::Unified;
use crate::error::{ConfError, ConfResult};
use crate::resolver::{Bindings, Environment, ResolveOptions, Resolver};

/// Pseudo-category holding parameters that failed resolution.
pub const ERRORS: &str = ":ERRORS";
/// Pseudo-category holding local parameter values.
pub const VALUES: &str = ":VALUES";
/// Pseudo-category holding foreign parameter values.
pub const FOREIGNS: &str = ":FOREIGN";

/// Marker prefixing sub-configuration category names (`:widget`).
pub const SUB_CONF_PREFIX: &str = ":";

/// True for the three pseudo-category names.
pub fn is_reserved_name(name: &str) -> bool {
    matches!(name, ERRORS | VALUES | FOREIGNS)
}

/// True when `name` denotes a sub-configuration category.
pub fn is_sub_conf_name(name: &str) -> bool {
    name.starts_with(SUB_CONF_PREFIX) && !is_reserved_name(name)
}

/// Category name of the sub-configuration attached to parameter `param`.
pub fn sub_conf_name(param: &str) -> String {
    format!("{}{}", SUB_CONF_PREFIX, param)
}

/// Counts from one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub resolved: usize,
    pub failed: usize,
}

/// Ordered categories. Later categories take precedence over earlier ones
/// for parameters of the same name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    categories: Vec<Category>,
    index: HashMap<String, usize>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_category(category: Category) -> Self {
        Self::from_categories([category])
    }

    pub fn from_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut conf = Self::new();
        for category in categories {
            conf.add_category(category);
        }
        conf
    }

    /// Append a category, or replace the one with the same name in place.
    pub fn add_category(&mut self, category: Category) -> Option<Category> {
        match self.index.get(category.name()) {
            Some(&pos) => Some(std::mem::replace(&mut self.categories[pos], category)),
            None => {
                self.index
                    .insert(category.name().to_string(), self.categories.len());
                self.categories.push(category);
                None
            }
        }
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.index.get(name).map(|&pos| &self.categories[pos])
    }

    pub fn category_mut(&mut self, name: &str) -> Option<&mut Category> {
        self.index.get(name).map(|&pos| &mut self.categories[pos])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Category> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Every parameter with its category, in resolution order.
    pub fn params(&self) -> impl Iterator<Item = (&Category, &Parameter)> {
        self.categories
            .iter()
            .flat_map(|cat| cat.iter().map(move |param| (cat, param)))
    }

    /// Parameters whose last resolution failed.
    pub fn errors(&self) -> impl Iterator<Item = &Parameter> {
        self.params()
            .map(|(_, param)| param)
            .filter(|param| param.has_error())
    }

    /// Merge `other` into `self`, category by category.
    ///
    /// - a parameter already declared here takes `other`'s `svalue`, and its
    ///   `value` when the value converts to the declared type (otherwise the
    ///   previous value is kept);
    /// - a parameter unknown to an existing category is copied in as foreign;
    /// - a category unknown here is appended unchanged.
    pub fn update(&mut self, other: &Configuration) {
        for category in other.iter() {
            let Some(own) = self.category_mut(category.name()) else {
                trace!(category = %category.name(), "Appending category");
                self.add_category(category.clone());
                continue;
            };

            for param in category {
                match own.get_mut(param.name()) {
                    Some(existing) => {
                        existing.set_svalue(param.svalue().map(str::to_string));
                        if let Err(err) = existing.set_value(param.value().clone()) {
                            debug!(
                                category = %category.name(),
                                parameter = %param.name(),
                                error = %err,
                                "Override does not fit declared type, previous value kept"
                            );
                        }
                    }
                    None => {
                        own.add(param.copy(false));
                    }
                }
            }
        }
    }

    /// Resolve every parameter, categories then parameters in insertion order.
    ///
    /// Expressions see the caller scope plus the values of parameters already
    /// resolved in this pass (and literal ones). With `besteffort` each failure
    /// is recorded on its parameter and the pass continues; without it the
    /// first failure aborts the pass.
    pub fn resolve(
        &mut self,
        resolver: &dyn Resolver,
        options: &ResolveOptions,
    ) -> ConfResult<ResolveSummary> {
        let mut done: Vec<Vec<bool>> = self
            .categories
            .iter()
            .map(|cat| vec![false; cat.len()])
            .collect();
        let mut summary = ResolveSummary::default();

        for ci in 0..self.categories.len() {
            for pi in 0..self.categories[ci].len() {
                let outcome = {
                    let Some(param) = self.categories[ci].get_index(pi) else {
                        continue;
                    };
                    let view = PassBindings {
                        conf: self,
                        done: &done,
                    };
                    let env =
                        Environment::new(&options.scope, options.safe).with_bindings(&view);
                    param.evaluate(resolver, &env)
                };

                if let Err(ref err) = outcome {
                    debug!(category = %self.categories[ci].name(), error = %err, "Resolution failed");
                    summary.failed += 1;
                } else {
                    summary.resolved += 1;
                }

                if let Some(param) = self.categories[ci].get_index_mut(pi) {
                    param.record(outcome, options.besteffort)?;
                }
                done[ci][pi] = true;
            }
        }

        debug!(
            resolved = summary.resolved,
            failed = summary.failed,
            "Configuration resolved"
        );
        Ok(summary)
    }

    /// Parameter read by [`Configuration::pvalue`].
    pub fn param(
        &self,
        name: &str,
        category: Option<&str>,
        history: usize,
    ) -> ConfResult<&Parameter> {
        if let Some(cname) = category
            && !self.contains(cname)
        {
            return Err(ConfError::CategoryNotFound(cname.to_string()));
        }

        // Sub-configuration categories only count when asked for by name.
        let matches: Vec<&Category> = self
            .categories
            .iter()
            .filter(|cat| cat.contains(name))
            .filter(|cat| category == Some(cat.name()) || !cat.name().starts_with(SUB_CONF_PREFIX))
            .collect();

        let base = match category {
            Some(cname) => matches.iter().position(|cat| cat.name() == cname),
            None => matches.len().checked_sub(1),
        }
        .ok_or_else(|| ConfError::parameter_not_found(name, category))?;

        let target = base
            .checked_sub(history)
            .ok_or_else(|| ConfError::HistoryOutOfRange {
                name: name.to_string(),
                history,
                available: base + 1,
            })?;

        matches[target]
            .get(name)
            .ok_or_else(|| ConfError::parameter_not_found(name, category))
    }

    /// Resolved value of parameter `name`.
    ///
    /// Without `category` the most recent definition wins; `history = h`
    /// steps `h` definitions back from it. With `category` the walk starts at
    /// that category's definition instead.
    pub fn pvalue(&self, name: &str, category: Option<&str>, history: usize) -> ConfResult<&Value> {
        self.param(name, category, history).map(Parameter::value)
    }

    /// Flatten ordinary categories into local, foreign and error views.
    ///
    /// Each view lists names in order of first appearance across categories;
    /// a later definition replaces the parameter but keeps its position.
    pub fn unify(&self) -> Unified {
        let mut winners = Category::new(VALUES);
        for category in self
            .categories
            .iter()
            .filter(|cat| !cat.name().starts_with(SUB_CONF_PREFIX))
        {
            for param in category {
                winners.add(param.clone());
            }
        }
        Unified::from_winners(winners)
    }

    /// Sub-configuration category attached to parameter `param`.
    pub fn sub_conf(&self, param: &str) -> Option<&Category> {
        self.category(&sub_conf_name(param))
    }

    /// Configuration of the object built from parameter `param`.
    ///
    /// `:param` becomes the plain category `param`; `:param:<rest>` becomes
    /// `:<rest>`, one nesting level up.
    pub fn nested(&self, param: &str) -> Configuration {
        let head = sub_conf_name(param);
        let deeper = format!("{}{}", head, SUB_CONF_PREFIX);
        let mut conf = Configuration::new();

        for category in &self.categories {
            let renamed = if category.name() == head {
                param.to_string()
            } else if let Some(rest) = category.name().strip_prefix(&deeper)
                && !rest.is_empty()
            {
                sub_conf_name(rest)
            } else {
                continue;
            };
            let mut category = category.clone();
            category.rename(renamed);
            conf.add_category(category);
        }
        conf
    }
}

impl AddAssign<Category> for Configuration {
    fn add_assign(&mut self, category: Category) {
        self.add_category(category);
    }
}

impl<'a> IntoIterator for &'a Configuration {
    type Item = &'a Category;
    type IntoIter = std::slice::Iter<'a, Category>;

    fn into_iter(self) -> Self::IntoIter {
        self.categories.iter()
    }
}

/// Names visible to expressions during one resolution pass.
struct PassBindings<'a> {
    conf: &'a Configuration,
    done: &'a [Vec<bool>],
}

impl Bindings for PassBindings<'_> {
    /// Most recent definition of `name` that already has a usable value.
    ///
    /// Expressions not reached yet in this pass and failed parameters are
    /// skipped, falling back to earlier definitions.
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.conf
            .categories
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, cat)| !cat.name().starts_with(SUB_CONF_PREFIX))
            .find_map(|(ci, cat)| {
                let pi = cat.position(name)?;
                let param = cat.get_index(pi)?;
                let resolved = self
                    .done
                    .get(ci)
                    .and_then(|row| row.get(pi))
                    .copied()
                    .unwrap_or(false);
                let usable = !param.has_error() && (resolved || param.svalue().is_none());
                usable.then(|| param.value())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParamType;
    use crate::resolver::ExprResolver;
    use serde_json::json;

    fn layered() -> Configuration {
        Configuration::from_categories([
            Category::with_params("defaults", [Parameter::new("port").with_value(80)]),
            Category::with_params("project", [Parameter::new("port").with_value(8080)]),
            Category::with_params(
                "user",
                [
                    Parameter::new("port").with_value(9000),
                    Parameter::new("host").with_value("localhost"),
                ],
            ),
        ])
    }

    #[test]
    fn test_pvalue_most_recent_wins() {
        let conf = layered();
        assert_eq!(conf.pvalue("port", None, 0).unwrap(), &json!(9000));
        assert_eq!(conf.pvalue("port", None, 1).unwrap(), &json!(8080));
        assert_eq!(conf.pvalue("port", None, 2).unwrap(), &json!(80));
    }

    #[test]
    fn test_pvalue_with_category_and_history() {
        let conf = layered();
        assert_eq!(conf.pvalue("port", Some("project"), 0).unwrap(), &json!(8080));
        assert_eq!(conf.pvalue("port", Some("project"), 1).unwrap(), &json!(80));
        assert!(matches!(
            conf.pvalue("port", Some("project"), 2),
            Err(ConfError::HistoryOutOfRange { available: 2, .. })
        ));
    }

    #[test]
    fn test_pvalue_lookup_errors() {
        let conf = layered();
        assert!(matches!(
            conf.pvalue("port", Some("missing"), 0),
            Err(ConfError::CategoryNotFound(_))
        ));
        assert!(matches!(
            conf.pvalue("timeout", None, 0),
            Err(ConfError::ParameterNotFound { .. })
        ));
        assert!(matches!(
            conf.pvalue("host", Some("project"), 0),
            Err(ConfError::ParameterNotFound { .. })
        ));
    }

    #[test]
    fn test_add_category_replaces_same_name() {
        let mut conf = layered();
        conf += Category::with_params("project", [Parameter::new("port").with_value(1)]);
        assert_eq!(conf.len(), 3);
        assert_eq!(conf.pvalue("port", None, 1).unwrap(), &json!(1));
    }

    #[test]
    fn test_resolve_sees_earlier_parameters() {
        let mut conf = Configuration::from_categories([
            Category::with_params("A", [Parameter::new("base").with_svalue("40")]),
            Category::with_params(
                "B",
                [
                    Parameter::new("answer").with_svalue("base + 2"),
                    Parameter::new("early").with_svalue("late"),
                    Parameter::new("late").with_svalue("1"),
                ],
            ),
        ]);
        let summary = conf
            .resolve(&ExprResolver, &ResolveOptions::default())
            .unwrap();

        assert_eq!(summary, ResolveSummary { resolved: 3, failed: 1 });
        assert_eq!(conf.pvalue("answer", None, 0).unwrap(), &json!(42));
        // forward reference to an unresolved expression is not bound
        assert!(conf.param("early", None, 0).unwrap().has_error());
    }

    #[test]
    fn test_resolve_falls_back_to_earlier_definition() {
        let mut conf = Configuration::from_categories([
            Category::with_params("A", [Parameter::new("x").with_svalue("1")]),
            Category::with_params("B", [Parameter::new("y").with_svalue("x + 1")]),
            Category::with_params("C", [Parameter::new("x").with_svalue("5")]),
            Category::with_params("D", [Parameter::new("z").with_svalue("x * 10")]),
        ]);
        let summary = conf
            .resolve(&ExprResolver, &ResolveOptions::default())
            .unwrap();

        assert_eq!(summary.failed, 0);
        // C's `x` is not resolved yet when `y` is evaluated
        assert_eq!(conf.pvalue("y", None, 0).unwrap(), &json!(2));
        assert_eq!(conf.pvalue("z", None, 0).unwrap(), &json!(50));
    }

    #[test]
    fn test_failed_definition_is_not_bound() {
        let mut conf = Configuration::from_categories([
            Category::with_params("A", [Parameter::new("x").with_value(3)]),
            Category::with_params("B", [Parameter::new("x").with_svalue("1 / 0")]),
            Category::with_params("C", [Parameter::new("y").with_svalue("x")]),
        ]);
        conf.resolve(&ExprResolver, &ResolveOptions::default())
            .unwrap();
        assert_eq!(conf.pvalue("y", None, 0).unwrap(), &json!(3));
    }

    #[test]
    fn test_strict_resolve_stops_at_first_failure() {
        let mut conf = Configuration::from_category(Category::with_params(
            "A",
            [
                Parameter::new("bad").with_svalue("nope"),
                Parameter::new("good").with_svalue("1").with_vtype(ParamType::Int),
            ],
        ));
        let options = ResolveOptions {
            besteffort: false,
            ..Default::default()
        };
        let err = conf.resolve(&ExprResolver, &options).unwrap_err();
        assert!(matches!(err, ConfError::Resolution(_)));
        // the pass stopped before `good`
        assert_eq!(conf.pvalue("good", None, 0).unwrap(), &Value::Null);
    }

    #[test]
    fn test_unify_partitions_parameters() {
        let mut conf = Configuration::from_categories([
            Category::with_params(
                "A",
                [
                    Parameter::new("a").with_value(1),
                    Parameter::new("e").with_svalue("missing"),
                ],
            ),
            Category::with_params("B", [Parameter::new("f").with_value(2).with_local(false)]),
            Category::with_params(":widget", [Parameter::new("size").with_value(3)]),
        ]);
        conf.resolve(&ExprResolver, &ResolveOptions::default()).unwrap();

        let unified = conf.unify();
        assert!(unified.values().contains("a"));
        assert!(unified.foreigns().contains("f"));
        assert!(unified.errors().contains("e"));
        assert!(!unified.values().contains("e"));
        assert!(!unified.values().contains("size"));
        assert_eq!(unified.view(ERRORS).map(Category::len), Some(1));
    }

    #[test]
    fn test_unify_later_category_overrides() {
        let conf = Configuration::from_categories([
            Category::with_params("A", [Parameter::new("x").with_value(1)]),
            Category::with_params("B", [Parameter::new("x").with_value(2).with_local(false)]),
        ]);
        let unified = conf.unify();
        assert!(!unified.values().contains("x"));
        assert_eq!(unified.foreigns().get("x").unwrap().value(), &json!(2));
    }

    #[test]
    fn test_unify_keeps_first_appearance_order() {
        let conf = Configuration::from_categories([
            Category::with_params(
                "A",
                [Parameter::new("x").with_value(1), Parameter::new("y").with_value(1)],
            ),
            Category::with_params(
                "B",
                [Parameter::new("z").with_value(2), Parameter::new("x").with_value(2)],
            ),
        ]);
        let unified = conf.unify();
        assert_eq!(unified.values().names().collect::<Vec<_>>(), vec!["x", "y", "z"]);
        assert_eq!(unified.values().get("x").unwrap().value(), &json!(2));
    }

    #[test]
    fn test_nested_strips_one_level() {
        let conf = Configuration::from_categories([
            Category::with_params("main", [Parameter::new("widget").with_value("button")]),
            Category::with_params(":widget", [Parameter::new("label").with_value("ok")]),
            Category::with_params(":widget:icon", [Parameter::new("size").with_value(16)]),
            Category::with_params(":other", [Parameter::new("z").with_value(0)]),
        ]);
        let nested = conf.nested("widget");
        let names: Vec<&str> = nested.iter().map(Category::name).collect();
        assert_eq!(names, vec!["widget", ":icon"]);
        assert!(conf.sub_conf("widget").is_some());
        assert!(conf.sub_conf("label").is_none());
    }

    #[test]
    fn test_sub_conf_names() {
        assert!(is_sub_conf_name(":widget"));
        assert!(!is_sub_conf_name(VALUES));
        assert!(!is_sub_conf_name("widget"));
        assert_eq!(sub_conf_name("widget"), ":widget");
    }
}
