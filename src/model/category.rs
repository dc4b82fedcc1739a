//! Ordered, name-keyed group of parameters.

use std::collections::HashMap;
use std::ops::AddAssign;

use super::param::Parameter;

/// Named group of parameters; the unit of merging and overriding.
///
/// Insertion order is preserved and names are unique: adding a parameter whose
/// name is already present replaces it in place.
#[derive(Debug, Clone, Default)]
pub struct Category {
    name: String,
    params: Vec<Parameter>,
    index: HashMap<String, usize>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a category from a parameter list, later duplicates winning.
    pub fn with_params(name: impl Into<String>, params: impl IntoIterator<Item = Parameter>) -> Self {
        let mut category = Self::new(name);
        for param in params {
            category.add(param);
        }
        category
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Insert or override by name. Returns the replaced parameter, if any.
    pub fn add(&mut self, param: Parameter) -> Option<Parameter> {
        match self.index.get(param.name()) {
            Some(&pos) => Some(std::mem::replace(&mut self.params[pos], param)),
            None => {
                self.index.insert(param.name().to_string(), self.params.len());
                self.params.push(param);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&pos| &self.params[pos])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.index.get(name).map(|&pos| &mut self.params[pos])
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn get_index(&self, pos: usize) -> Option<&Parameter> {
        self.params.get(pos)
    }

    pub(crate) fn get_index_mut(&mut self, pos: usize) -> Option<&mut Parameter> {
        self.params.get_mut(pos)
    }

    /// Parameters matching `name`: zero or one, since names are unique.
    pub fn getparams(&self, name: &str) -> Vec<&Parameter> {
        self.get(name).into_iter().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        let pos = self.index.remove(name)?;
        let removed = self.params.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.params.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(Parameter::name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl AddAssign<Parameter> for Category {
    fn add_assign(&mut self, param: Parameter) {
        self.add(param);
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.params == other.params
    }
}

impl<'a> IntoIterator for &'a Category {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_preserves_order() {
        let category = Category::with_params(
            "A",
            [Parameter::new("b"), Parameter::new("a"), Parameter::new("c")],
        );
        let names: Vec<&str> = category.names().collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_add_same_name_overrides_in_place() {
        let mut category = Category::new("A");
        category += Parameter::new("x").with_value(1);
        category += Parameter::new("y").with_value(2);
        let replaced = category.add(Parameter::new("x").with_value(3));

        assert_eq!(replaced.map(|p| p.value().clone()), Some(json!(1)));
        assert_eq!(category.len(), 2);
        assert_eq!(category.get("x").unwrap().value(), &json!(3));
        assert_eq!(category.names().next(), Some("x"));
    }

    #[test]
    fn test_contains_is_name_based() {
        let category = Category::with_params("A", [Parameter::new("x").with_value(1)]);
        assert!(category.contains("x"));
        assert!(!category.contains("y"));
        assert_eq!(category.getparams("x").len(), 1);
        assert!(category.getparams("y").is_empty());
    }

    #[test]
    fn test_remove_reindexes() {
        let mut category = Category::with_params(
            "A",
            [Parameter::new("a"), Parameter::new("b"), Parameter::new("c")],
        );
        assert!(category.remove("a").is_some());
        assert!(category.remove("a").is_none());
        assert_eq!(category.get("c").map(Parameter::name), Some("c"));
        category.add(Parameter::new("b").with_value(true));
        assert_eq!(category.len(), 2);
        assert_eq!(category.get("b").unwrap().value(), &json!(true));
    }
}
