//! YAML source driver.

use serde_json::Value;

use super::{ConfDriver, ParseError, document_to_conf};
use crate::model::Configuration;

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlDriver;

impl ConfDriver for YamlDriver {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["yaml", "yml"]
    }

    fn parse(&self, content: &str, hints: &Configuration) -> Result<Configuration, ParseError> {
        // Parse straight into JSON values so every driver feeds the same shape
        let document: Value = serde_yaml::from_str(content)?;
        document_to_conf(document, hints)
    }
}
