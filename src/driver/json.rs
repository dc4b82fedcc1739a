//! JSON source driver.

use serde_json::Value;

use super::{ConfDriver, ParseError, document_to_conf};
use crate::model::Configuration;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDriver;

impl ConfDriver for JsonDriver {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn parse(&self, content: &str, hints: &Configuration) -> Result<Configuration, ParseError> {
        let document: Value = serde_json::from_str(content)?;
        document_to_conf(document, hints)
    }
}
