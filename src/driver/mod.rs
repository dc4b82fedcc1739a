//! Source drivers: turn files into [`Configuration`] values.
//!
//! A driver claims files by extension. For a path it does not claim, or a
//! file that does not exist, [`ConfDriver::get_conf`] answers `Ok(None)`;
//! only a claimed file that cannot be read or parsed is an error.
//!
//! Every driver shares one document shape, category to parameter to value:
//!
//! ```yaml
//! server:
//!   host: localhost
//!   port: "=base_port + 1"   # leading '=' marks an expression
//! ```

mod document;
mod ini;
mod json;
mod yaml;

pub use document::{EXPRESSION_MARKER, document_to_conf};
pub use ini::IniDriver;
pub use json::JsonDriver;
pub use yaml::YamlDriver;

use std::path::Path;
use thiserror::Error;

use crate::error::{ConfError, ConfResult};
use crate::model::Configuration;

/// Malformed source content.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("{0}")]
    Syntax(String),

    #[error("line {line}: {message}")]
    Line { line: usize, message: String },

    #[error("expected {expected} at '{at}'")]
    Shape { expected: &'static str, at: String },
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Syntax(err.to_string())
    }
}

impl From<serde_yaml::Error> for ParseError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Syntax(err.to_string())
    }
}

/// Reads one source format.
pub trait ConfDriver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower-case file extensions this driver claims.
    fn extensions(&self) -> &'static [&'static str];

    /// Parse source text. `hints` supplies declared types for known parameters.
    fn parse(&self, content: &str, hints: &Configuration) -> Result<Configuration, ParseError>;

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions()
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }

    /// Configuration read from `path`, or `None` when the driver does not
    /// apply to it.
    fn get_conf(&self, path: &Path, hints: &Configuration) -> ConfResult<Option<Configuration>> {
        if !self.accepts(path) || !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(&content, hints)
            .map(Some)
            .map_err(|err| ConfError::driver(self.name(), path, err))
    }
}

/// JSON, YAML and INI drivers, in that order.
pub fn default_drivers() -> Vec<Box<dyn ConfDriver>> {
    vec![
        Box::new(JsonDriver) as Box<dyn ConfDriver>,
        Box::new(YamlDriver),
        Box::new(IniDriver),
    ]
}
