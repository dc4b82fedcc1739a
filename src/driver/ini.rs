//! INI source driver.
//!
//! Sections are categories and `key = value` (or `key: value`) lines are
//! parameters. Lines starting with `;` or `#` are comments. Values stay
//! strings; declared types from the hints convert them at resolution.

use regex_lite::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::document::parameter;
use super::{ConfDriver, ParseError};
use crate::model::{Category, Configuration};

const SECTION: &str = r"^\[\s*([^\]]+?)\s*\]$";
const ENTRY: &str = r"^([^=:]+?)\s*[=:]\s*(.*)$";

static SECTION_RE: OnceLock<Result<Regex, String>> = OnceLock::new();
static ENTRY_RE: OnceLock<Result<Regex, String>> = OnceLock::new();

/// Compile `pattern` on first use and keep it for later parses.
fn compiled(
    cell: &'static OnceLock<Result<Regex, String>>,
    pattern: &str,
) -> Result<&'static Regex, ParseError> {
    cell.get_or_init(|| Regex::new(pattern).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| ParseError::Syntax(e.clone()))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IniDriver;

impl ConfDriver for IniDriver {
    fn name(&self) -> &'static str {
        "ini"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ini", "cfg", "conf"]
    }

    fn parse(&self, content: &str, hints: &Configuration) -> Result<Configuration, ParseError> {
        let section_re = compiled(&SECTION_RE, SECTION)?;
        let entry_re = compiled(&ENTRY_RE, ENTRY)?;

        let mut conf = Configuration::new();
        let mut current: Option<String> = None;

        for (number, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(caps) = section_re.captures(line) {
                let name = caps[1].to_string();
                if !conf.contains(&name) {
                    conf.add_category(Category::new(name.as_str()));
                }
                current = Some(name);
                continue;
            }

            let Some(caps) = entry_re.captures(line) else {
                return Err(ParseError::Line {
                    line: number + 1,
                    message: format!("expected '[section]' or 'key = value', got '{}'", line),
                });
            };
            let Some(section) = current.as_deref() else {
                return Err(ParseError::Line {
                    line: number + 1,
                    message: "entry outside of a section".to_string(),
                });
            };

            let param = parameter(
                section,
                caps[1].to_string(),
                Value::String(caps[2].to_string()),
                hints,
            );
            if let Some(category) = conf.category_mut(section) {
                category.add(param);
            }
        }

        Ok(conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParamType, Parameter};
    use serde_json::json;

    #[test]
    fn test_sections_and_entries() {
        let ini = "\
; leading comment
[server]
host = example.org
port: 8080
limit = =port * 2

# another comment
[client]
retries = 3
[server]
host = override.org
";
        let hints = Configuration::from_category(Category::with_params(
            "server",
            [Parameter::new("port").with_vtype(ParamType::Int)],
        ));
        let conf = IniDriver.parse(ini, &hints).unwrap();

        assert_eq!(conf.len(), 2);
        let server = conf.category("server").unwrap();
        assert_eq!(server.get("host").unwrap().value(), &json!("override.org"));
        assert_eq!(server.get("port").unwrap().value(), &json!("8080"));
        assert_eq!(server.get("port").unwrap().vtype(), Some(ParamType::Int));
        assert_eq!(server.get("limit").unwrap().svalue(), Some("port * 2"));
        assert_eq!(conf.pvalue("retries", Some("client"), 0).unwrap(), &json!("3"));
    }

    #[test]
    fn test_line_errors() {
        let err = IniDriver
            .parse("key = value\n", &Configuration::new())
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::Line {
                line: 1,
                message: "entry outside of a section".into()
            }
        );

        let err = IniDriver
            .parse("[a]\njust words\n", &Configuration::new())
            .unwrap_err();
        assert!(matches!(err, ParseError::Line { line: 2, .. }));
    }

    #[test]
    fn test_patterns_compiled_once() {
        let first = compiled(&SECTION_RE, SECTION).unwrap();
        let second = compiled(&SECTION_RE, SECTION).unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(compiled(&ENTRY_RE, ENTRY).unwrap().is_match("key = value"));
    }
}
