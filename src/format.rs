//! Output formatting for unified configurations: JSON, YAML and markdown.

use serde_json::{Map, Value, json};

use crate::model::{Category, Parameter, Unified, render};

/// Output format for rendered configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Markdown,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "yaml" | "yml" => Some(OutputFormat::Yaml),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

fn values_object(category: &Category) -> Value {
    let map: Map<String, Value> = category
        .iter()
        .map(|p| (p.name().to_string(), p.value().clone()))
        .collect();
    Value::Object(map)
}

/// The three views as one JSON document; errors map to their messages.
pub fn unified_to_json(unified: &Unified) -> Value {
    let errors: Map<String, Value> = unified
        .errors()
        .iter()
        .map(|p| {
            let message = p.error().map(|e| e.failure.to_string()).unwrap_or_default();
            (p.name().to_string(), Value::String(message))
        })
        .collect();
    json!({
        "values": values_object(unified.values()),
        "foreigns": values_object(unified.foreigns()),
        "errors": errors,
    })
}

/// Format a unified configuration.
pub fn format_unified(unified: &Unified, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&unified_to_json(unified))?,
        OutputFormat::Yaml => serde_yaml::to_string(&unified_to_json(unified))?,
        OutputFormat::Markdown => unified_markdown(unified),
    })
}

/// Format a unified configuration as markdown.
pub fn unified_markdown(unified: &Unified) -> String {
    let mut md = String::new();
    let total = unified.values().len() + unified.foreigns().len() + unified.errors().len();
    md.push_str(&format!("# Configuration ({})\n\n", total));

    for (title, view) in [("Values", unified.values()), ("Foreign values", unified.foreigns())] {
        if view.is_empty() {
            continue;
        }
        md.push_str(&format!("## {}\n\n", title));
        for param in view {
            md.push_str(&format_parameter_short(param));
        }
        md.push('\n');
    }

    if !unified.errors().is_empty() {
        md.push_str("## Errors\n\n");
        for param in unified.errors() {
            let message = param.error().map(|e| e.failure.to_string()).unwrap_or_default();
            md.push_str(&format!("- **{}**: {}\n", param.name(), message));
        }
        md.push('\n');
    }

    md
}

fn format_parameter_short(param: &Parameter) -> String {
    let vtype = param
        .vtype()
        .map(|t| format!(" _{}_", t))
        .unwrap_or_default();
    let source = param
        .svalue()
        .map(|s| format!(" (from `{}`)", s))
        .unwrap_or_default();
    format!("- **{}**{}: `{}`{}\n", param.name(), vtype, render(param.value()), source)
}

/// Format one parameter with its details.
pub fn format_parameter(param: &Parameter, format: OutputFormat) -> anyhow::Result<String> {
    let doc = json!({
        "name": param.name(),
        "value": param.value(),
        "svalue": param.svalue(),
        "vtype": param.vtype().map(|t| t.as_str()),
        "local": param.is_local(),
        "error": param.error().map(|e| e.failure.to_string()),
    });
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&doc)?,
        OutputFormat::Yaml => serde_yaml::to_string(&doc)?,
        OutputFormat::Markdown => {
            let mut md = format!("## {}\n", param.name());
            md.push_str(&format!("- **value**: `{}`\n", render(param.value())));
            if let Some(svalue) = param.svalue() {
                md.push_str(&format!("- **svalue**: `{}`\n", svalue));
            }
            if let Some(vtype) = param.vtype() {
                md.push_str(&format!("- **vtype**: {}\n", vtype));
            }
            md.push_str(&format!("- **local**: {}\n", param.is_local()));
            if let Some(err) = param.error() {
                md.push_str(&format!("- **error**: {}\n", err.failure));
            }
            md
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Configuration, ParamType};
    use crate::resolver::{ExprResolver, ResolveOptions};

    fn sample() -> Unified {
        let mut conf = Configuration::from_category(Category::with_params(
            "app",
            [
                Parameter::new("port").with_value("80").with_vtype(ParamType::Int),
                Parameter::new("mirror").with_value("x").with_local(false),
                Parameter::new("broken").with_svalue("nope"),
            ],
        ));
        conf.resolve(&ExprResolver, &ResolveOptions::default()).unwrap();
        conf.unify()
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from_str("YML"), Some(OutputFormat::Yaml));
        assert_eq!(OutputFormat::from_str("md"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::from_str("xml"), None);
    }

    #[test]
    fn test_json_document() {
        let doc = unified_to_json(&sample());
        assert_eq!(doc["values"]["port"], json!(80));
        assert_eq!(doc["foreigns"]["mirror"], json!("x"));
        assert!(doc["errors"]["broken"].as_str().unwrap().contains("nope"));
    }

    #[test]
    fn test_markdown_sections() {
        let md = format_unified(&sample(), OutputFormat::Markdown).unwrap();
        assert!(md.starts_with("# Configuration (3)"));
        assert!(md.contains("## Values\n\n- **port** _int_: `80`"));
        assert!(md.contains("## Foreign values"));
        assert!(md.contains("- **broken**: expression failed"));
    }

    #[test]
    fn test_format_parameter_yaml() {
        let unified = sample();
        let port = unified.values().get("port").unwrap();
        let yaml = format_parameter(port, OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("name: port"));
        assert!(yaml.contains("vtype: int"));
    }
}
