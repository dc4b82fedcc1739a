//! CLI command definitions for cfgweave
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;

use crate::driver::EXPRESSION_MARKER;
use crate::format::OutputFormat;
use crate::model::{Category, Configuration, Parameter};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormatArg {
    #[default]
    Json,
    Yaml,
    Markdown,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Yaml => OutputFormat::Yaml,
            FormatArg::Markdown => OutputFormat::Markdown,
        }
    }
}

/// Category receiving `--set` overrides without an explicit category.
pub const OVERRIDE_CATEGORY: &str = "cli";

/// Layered configuration inspector
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command that loads sources.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Configuration files, merged in order (later files win)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Override a parameter: [category.]name=value (value parsed as JSON, '=' prefix for an expression)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Allow expressions to read environment variables
    #[arg(long = "unsafe")]
    pub allow_env: bool,

    /// Abort on the first resolution failure
    #[arg(long)]
    pub strict: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve sources and print the unified values
    Show {
        #[command(flatten)]
        sources: SourceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = FormatArg::Json)]
        format: FormatArg,
    },

    /// Print one resolved parameter
    Get {
        /// Parameter name
        name: String,

        #[command(flatten)]
        sources: SourceArgs,

        /// Read the definition from this category
        #[arg(short, long)]
        category: Option<String>,

        /// Step back this many definitions
        #[arg(long, default_value_t = 0)]
        history: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = FormatArg::Json)]
        format: FormatArg,
    },

    /// Resolve sources and report failing parameters (non-zero exit on failure)
    Check {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

/// Parse `--set` arguments into one configuration.
pub fn parse_overrides(overrides: &[String]) -> Result<Configuration, String> {
    let mut conf = Configuration::new();
    for raw in overrides {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
        let (category, name) = match key.rsplit_once('.') {
            Some((category, name)) => (category.trim(), name.trim()),
            None => (OVERRIDE_CATEGORY, key.trim()),
        };
        if name.is_empty() || category.is_empty() {
            return Err(format!("empty name in '{}'", raw));
        }

        let param = match value.strip_prefix(EXPRESSION_MARKER) {
            Some(expr) => Parameter::new(name).with_svalue(expr.trim()),
            None => Parameter::new(name).with_value(
                serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string())),
            ),
        };

        if !conf.contains(category) {
            conf.add_category(Category::new(category));
        }
        if let Some(target) = conf.category_mut(category) {
            target.add(param);
        }
    }
    Ok(conf)
}
