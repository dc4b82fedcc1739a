//! cfgweave CLI
//!
//! Loads layered configuration files, resolves their expressions and prints
//! or checks the result.

use anyhow::{Context, Result, bail};
use cfgweave::cli::{Cli, Command, SourceArgs, parse_overrides};
use cfgweave::configurable::{Configurable, ConfigurableOptions};
use cfgweave::format::{OutputFormat, format_parameter, format_unified};
use cfgweave::logging::init_logging;
use cfgweave::model::Configuration;
use clap::Parser;
use tracing::{debug, info};

/// Load, merge and resolve the sources named on the command line.
fn load(sources: &SourceArgs) -> Result<Configuration> {
    let options = ConfigurableOptions {
        safe: !sources.allow_env,
        besteffort: !sources.strict,
        inherited_conf: false,
        paths: sources.paths.clone(),
        ..Default::default()
    };
    let configurable = Configurable::with_options(options);

    let mut conf = configurable
        .get_conf(None, None)
        .context("Failed to load configuration sources")?;
    if !sources.overrides.is_empty() {
        let overrides = parse_overrides(&sources.overrides)
            .map_err(anyhow::Error::msg)
            .context("Invalid --set argument")?;
        debug!(count = sources.overrides.len(), "Applying command-line overrides");
        conf.update(&overrides);
    }

    configurable
        .resolve(&mut conf)
        .context("Failed to resolve configuration")?;
    Ok(conf)
}

fn run_show(sources: &SourceArgs, format: OutputFormat) -> Result<()> {
    let conf = load(sources)?;
    println!("{}", format_unified(&conf.unify(), format)?);
    Ok(())
}

fn run_get(
    name: &str,
    sources: &SourceArgs,
    category: Option<&str>,
    history: usize,
    format: OutputFormat,
) -> Result<()> {
    let conf = load(sources)?;
    let param = conf
        .param(name, category, history)
        .with_context(|| format!("Cannot read parameter '{}'", name))?;
    println!("{}", format_parameter(param, format)?);
    Ok(())
}

fn run_check(sources: &SourceArgs) -> Result<()> {
    let conf = load(sources)?;
    let mut failures = 0;
    for (category, param) in conf.params() {
        if let Some(err) = param.error() {
            failures += 1;
            println!("{}.{}: {}", category.name(), param.name(), err.failure);
        }
    }
    if failures > 0 {
        bail!("{} parameter(s) failed to resolve", failures);
    }
    info!("All parameters resolved");
    println!("ok");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log, cli.verbose)?;

    match &cli.command {
        Command::Show { sources, format } => run_show(sources, (*format).into()),
        Command::Get {
            name,
            sources,
            category,
            history,
            format,
        } => run_get(name, sources, category.as_deref(), *history, (*format).into()),
        Command::Check { sources } => run_check(sources),
    }
}
