//! CLI argument parsing and the propagation run.

pub mod args;

use anyhow::{anyhow, Context, Result};
use args::Cli;
use clap::Parser;
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use waitdns::{ExhaustedAuthority, Name, PropagationWaiter, WaitConfig, WaitDnsError};

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = load_config(&cli)?;
    debug!(?config, "effective configuration");

    let mut name = Name::from_utf8(&cli.name)
        .with_context(|| format!("invalid name {:?}", cli.name))?;
    name.set_fqdn(true);

    let policy = config.to_policy();
    let waiter = PropagationWaiter::from_config(&config)?;

    match waiter
        .wait_for_propagation(&name, cli.record_type, &cli.expected, &policy)
        .await
    {
        Ok(report) => {
            println!(
                "{} {} {} is served by all {} authoritative servers",
                "OK".green().bold(),
                name.to_string().cyan(),
                cli.record_type,
                report.authorities.len()
            );
            for authority in &report.authorities {
                println!(
                    "  {}  {}",
                    authority.address.to_string().yellow(),
                    authority.hostname
                );
            }
            println!(
                "  {} checks, {:?} spent waiting",
                report.checks, report.slept
            );
            Ok(())
        }
        Err(WaitDnsError::PropagationExhausted { failed }) => {
            eprintln!(
                "{} {} {} has not reached every authoritative server",
                "FAILED".red().bold(),
                name.to_string().cyan(),
                cli.record_type
            );
            for authority in &failed {
                eprintln!("  {}", authority.to_string().red());
            }
            Err(failure_summary(&failed))
        }
        Err(e) => Err(e.into()),
    }
}

/// Settings from the named config file (if any) with command-line overrides.
///
/// A config file given with `--config` or `WAITDNS_CONFIG` must exist.
fn load_config(cli: &Cli) -> Result<WaitConfig> {
    let mut config = match &cli.config {
        Some(path) => WaitConfig::read(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => WaitConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Exit error after the failing servers were already listed.
fn failure_summary(failed: &[ExhaustedAuthority]) -> anyhow::Error {
    match failed.len() {
        1 => anyhow!("1 authoritative server never served the expected value"),
        n => anyhow!("{n} authoritative servers never served the expected value"),
    }
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
