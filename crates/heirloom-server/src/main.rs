//! Heirloom keeper.
//!
//! Watches every will in the stored ledger. Owners who go quiet are reminded
//! before their inactivity period runs out; once it has, the keeper triggers
//! the will so its nominees can claim, and it executes bridge releases that
//! validators have approved.
//!
//! ```bash
//! heirloom-server -c heirloom.toml                   # keep watch
//! heirloom-server -c heirloom.toml --once            # one pass, e.g. from cron
//! heirloom-server -c heirloom.toml --export out.json # back up the ledger
//! ```

mod config;
mod daemon;

use anyhow::{Context, Result};
use config::ServerConfig;
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = "/config/heirloom-server.toml";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Check wills every `check_interval_secs` until interrupted.
    Watch,
    Once,
    ShowConfig,
    Activity(usize),
    Export(PathBuf),
    Import(PathBuf),
    Help,
    Version,
}

#[derive(Debug, PartialEq, Eq)]
struct Invocation {
    config_path: PathBuf,
    command: Command,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Invocation> {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG);
    let mut command = Command::Watch;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let chosen = match arg.as_str() {
            "-c" | "--config" => {
                config_path = args
                    .next()
                    .map(PathBuf::from)
                    .context("--config needs a file path")?;
                continue;
            }
            "--once" | "--check" => Command::Once,
            "--validate" => Command::ShowConfig,
            "--activity" => {
                let count = args.next().context("--activity needs a record count")?;
                Command::Activity(
                    count
                        .parse()
                        .with_context(|| format!("--activity: '{}' is not a count", count))?,
                )
            }
            "--export" => Command::Export(
                args.next()
                    .map(PathBuf::from)
                    .context("--export needs a snapshot file path")?,
            ),
            "--import" => Command::Import(
                args.next()
                    .map(PathBuf::from)
                    .context("--import needs a snapshot file path")?,
            ),
            "-h" | "--help" => Command::Help,
            "-V" | "--version" => Command::Version,
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        };
        if command != Command::Watch {
            anyhow::bail!("{} cannot be combined with another command", arg);
        }
        command = chosen;
    }

    Ok(Invocation {
        config_path,
        command,
    })
}

fn main() -> Result<()> {
    let invocation = parse_args(std::env::args().skip(1))?;
    match invocation.command {
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::Version => {
            println!("heirloom-server {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let path = &invocation.config_path;
    let mut config = ServerConfig::from_file(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.apply_env_overrides();
    config.validate().context("Configuration validation failed")?;

    std::env::set_var("RUST_LOG", &config.server.log_level);
    env_logger::init();

    match invocation.command {
        Command::ShowConfig => {
            show_config(&config);
            Ok(())
        }
        Command::Activity(limit) => daemon::print_activity(&config, limit),
        Command::Export(file) => {
            let wills = daemon::export_snapshot(&config, &file)?;
            println!("Exported {} wills to {}", wills, file.display());
            Ok(())
        }
        Command::Import(file) => {
            let records = daemon::import_snapshot(&config, &file)?;
            println!(
                "Imported ledger from {} ({} activity records)",
                file.display(),
                records
            );
            Ok(())
        }
        Command::Once => {
            let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
            let report = rt.block_on(daemon::run_check_cycle(&config))?;
            log::info!(
                "Triggered: {:?}, awaiting oracle: {:?}, owners reminded: {}, releases executed: {}",
                report.triggered,
                report.awaiting_oracle,
                report.heartbeat_warnings,
                report.releases_executed
            );
            Ok(())
        }
        Command::Watch => {
            let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
            let outcome = rt.block_on(async {
                tokio::select! {
                    result = daemon::run(config) => result,
                    _ = tokio::signal::ctrl_c() => {
                        log::info!("Interrupted. Keeper stopped.");
                        Ok(())
                    }
                }
            });
            if let Err(e) = outcome {
                log::error!("Keeper failed: {:#}", e);
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Help | Command::Version => Ok(()),
    }
}

fn show_config(config: &ServerConfig) {
    let ledger = &config.ledger;
    println!("Configuration is valid.");
    println!("  Registry admin:    {}", ledger.admin);
    println!("  Keeper account:    {}", config.keeper.account);
    println!("  Custody account:   {}", ledger.custody_account);
    println!(
        "  Shortest will:     {} days of owner inactivity",
        ledger.min_inactivity_period_secs / 86_400
    );
    println!(
        "  Owner reminders:   at {:.0}% and {:.0}% of the inactivity period",
        config.keeper.reminder_at * 100.0,
        config.keeper.final_notice_at * 100.0
    );
    println!("  Oracle quorum:     {}", ledger.oracle_threshold);
    println!("  Bridge quorum:     {}", ledger.bridge_quorum);
    println!(
        "  Check interval:    {} secs",
        config.server.check_interval_secs
    );
    println!("  Database:          {}", config.db_path().display());
}

fn print_help() {
    println!(
        r#"heirloom-server: keeper for Heirloom inheritance wills

Reminds silent will owners, triggers wills whose owners stayed inactive for
the full period so nominees can claim, and executes approved bridge releases.

USAGE:
    heirloom-server [-c <PATH>] [COMMAND]

COMMANDS (default: keep watch until interrupted):
    --once, --check       Check every will once and exit
    --validate            Print the effective configuration and exit
    --activity <N>        Print the N newest ledger activity records
    --export <FILE>       Write the stored ledger to a JSON snapshot
    --import <FILE>       Seed an empty data directory from a JSON snapshot
    -h, --help            Show this help
    -V, --version         Show version

OPTIONS:
    -c, --config <PATH>   Config file (default: {default_config})

ENVIRONMENT (overrides the config file):
    HEIRLOOM_DATA_DIR         Directory holding heirloom.db
    HEIRLOOM_CHECK_INTERVAL   Seconds between passes over the wills
    HEIRLOOM_LOG_LEVEL        error, warn, info, debug or trace
    HEIRLOOM_ADMIN            Registry administrator account
    HEIRLOOM_KEEPER           Account the keeper triggers wills as
    HEIRLOOM_BRIDGE_QUORUM    Validator approvals per bridge release
"#,
        default_config = DEFAULT_CONFIG
    );
}
