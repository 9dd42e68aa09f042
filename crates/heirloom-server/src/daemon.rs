//! The keeper loop: periodically loads the ledger, reminds silent owners,
//! triggers wills whose conditions are met and executes bridge releases that
//! reached quorum.
//!
//! Also moves the stored ledger in and out of JSON snapshot files, for
//! backups and for seeding a new data directory.

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use heirloom_bridge::ReleaseOutcome;
use heirloom_core::{Clock, SystemClock, WillId};
use heirloom_engine::{Ledger, LedgerError, OwnerStanding, WillError};
use heirloom_store as store;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// What one check cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Wills whose owners should send a heartbeat soon
    pub heartbeat_warnings: usize,
    pub triggered: Vec<WillId>,
    /// Overdue wills still waiting for oracle attestations
    pub awaiting_oracle: Vec<WillId>,
    pub releases_executed: usize,
    /// Activity records written to the database
    pub persisted: usize,
}

/// Run the daemon loop. Blocks forever (until shutdown signal).
pub async fn run(config: ServerConfig) -> Result<()> {
    log::info!("Heirloom keeper starting…");
    log::info!("  Keeper:     {}", config.keeper.account);
    log::info!(
        "  Interval:   {} seconds ({:.1} hours)",
        config.server.check_interval_secs,
        config.server.check_interval_secs as f64 / 3600.0
    );
    log::info!("  Database:   {}", config.db_path().display());

    let interval = Duration::from_secs(config.server.check_interval_secs);

    // Run first check immediately, then loop
    let mut first = true;
    loop {
        if !first {
            log::info!(
                "Sleeping {} seconds until next check…",
                config.server.check_interval_secs
            );
            tokio::time::sleep(interval).await;
        }
        first = false;

        match run_check_cycle(&config).await {
            Ok(report) => log::info!(
                "Check cycle completed: {} triggered, {} releases executed, {} warnings.",
                report.triggered.len(),
                report.releases_executed,
                report.heartbeat_warnings
            ),
            Err(e) => log::error!("Check cycle failed: {:#}", e),
        }
    }
}

/// Execute a single check cycle against the persisted ledger.
pub async fn run_check_cycle(config: &ServerConfig) -> Result<CycleReport> {
    log::info!("Starting check cycle…");

    let mut conn = open_store(config)?;
    let mut ledger = load_ledger(&conn, config, Arc::new(SystemClock))?;

    let mut report = check_ledger(&mut ledger, config);

    report.persisted = store::persist(&mut conn, &ledger).context("Failed to persist ledger")?;
    Ok(report)
}

fn open_store(config: &ServerConfig) -> Result<Connection> {
    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data dir: {}",
            config.server.data_dir.display()
        )
    })?;
    let path = config.db_path();
    store::open_db(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Restore the stored ledger, or start an empty one from the config.
pub fn load_ledger(
    conn: &Connection,
    config: &ServerConfig,
    clock: Arc<dyn Clock>,
) -> Result<Ledger> {
    let ledger_config = config.to_ledger_config();
    match store::snapshot_load(conn).context("Failed to read ledger snapshot")? {
        Some(snapshot) => {
            log::debug!(
                "Loaded ledger snapshot saved at {}",
                format_timestamp(snapshot.saved_at)
            );
            Ok(Ledger::from_snapshot(snapshot, &ledger_config, clock)?)
        }
        None => {
            log::info!("No stored ledger found. Starting a new one.");
            Ok(Ledger::new(ledger_config, clock)?)
        }
    }
}

/// The cycle body. Failures on one will or release are logged and skipped.
pub fn check_ledger(ledger: &mut Ledger, config: &ServerConfig) -> CycleReport {
    let mut report = CycleReport::default();
    let keeper = config.keeper.account;
    let now = ledger.now();

    for status in ledger.heartbeat_statuses() {
        if !status.standing.needs_notice() {
            continue;
        }
        let trigger_at = format_timestamp(now.saturating_add(status.secs_until_trigger));
        if status.standing == OwnerStanding::FinalNotice {
            log::warn!(
                "Will #{}: owner {} silent for {} days, nominees inherit from {}",
                status.will_id,
                status.owner,
                status.silent_secs / 86_400,
                trigger_at
            );
        } else {
            log::info!(
                "Will #{}: owner {} should send a heartbeat before {}",
                status.will_id,
                status.owner,
                trigger_at
            );
        }
        report.heartbeat_warnings += 1;
    }

    for will_id in ledger.due_wills() {
        match ledger.evaluate_trigger(will_id, keeper) {
            Ok(record) => {
                log::warn!(
                    "Will #{} triggered ({:?}) after {} days of inactivity",
                    will_id,
                    record.cause,
                    record.elapsed_secs / 86_400
                );
                report.triggered.push(will_id);
            }
            Err(LedgerError::Will(WillError::TriggerConditionNotMet {
                attestations,
                threshold,
                ..
            })) => {
                log::info!(
                    "Will #{} is overdue, waiting for oracle ({}/{} attestations)",
                    will_id,
                    attestations,
                    threshold
                );
                report.awaiting_oracle.push(will_id);
            }
            Err(e) => log::warn!("Cannot trigger will #{}: {}", will_id, e),
        }
    }

    if config.keeper.execute_releases {
        let ready: Vec<_> = ledger
            .ready_releases()
            .into_iter()
            .map(|r| (r.will_id, r.token, r.chain_id, r.nominee))
            .collect();
        for (will_id, token, chain_id, nominee) in ready {
            match ledger.execute_release(will_id, token, chain_id, nominee) {
                Ok(ReleaseOutcome::Executed { amount }) => {
                    log::info!(
                        "Released {} of {} on chain {} to {} (will #{})",
                        amount,
                        token,
                        chain_id,
                        nominee,
                        will_id
                    );
                    report.releases_executed += 1;
                }
                Ok(ReleaseOutcome::AlreadyExecuted) => {}
                Err(e) => log::warn!(
                    "Release for {} on chain {} (will #{}) failed: {}",
                    nominee,
                    chain_id,
                    will_id,
                    e
                ),
            }
        }
    }

    report
}

/// Copy the stored ledger into a JSON snapshot file. Returns the number of
/// wills written.
pub fn export_snapshot(config: &ServerConfig, path: &Path) -> Result<usize> {
    let conn = open_store(config)?;
    let snapshot = store::snapshot_load(&conn)
        .context("Failed to read ledger snapshot")?
        .with_context(|| format!("No ledger stored in {}", config.db_path().display()))?;
    store::save_snapshot(path, &snapshot)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    let wills = snapshot.engine.wills().count();
    log::info!(
        "Exported {} wills (saved {}) to {}",
        wills,
        format_timestamp(snapshot.saved_at),
        path.display()
    );
    Ok(wills)
}

/// Seed an empty database from a JSON snapshot file. Returns the number of
/// activity records stored alongside it.
///
/// Never overwrites a stored ledger: wills in it would silently lose their
/// history.
pub fn import_snapshot(config: &ServerConfig, path: &Path) -> Result<usize> {
    let mut conn = open_store(config)?;
    if store::snapshot_load(&conn)
        .context("Failed to read ledger snapshot")?
        .is_some()
    {
        anyhow::bail!(
            "{} already holds a ledger; import only into an empty data directory",
            config.db_path().display()
        );
    }

    let snapshot = store::load_snapshot(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .with_context(|| format!("Snapshot file not found: {}", path.display()))?;
    let ledger = Ledger::from_snapshot(snapshot, &config.to_ledger_config(), Arc::new(SystemClock))
        .with_context(|| format!("Cannot restore ledger from {}", path.display()))?;

    let stored = store::persist(&mut conn, &ledger).context("Failed to persist imported ledger")?;
    log::info!(
        "Imported {} wills and {} activity records from {}",
        ledger.wills().count(),
        stored,
        path.display()
    );
    Ok(stored)
}

/// Print the newest `limit` stored activity records.
pub fn print_activity(config: &ServerConfig, limit: usize) -> Result<()> {
    let conn = open_store(config)?;
    let records = store::activity_recent(&conn, limit).context("Failed to read activity")?;
    if records.is_empty() {
        println!("No activity recorded.");
        return Ok(());
    }
    for record in records {
        let will = record
            .will_id
            .map(|id| format!("#{}", id))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>6}  {}  {:<20} {:<6} {}",
            record.seq,
            format_timestamp(record.timestamp),
            record.activity_type.as_str(),
            will,
            record.summary
        );
    }
    Ok(())
}

fn format_timestamp(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
