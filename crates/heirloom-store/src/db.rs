//! SQLite persistence layer.
//!
//! A key-value `meta` table for singleton values, a `snapshot` table holding
//! the latest serialized ledger, and an append-only `activity` journal.

use crate::StoreError;
use heirloom_core::{Address, WillId};
use heirloom_engine::{ActivityRecord, Ledger, LedgerSnapshot};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;

const SCHEMA_VERSION: &str = "2";

/// Open (or create) the database at `path` and run migrations.
pub fn open_db(path: &Path) -> SqlResult<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS snapshot (
            id       INTEGER PRIMARY KEY CHECK (id = 1),
            version  INTEGER NOT NULL,
            saved_at INTEGER NOT NULL,
            body     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS activity (
            seq           INTEGER PRIMARY KEY,
            timestamp     INTEGER NOT NULL,
            activity_type TEXT NOT NULL,
            will_id       INTEGER,
            summary       TEXT NOT NULL,
            event         TEXT NOT NULL
        );
        ",
    )?;

    migrate_v2(&conn)?;
    meta_set(&conn, "schema_version", SCHEMA_VERSION)?;

    Ok(conn)
}

/// v2: account column on activity plus lookup indexes.
fn migrate_v2(conn: &Connection) -> SqlResult<()> {
    let has_account = conn.prepare("SELECT account FROM activity LIMIT 0").is_ok();
    if !has_account {
        conn.execute_batch("ALTER TABLE activity ADD COLUMN account TEXT;")?;
    }
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_activity_will ON activity (will_id, seq);
         CREATE INDEX IF NOT EXISTS idx_activity_account ON activity (account, seq);",
    )?;
    Ok(())
}

// ============================================================================
// Meta (key-value)
// ============================================================================

pub fn meta_get(conn: &Connection, key: &str) -> SqlResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn meta_set(conn: &Connection, key: &str, value: &str) -> SqlResult<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

// ============================================================================
// Snapshot
// ============================================================================

/// Replace the stored snapshot.
pub fn snapshot_save(conn: &Connection, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
    let body = serde_json::to_string(snapshot)?;
    conn.execute(
        "INSERT INTO snapshot (id, version, saved_at, body) VALUES (1, ?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
            version = excluded.version,
            saved_at = excluded.saved_at,
            body = excluded.body",
        params![snapshot.version, snapshot.saved_at as i64, body],
    )?;
    Ok(())
}

pub fn snapshot_load(conn: &Connection) -> Result<Option<LedgerSnapshot>, StoreError> {
    let body: Option<String> = conn
        .query_row("SELECT body FROM snapshot WHERE id = 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

// ============================================================================
// Activity journal
// ============================================================================

/// Append records. Already-stored sequence numbers are skipped.
///
/// Returns the number of rows inserted.
pub fn activity_append(conn: &Connection, records: &[&ActivityRecord]) -> Result<usize, StoreError> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO activity
            (seq, timestamp, activity_type, will_id, account, summary, event)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let mut inserted = 0;
    for record in records {
        let event = serde_json::to_string(&record.event)?;
        inserted += stmt.execute(params![
            record.seq as i64,
            record.timestamp as i64,
            record.activity_type.as_str(),
            record.will_id.map(|id| id as i64),
            record.account.map(|a| a.to_string()),
            record.summary,
            event,
        ])?;
    }
    Ok(inserted)
}

/// Highest stored sequence number.
pub fn activity_last_seq(conn: &Connection) -> SqlResult<Option<u64>> {
    let seq: Option<i64> = conn.query_row("SELECT MAX(seq) FROM activity", [], |row| row.get(0))?;
    Ok(seq.map(|s| s as u64))
}

/// Newest first.
pub fn activity_recent(conn: &Connection, limit: usize) -> Result<Vec<ActivityRecord>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT seq, timestamp, will_id, account, summary, event
         FROM activity ORDER BY seq DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], read_row)?;
    collect_records(rows)
}

/// Newest first, for one will.
pub fn activity_for_will(
    conn: &Connection,
    will_id: WillId,
    limit: usize,
) -> Result<Vec<ActivityRecord>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT seq, timestamp, will_id, account, summary, event
         FROM activity WHERE will_id = ?1 ORDER BY seq DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![will_id as i64, limit as i64], read_row)?;
    collect_records(rows)
}

type RawRow = (i64, i64, Option<i64>, Option<String>, String, String);

fn read_row(row: &Row<'_>) -> SqlResult<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn collect_records(
    rows: impl Iterator<Item = SqlResult<RawRow>>,
) -> Result<Vec<ActivityRecord>, StoreError> {
    let mut records = Vec::new();
    for row in rows {
        let (seq, timestamp, will_id, account, summary, event) = row?;
        let event: heirloom_core::LedgerEvent = serde_json::from_str(&event)?;
        let account = account
            .map(|a| a.parse::<Address>())
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("activity #{}: {}", seq, e)))?;
        records.push(ActivityRecord {
            seq: seq as u64,
            timestamp: timestamp as u64,
            activity_type: event.activity_type(),
            will_id: will_id.map(|id| id as u64),
            account,
            summary,
            event,
        });
    }
    Ok(records)
}

// ============================================================================
// Ledger
// ============================================================================

/// Save the ledger snapshot and any journal records not stored yet, in one
/// transaction. Returns the number of new activity rows.
pub fn persist(conn: &mut Connection, ledger: &Ledger) -> Result<usize, StoreError> {
    let tx = conn.transaction()?;
    let from = activity_last_seq(&tx)?.map_or(0, |s| s + 1);
    let pending = ledger.activity_since(from);
    let inserted = activity_append(&tx, &pending)?;
    snapshot_save(&tx, &ledger.snapshot())?;
    meta_set(&tx, "last_persisted_at", &ledger.now().to_string())?;
    tx.commit()?;
    if inserted > 0 {
        log::debug!("Persisted ledger with {} new activity records", inserted);
    }
    Ok(inserted)
}
