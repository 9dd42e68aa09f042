//! Heirloom persistence
//!
//! Two interchangeable ways to keep a ledger across restarts:
//!
//! - [`file`]: a single pretty-printed JSON snapshot.
//! - [`db`]: SQLite, holding the latest snapshot plus an append-only
//!   activity journal that outlives the in-memory journal window.

pub mod db;
pub mod file;

pub use db::{
    activity_append, activity_for_will, activity_last_seq, activity_recent, meta_get, meta_set,
    open_db, persist, snapshot_load, snapshot_save,
};
pub use file::{load_snapshot, save_snapshot};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}
