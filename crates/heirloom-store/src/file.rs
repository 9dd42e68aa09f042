//! JSON snapshot file.

use crate::StoreError;
use heirloom_engine::LedgerSnapshot;
use std::fs;
use std::path::Path;

/// Load a snapshot, or `None` if the file does not exist yet.
pub fn load_snapshot(path: &Path) -> Result<Option<LedgerSnapshot>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    let snapshot: LedgerSnapshot = serde_json::from_str(&contents)?;
    Ok(Some(snapshot))
}

/// Write a snapshot. The file is replaced atomically.
pub fn save_snapshot(path: &Path, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    log::debug!("Snapshot written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use heirloom_core::{Address, ManualClock};
    use heirloom_engine::{Ledger, LedgerConfig};
    use std::sync::Arc;
    use tempfile::tempdir;

    const ADMIN: Address = Address::from_low_u8(0xAD);
    const OWNER: Address = Address::from_low_u8(0x0A);

    fn config() -> LedgerConfig {
        LedgerConfig {
            admin: ADMIN,
            ..LedgerConfig::default()
        }
    }

    #[test]
    fn test_missing_file_loads_as_none() {
        let dir = tempdir().unwrap();
        assert!(load_snapshot(&dir.path().join("ledger.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_snapshot_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.json");
        let clock = Arc::new(ManualClock::new(1_700_000_000));

        let mut ledger = Ledger::new(config(), clock.clone()).unwrap();
        let id = ledger
            .create_will(OWNER, "Family", 31_536_000, true)
            .unwrap();
        save_snapshot(&path, &ledger.snapshot()).unwrap();

        let loaded = load_snapshot(&path).unwrap().unwrap();
        let restored = Ledger::from_snapshot(loaded, &config(), clock).unwrap();
        assert_eq!(restored.will(id).unwrap().name, "Family");
        assert!(restored.will(id).unwrap().requires_oracle);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_snapshot(&path), Err(StoreError::Json(_))));
    }
}
