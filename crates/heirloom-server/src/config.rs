//! Server configuration, parsed from a TOML file plus environment overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use heirloom_bridge::BridgeConfig;
use heirloom_core::Address;
use heirloom_engine::{EngineConfig, HeartbeatConfig, LedgerConfig, DEFAULT_CUSTODY};
use heirloom_kyc::KycConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// General server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Ledger parameters, used when no persisted ledger exists yet
    pub ledger: LedgerSection,

    /// Keeper identity and when silent owners are reminded
    pub keeper: KeeperSection,
}

/// General server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Data directory (SQLite DB)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Check interval in seconds (default: 1 hour)
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            check_interval_secs: default_check_interval(),
            log_level: default_log_level(),
        }
    }
}

/// Ledger parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSection {
    /// Administrator of every registry
    pub admin: Address,

    /// Account holding home-chain assets on behalf of wills
    #[serde(default = "default_custody")]
    pub custody_account: Address,

    /// Shortest inactivity period a will may use (default: 30 days)
    #[serde(default = "default_min_inactivity")]
    pub min_inactivity_period_secs: u64,

    /// Attestations needed for oracle-gated wills
    #[serde(default = "default_oracle_threshold")]
    pub oracle_threshold: usize,

    /// KYC validity window (default: 1 year)
    #[serde(default = "default_kyc_validity")]
    pub kyc_validity_secs: u64,

    /// Validator approvals needed for a bridge release
    #[serde(default = "default_bridge_quorum")]
    pub bridge_quorum: usize,

    /// Activity records kept in memory
    #[serde(default = "default_journal_capacity")]
    pub journal_capacity: usize,
}

/// Keeper settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperSection {
    /// Account the keeper acts as when triggering wills
    pub account: Address,

    /// Fraction of a will's inactivity period after which its silent owner
    /// is reminded
    #[serde(default = "default_reminder_at")]
    pub reminder_at: f64,

    /// Fraction after which the owner gets a final notice
    #[serde(default = "default_final_notice_at")]
    pub final_notice_at: f64,

    /// Execute bridge releases that reached quorum
    #[serde(default = "default_true")]
    pub execute_releases: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_check_interval() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_custody() -> Address {
    DEFAULT_CUSTODY
}

fn default_min_inactivity() -> u64 {
    EngineConfig::default().min_inactivity_period_secs
}

fn default_oracle_threshold() -> usize {
    EngineConfig::default().oracle_threshold
}

fn default_kyc_validity() -> u64 {
    KycConfig::default().validity_period_secs
}

fn default_bridge_quorum() -> usize {
    BridgeConfig::default().quorum
}

fn default_journal_capacity() -> usize {
    LedgerConfig::default().journal_capacity
}

fn default_reminder_at() -> f64 {
    HeartbeatConfig::default().reminder_at
}

fn default_final_notice_at() -> f64 {
    HeartbeatConfig::default().final_notice_at
}

fn default_true() -> bool {
    true
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;
        let config: ServerConfig = toml::from_str(&contents)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported variables:
    /// - `HEIRLOOM_DATA_DIR`
    /// - `HEIRLOOM_CHECK_INTERVAL`
    /// - `HEIRLOOM_LOG_LEVEL`
    /// - `HEIRLOOM_ADMIN`
    /// - `HEIRLOOM_KEEPER`
    /// - `HEIRLOOM_BRIDGE_QUORUM`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("HEIRLOOM_DATA_DIR") {
            self.server.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("HEIRLOOM_CHECK_INTERVAL") {
            if let Ok(secs) = v.parse::<u64>() {
                self.server.check_interval_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("HEIRLOOM_LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Ok(v) = std::env::var("HEIRLOOM_ADMIN") {
            if let Ok(admin) = v.parse::<Address>() {
                self.ledger.admin = admin;
            }
        }
        if let Ok(v) = std::env::var("HEIRLOOM_KEEPER") {
            if let Ok(keeper) = v.parse::<Address>() {
                self.keeper.account = keeper;
            }
        }
        if let Ok(v) = std::env::var("HEIRLOOM_BRIDGE_QUORUM") {
            if let Ok(quorum) = v.parse::<usize>() {
                self.ledger.bridge_quorum = quorum;
            }
        }
    }

    /// Path of the SQLite database inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.server.data_dir.join("heirloom.db")
    }

    pub fn heartbeat_config(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            reminder_at: self.keeper.reminder_at,
            final_notice_at: self.keeper.final_notice_at,
        }
    }

    /// Ledger configuration for a fresh ledger.
    pub fn to_ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            admin: self.ledger.admin,
            engine: EngineConfig {
                min_inactivity_period_secs: self.ledger.min_inactivity_period_secs,
                oracle_threshold: self.ledger.oracle_threshold,
                custody_account: self.ledger.custody_account,
            },
            kyc: KycConfig {
                validity_period_secs: self.ledger.kyc_validity_secs,
            },
            bridge: BridgeConfig {
                quorum: self.ledger.bridge_quorum,
            },
            heartbeat: self.heartbeat_config(),
            journal_capacity: self.ledger.journal_capacity,
        }
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.server.check_interval_secs >= 60,
            "server.check_interval_secs must be >= 60"
        );
        anyhow::ensure!(
            !self.keeper.account.is_zero(),
            "keeper.account must not be the zero address"
        );

        self.to_ledger_config()
            .validate()
            .context("Invalid [ledger] or [keeper] settings")?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn minimal_toml() -> &'static str {
        r#"
[ledger]
admin = "0x00000000000000000000000000000000000000ad"

[keeper]
account = "0x00000000000000000000000000000000000000ee"
"#
    }

    fn full_toml() -> &'static str {
        r#"
[server]
data_dir = "/custom/data"
check_interval_secs = 600
log_level = "debug"

[ledger]
admin = "0x00000000000000000000000000000000000000ad"
custody_account = "0x00000000000000000000000000000000000000cc"
min_inactivity_period_secs = 86400
oracle_threshold = 2
kyc_validity_secs = 15768000
bridge_quorum = 3
journal_capacity = 50

[keeper]
account = "0x00000000000000000000000000000000000000ee"
reminder_at = 0.6
final_notice_at = 0.8
execute_releases = false
"#
    }

    fn load(toml: &str) -> ServerConfig {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", toml).unwrap();
        ServerConfig::from_file(file.path()).unwrap()
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = load(minimal_toml());
        assert_eq!(config.ledger.admin, Address::from_low_u8(0xAD));
        assert_eq!(config.keeper.account, Address::from_low_u8(0xEE));
        assert_eq!(config.server.check_interval_secs, 3600); // default
        assert_eq!(config.ledger.custody_account, DEFAULT_CUSTODY);
        assert_eq!(config.ledger.bridge_quorum, 1);
        assert!(config.keeper.execute_releases);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = load(full_toml());
        assert_eq!(config.server.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.db_path(), PathBuf::from("/custom/data/heirloom.db"));
        assert!(!config.keeper.execute_releases);

        let ledger = config.to_ledger_config();
        assert_eq!(ledger.engine.min_inactivity_period_secs, 86_400);
        assert_eq!(ledger.engine.oracle_threshold, 2);
        assert_eq!(ledger.engine.custody_account, Address::from_low_u8(0xCC));
        assert_eq!(ledger.kyc.validity_period_secs, 15_768_000);
        assert_eq!(ledger.bridge.quorum, 3);
        assert_eq!(ledger.journal_capacity, 50);
        assert_eq!(ledger.heartbeat.final_notice_at, 0.8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_keeper_section_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[ledger]
admin = "0x00000000000000000000000000000000000000ad"
"#
        )
        .unwrap();
        assert!(ServerConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_bad_address_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[ledger]
admin = "not-an-address"

[keeper]
account = "0x00000000000000000000000000000000000000ee"
"#
        )
        .unwrap();
        assert!(ServerConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = load(minimal_toml());

        std::env::set_var("HEIRLOOM_DATA_DIR", "/env/data");
        std::env::set_var("HEIRLOOM_CHECK_INTERVAL", "1800");
        std::env::set_var("HEIRLOOM_KEEPER", "0x00000000000000000000000000000000000000ef");
        std::env::set_var("HEIRLOOM_BRIDGE_QUORUM", "not-a-number");

        config.apply_env_overrides();

        assert_eq!(config.server.data_dir, PathBuf::from("/env/data"));
        assert_eq!(config.server.check_interval_secs, 1800);
        assert_eq!(config.keeper.account, Address::from_low_u8(0xEF));
        assert_eq!(config.ledger.bridge_quorum, 1);

        std::env::remove_var("HEIRLOOM_DATA_DIR");
        std::env::remove_var("HEIRLOOM_CHECK_INTERVAL");
        std::env::remove_var("HEIRLOOM_KEEPER");
        std::env::remove_var("HEIRLOOM_BRIDGE_QUORUM");
    }

    #[test]
    fn test_validation_check_interval_too_low() {
        let mut config = load(minimal_toml());
        config.server.check_interval_secs = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_keeper() {
        let mut config = load(minimal_toml());
        config.keeper.account = Address::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_ledger_settings() {
        let mut config = load(minimal_toml());
        config.ledger.bridge_quorum = 0;
        assert!(config.validate().is_err());

        let mut config = load(minimal_toml());
        config.keeper.reminder_at = 0.95;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = load(full_toml());
        let serialized = toml::to_string_pretty(&config).unwrap();
        let reparsed: ServerConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.ledger.admin, config.ledger.admin);
        assert_eq!(reparsed.ledger.bridge_quorum, 3);
        assert_eq!(reparsed.keeper.reminder_at, 0.6);
    }
}
