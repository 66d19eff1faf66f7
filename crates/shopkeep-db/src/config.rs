//! # Shop Configuration
//!
//! Where the ledger database lives and how the pool talks to it.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SHOPKEEP_DB_PATH=/srv/shop/shop.db                                 │
//! │     SHOPKEEP_MAX_CONNECTIONS=4                                         │
//! │     SHOPKEEP_BUSY_TIMEOUT_SECS=10                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/shopkeep/shopkeep.toml (Linux)                           │
//! │     ~/Library/Application Support/com.shopkeep.shopkeep/shopkeep.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     <data dir>/shopkeep.db, 5 connections, 5s busy timeout             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # shopkeep.toml
//! [database]
//! path = "/srv/shop/shop.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//!
//! [sales]
//! gym_shortfall = "reject"   # reject | proceed
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use shopkeep_core::allocation::ShortfallPolicy;

use crate::pool::DbConfig;

const CONFIG_FILE: &str = "shopkeep.toml";
const DATABASE_FILE: &str = "shopkeep.db";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file: {0}")]
    Write(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config directory available on this platform")]
    NoConfigDir,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// The `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Seconds to wait for a free pool connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Seconds SQLite retries a locked database.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,

    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "shopkeep", "shopkeep")
        .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE))
}
fn default_max_connections() -> u32 {
    5
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_busy_timeout() -> u64 {
    5
}
fn default_run_migrations() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            busy_timeout_secs: default_busy_timeout(),
            run_migrations: default_run_migrations(),
        }
    }
}

/// The `[sales]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SalesSettings {
    /// What a gym sale does when the price tier runs out. The counter asks
    /// the operator; this is the answer used when nobody is asked.
    #[serde(default)]
    pub gym_shortfall: ShortfallPolicy,
}

// =============================================================================
// Shop Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub sales: SalesSettings,
}

impl ShopConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`path`, or `shopkeep.toml` in the config dir)
    /// 3. Environment variables
    ///
    /// An explicit `path` that does not exist is an error; a missing file in
    /// the default location is not.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                Some(path) => {
                    debug!(?path, "Config file not found, using defaults");
                    Self::default()
                }
                None => Self::default(),
            },
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        info!(?path, "Loading shop config from file");
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Writes the configuration as TOML, creating parent directories.
    pub fn save(&self, path: Option<&Path>) -> ConfigResult<PathBuf> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path().ok_or(ConfigError::NoConfigDir)?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, toml::to_string_pretty(self)?)?;

        info!(?path, "Shop config saved");
        Ok(path)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let db = &self.database;

        if db.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if db.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if db.min_connections > db.max_connections {
            return Err(ConfigError::Invalid(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                db.min_connections, db.max_connections
            )));
        }
        if db.busy_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "database.busy_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("SHOPKEEP_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("SHOPKEEP_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => warn!(value = %max, "Ignoring invalid SHOPKEEP_MAX_CONNECTIONS"),
            }
        }

        if let Ok(secs) = std::env::var("SHOPKEEP_BUSY_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) => self.database.busy_timeout_secs = secs,
                Err(_) => warn!(value = %secs, "Ignoring invalid SHOPKEEP_BUSY_TIMEOUT_SECS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "shopkeep", "shopkeep")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Pool and ledger settings for [`crate::Database::new`].
    pub fn to_db_config(&self) -> DbConfig {
        let db = &self.database;
        DbConfig::new(&db.path)
            .max_connections(db.max_connections)
            .min_connections(db.min_connections)
            .connect_timeout(Duration::from_secs(db.connect_timeout_secs))
            .busy_timeout(Duration::from_secs(db.busy_timeout_secs))
            .run_migrations(db.run_migrations)
            .gym_shortfall(self.sales.gym_shortfall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ShopConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.busy_timeout_secs, 5);
        assert!(config.database.path.ends_with(DATABASE_FILE));
        assert_eq!(config.sales.gym_shortfall, ShortfallPolicy::Reject);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ShopConfig = toml::from_str(
            r#"
            [database]
            path = "/tmp/shop.db"
            busy_timeout_secs = 9

            [sales]
            gym_shortfall = "proceed"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.database.busy_timeout_secs, 9);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.sales.gym_shortfall, ShortfallPolicy::Proceed);
    }

    #[test]
    fn test_validation() {
        let mut config = ShopConfig::default();

        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        config.database.max_connections = 2;
        config.database.min_connections = 3;
        assert!(config.validate().is_err());

        config.database.min_connections = 1;
        config.database.busy_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.database.busy_timeout_secs = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_db_config() {
        let mut config = ShopConfig::default();
        config.database.path = PathBuf::from("/tmp/ledger.db");
        config.database.max_connections = 3;
        config.database.busy_timeout_secs = 7;
        config.database.run_migrations = false;
        config.sales.gym_shortfall = ShortfallPolicy::Proceed;

        let db = config.to_db_config();
        assert_eq!(db.database_path, PathBuf::from("/tmp/ledger.db"));
        assert_eq!(db.max_connections, 3);
        assert_eq!(db.busy_timeout, Duration::from_secs(7));
        assert!(!db.run_migrations);
        assert_eq!(db.gym_shortfall, ShortfallPolicy::Proceed);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("shopkeep-{}.toml", uuid::Uuid::new_v4()));
        let mut config = ShopConfig::default();
        config.database.path = PathBuf::from("/tmp/saved.db");
        config.database.max_connections = 2;

        config.save(Some(&path)).unwrap();
        let loaded = ShopConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("missing-{}.toml", uuid::Uuid::new_v4()));
        assert!(matches!(
            ShopConfig::load(Some(&path)),
            Err(ConfigError::Read { .. })
        ));
    }
}
