use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::env::current_dir;
use std::fs;
use std::path::{Path, PathBuf};

const DB_PATH_KEY: &str = "LEDGER_DB_PATH";
const LOG_LEVEL_KEY: &str = "LEDGER_LOG_LEVEL";

static DEFAULT_DB_DIR: &str = "data";
static DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory holding the sled database
    pub db_path: PathBuf,
    /// Default `env_logger` filter, overridden by `RUST_LOG`
    pub log_level: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let db_path = current_dir()
            .map(|dir| dir.join(DEFAULT_DB_DIR))
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_DIR));
        LedgerConfig {
            db_path,
            log_level: String::from(DEFAULT_LOG_LEVEL),
        }
    }
}

impl LedgerConfig {
    pub fn with_path<P: Into<PathBuf>>(db_path: P) -> LedgerConfig {
        LedgerConfig {
            db_path: db_path.into(),
            ..Default::default()
        }
    }

    /// Defaults, overridden by `LEDGER_DB_PATH` and `LEDGER_LOG_LEVEL` when set
    pub fn from_env() -> LedgerConfig {
        let mut config = LedgerConfig::default();
        if let Ok(path) = env::var(DB_PATH_KEY) {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(level) = env::var(LOG_LEVEL_KEY) {
            config.log_level = level;
        }
        config
    }

    pub fn from_toml_str(contents: &str) -> Result<LedgerConfig> {
        let config: LedgerConfig = toml::from_str(contents)?;
        if config.db_path.as_os_str().is_empty() {
            return Err(LedgerError::Config("db_path must not be empty".to_string()));
        }
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<LedgerConfig> {
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }
}
