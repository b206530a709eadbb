//! Centralized configuration for the contacts CLI.
//!
//! Environment variables are loaded and validated before any command runs;
//! command-line flags override them.

use std::env;
use std::fmt;
use std::path::PathBuf;

/// Storage backend provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageProvider {
    /// In-memory storage (data lost when the process exits)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("sqlite") {
            Some(Self::Sqlite)
        } else if s.eq_ignore_ascii_case("memory") {
            Some(Self::Memory)
        } else {
            None
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    /// Storage provider (default: sqlite)
    pub storage_provider: StorageProvider,
    /// SQLite database path; the adapter default applies when unset
    pub db_path: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Storage provider
        let provider = lookup("STORAGE_PROVIDER").unwrap_or_else(|| "sqlite".into());
        let storage_provider = StorageProvider::parse(&provider).ok_or_else(|| ConfigError {
            field: "STORAGE_PROVIDER",
            message: format!("Unknown provider '{provider}', expected 'memory' or 'sqlite'"),
        })?;

        // DB path (for sqlite)
        let db_path = lookup("DB_PATH").filter(|s| !s.is_empty()).map(PathBuf::from);
        if storage_provider == StorageProvider::Memory && db_path.is_some() {
            tracing::debug!("DB_PATH is ignored with STORAGE_PROVIDER=memory");
        }

        // Log format
        let log_format = LogFormat::from_str(&lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        Ok(Self {
            storage_provider,
            db_path,
            log_format,
        })
    }

    /// Log warnings about configurations that lose data.
    pub fn warn_if_ephemeral(&self) {
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!(
                "STORAGE_PROVIDER=memory: contacts live only for this invocation and are \
                 discarded on exit."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn storage_provider_parsing() {
        assert_eq!(StorageProvider::parse("memory"), Some(StorageProvider::Memory));
        assert_eq!(StorageProvider::parse("SQLITE"), Some(StorageProvider::Sqlite));
        assert_eq!(StorageProvider::parse("dynamo"), None);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::from_str("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_str("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str("anything"), LogFormat::Pretty);
    }

    #[test]
    fn defaults_to_sqlite_and_pretty_logs() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.storage_provider, StorageProvider::Sqlite);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert!(cfg.db_path.is_none());
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = load(&[("STORAGE_PROVIDER", "dynamo")]).unwrap_err();
        assert_eq!(err.field, "STORAGE_PROVIDER");
        assert!(err.to_string().contains("dynamo"));
    }

    #[test]
    fn reads_db_path_and_log_format() {
        let cfg = load(&[("DB_PATH", "/tmp/c.db"), ("LOG_FORMAT", "json")]).unwrap();
        assert_eq!(cfg.db_path, Some(PathBuf::from("/tmp/c.db")));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }
}
