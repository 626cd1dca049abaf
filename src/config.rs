//! Typed configuration from environment variables.
//!
//! Loads once at startup. In local dev, call `dotenvy::dotenv().ok()` first
//! so a `.env` file can supply the variables.

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::event_store::StoreConfig;

pub const ENV_DATA_DIR: &str = "CASE_LEDGER_DATA_DIR";
pub const ENV_BIND: &str = "CASE_LEDGER_BIND";
pub const ENV_WRITE_RETRIES: &str = "CASE_LEDGER_WRITE_RETRIES";
pub const ENV_MAX_CORRUPT: &str = "CASE_LEDGER_MAX_CORRUPT";
pub const ENV_NLP_URL: &str = "CASE_LEDGER_NLP_URL";
pub const ENV_NLP_MODEL: &str = "CASE_LEDGER_NLP_MODEL";
pub const ENV_NLP_TIMEOUT_SECS: &str = "CASE_LEDGER_NLP_TIMEOUT_SECS";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_NLP_MODEL: &str = "qwen3:4b";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the external extraction service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NlpConfig {
    pub url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub write_retries: u32,
    pub max_corrupt_records: usize,
    /// External extractor; rules only when unset
    pub nlp: Option<NlpConfig>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_lookup(&base, |name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Relative data directories are resolved against `base`.
    pub fn from_lookup<F>(base: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = StoreConfig::default();

        let data_dir = match lookup(ENV_DATA_DIR) {
            Some(dir) if Path::new(&dir).is_absolute() => PathBuf::from(dir),
            Some(dir) => base.join(dir),
            None => base.join(&defaults.data_dir),
        };

        let bind_raw = lookup(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = parse_var(ENV_BIND, &bind_raw)?;

        let write_retries = match lookup(ENV_WRITE_RETRIES) {
            Some(raw) => parse_var(ENV_WRITE_RETRIES, &raw)?,
            None => defaults.write_retries,
        };
        if write_retries == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_WRITE_RETRIES,
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }

        let max_corrupt_records = match lookup(ENV_MAX_CORRUPT) {
            Some(raw) => parse_var(ENV_MAX_CORRUPT, &raw)?,
            None => defaults.max_corrupt_records,
        };

        let nlp = match lookup(ENV_NLP_URL).filter(|url| !url.trim().is_empty()) {
            Some(url) => {
                let timeout_secs: u64 = match lookup(ENV_NLP_TIMEOUT_SECS) {
                    Some(raw) => parse_var(ENV_NLP_TIMEOUT_SECS, &raw)?,
                    None => 30,
                };
                Some(NlpConfig {
                    url,
                    model: lookup(ENV_NLP_MODEL).unwrap_or_else(|| DEFAULT_NLP_MODEL.to_string()),
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
            None => None,
        };

        Ok(Self {
            data_dir,
            bind_addr,
            write_retries,
            max_corrupt_records,
            nlp,
            log_level: lookup(ENV_LOG_LEVEL).unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Store settings derived from this configuration
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.data_dir)
            .with_write_retries(self.write_retries)
            .with_max_corrupt_records(self.max_corrupt_records)
    }
}

fn parse_var<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
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
        Config::from_lookup(Path::new("/srv/intake"), |name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/intake/data"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.write_retries, 3);
        assert_eq!(config.max_corrupt_records, 8);
        assert!(config.nlp.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_relative_and_absolute_data_dir() {
        let config = load(&[(ENV_DATA_DIR, "cases")]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/intake/cases"));

        let config = load(&[(ENV_DATA_DIR, "/var/lib/cases")]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/cases"));
        assert_eq!(config.store_config().log_path(), PathBuf::from("/var/lib/cases/cases.jsonl"));
    }

    #[test]
    fn test_nlp_enabled_by_url() {
        let config = load(&[
            (ENV_NLP_URL, "http://127.0.0.1:11434/api/generate"),
            (ENV_NLP_TIMEOUT_SECS, "5"),
        ])
        .unwrap();

        let nlp = config.nlp.unwrap();
        assert_eq!(nlp.model, "qwen3:4b");
        assert_eq!(nlp.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_numbers_fail() {
        assert!(load(&[(ENV_WRITE_RETRIES, "many")]).is_err());
        assert!(load(&[(ENV_WRITE_RETRIES, "0")]).is_err());
        assert!(load(&[(ENV_MAX_CORRUPT, "-1")]).is_err());
        assert!(load(&[(ENV_BIND, "localhost")]).is_err());
    }
}
