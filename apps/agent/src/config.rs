//! Process configuration from `BLOOMTRACK_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use bloomtrack_core::backup::DEFAULT_BACKUP_INTERVAL_SECS;
use bloomtrack_core::sync::DEFAULT_FETCH_LIMIT;
use thiserror::Error;

pub const DATA_DIR_VAR: &str = "BLOOMTRACK_DATA_DIR";
pub const API_URL_VAR: &str = "BLOOMTRACK_API_URL";
pub const ACCESS_TOKEN_VAR: &str = "BLOOMTRACK_ACCESS_TOKEN";
pub const BACKUP_INTERVAL_VAR: &str = "BLOOMTRACK_BACKUP_INTERVAL_SECS";
pub const FETCH_LIMIT_VAR: &str = "BLOOMTRACK_FETCH_LIMIT";
pub const USER_ID_VAR: &str = "BLOOMTRACK_USER_ID";
pub const LOG_JSON_VAR: &str = "BLOOMTRACK_LOG_JSON";

const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be a boolean (true/false/1/0/yes/no/on/off), got '{value}'")]
    InvalidBool { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub data_dir: PathBuf,
    /// Document API base URL. Remote sync is disabled without it.
    pub api_url: Option<String>,
    pub access_token: Option<String>,
    pub backup_interval: Duration,
    pub fetch_limit: usize,
    /// User signed in at boot.
    pub user_id: Option<String>,
    pub log_json: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            api_url: None,
            access_token: None,
            backup_interval: Duration::from_secs(DEFAULT_BACKUP_INTERVAL_SECS),
            fetch_limit: DEFAULT_FETCH_LIMIT,
            user_id: None,
            log_json: false,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn positive(name: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match non_empty(raw) {
        None => Ok(default),
        Some(value) => match value.parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(ConfigError::InvalidNumber { name, value }),
        },
    }
}

pub fn parse_bool(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match non_empty(raw) {
        None => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { name, value }),
        },
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = non_empty(lookup(DATA_DIR_VAR))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let backup_secs = positive(
            BACKUP_INTERVAL_VAR,
            lookup(BACKUP_INTERVAL_VAR),
            DEFAULT_BACKUP_INTERVAL_SECS,
        )?;
        let fetch_limit = positive(
            FETCH_LIMIT_VAR,
            lookup(FETCH_LIMIT_VAR),
            DEFAULT_FETCH_LIMIT as u64,
        )?;

        Ok(Self {
            data_dir,
            api_url: non_empty(lookup(API_URL_VAR)),
            access_token: non_empty(lookup(ACCESS_TOKEN_VAR)),
            backup_interval: Duration::from_secs(backup_secs),
            fetch_limit: usize::try_from(fetch_limit).unwrap_or(usize::MAX),
            user_id: non_empty(lookup(USER_ID_VAR)),
            log_json: parse_bool(LOG_JSON_VAR, lookup(LOG_JSON_VAR), false)?,
        })
    }

    pub fn remote_enabled(&self) -> bool {
        self.api_url.is_some()
    }
}
