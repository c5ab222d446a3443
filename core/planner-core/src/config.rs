//! Client configuration loading.
//!
//! `config.toml` lives in the storage root. A missing file means defaults; a
//! malformed one is an error so typos don't silently point the client at the
//! wrong server. Environment variables override the file.

use std::path::Path;
use std::time::Duration;

use chrono::TimeDelta;
use planner_protocol::DEFAULT_API_BASE_URL;
use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};
use crate::storage::StorageConfig;

pub const API_URL_ENV: &str = "PLANNER_API_URL";
pub const TIMEOUT_ENV: &str = "PLANNER_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
// The server never reports an expiry; this is the client's assumption.
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub session_ttl_hours: i64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_ttl(&self) -> TimeDelta {
        TimeDelta::try_hours(self.session_ttl_hours)
            .unwrap_or_else(|| TimeDelta::hours(DEFAULT_SESSION_TTL_HOURS))
    }

    /// Loads `config.toml` from the storage root, then applies env overrides.
    pub fn load(storage: &StorageConfig) -> Result<Self> {
        let mut config = Self::load_file(&storage.config_file())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs_err::read_to_string(path).map_err(|source| PlannerError::Storage {
            context: format!("reading {}", path.display()),
            source,
        })?;
        toml::from_str(&content).map_err(|err| PlannerError::Config {
            path: path.to_path_buf(),
            details: err.to_string(),
        })
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|value| !value.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(secs) = lookup(TIMEOUT_ENV).and_then(|value| value.trim().parse().ok()) {
            self.request_timeout_secs = secs;
        }
    }
}
