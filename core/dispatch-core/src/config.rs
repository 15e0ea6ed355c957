//! Client configuration loading and saving.
//!
//! Resolution order, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. `~/.dispatch/client.toml`
//! 3. `DISPATCH_*` environment variables
//! 4. Command-line flags (applied by the front end)

use dispatch_protocol::UnitKind;
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DispatchError, Result};
use crate::storage::StorageConfig;

pub const API_URL_ENV: &str = "DISPATCH_API_URL";
pub const PUSH_ADDR_ENV: &str = "DISPATCH_PUSH_ADDR";
pub const SESSION_COOKIE_ENV: &str = "DISPATCH_SESSION_COOKIE";
pub const UNIT_KIND_ENV: &str = "DISPATCH_UNIT_KIND";

const DEFAULT_API_URL: &str = "http://localhost:8080/v1";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// What to do with a response that arrives after a newer request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleResponsePolicy {
    /// Apply a response only if it answers the latest-issued request.
    #[default]
    DropSuperseded,
    /// Apply every response in arrival order; the last one to resolve wins.
    LastResolvedWins,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconnectConfig {
    pub step_ms: u64,
    pub max_ms: u64,
    pub jitter_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            step_ms: 500,
            max_ms: 30_000,
            jitter_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST API, without a trailing slash.
    pub api_url: String,
    /// `host:port` of the push channel; push is disabled when unset.
    pub push_addr: Option<String>,
    pub unit_kind: UnitKind,
    pub request_timeout_ms: u64,
    /// Value of the `Cookie` header sent with every request.
    pub session_cookie: Option<String>,
    pub stale_responses: StaleResponsePolicy,
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            push_addr: None,
            unit_kind: UnitKind::default(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            session_cookie: None,
            stale_responses: StaleResponsePolicy::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Applies `DISPATCH_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty(API_URL_ENV) {
            self.api_url = url;
        }
        if let Some(addr) = non_empty(PUSH_ADDR_ENV) {
            self.push_addr = Some(addr);
        }
        if let Some(cookie) = non_empty(SESSION_COOKIE_ENV) {
            self.session_cookie = Some(cookie);
        }
        if let Some(kind) = non_empty(UNIT_KIND_ENV) {
            self.unit_kind = kind
                .parse()
                .map_err(|details| DispatchError::InvalidConfig {
                    field: "unit_kind",
                    details,
                })?;
        }
        Ok(())
    }

    /// Normalizes and checks values that would otherwise fail on first request.
    pub fn validate(mut self) -> Result<Self> {
        let trimmed = self.api_url.trim().trim_end_matches('/').to_string();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(DispatchError::InvalidConfig {
                field: "api_url",
                details: format!("'{}' must start with http:// or https://", self.api_url),
            });
        }
        self.api_url = trimmed;

        if self.request_timeout_ms == 0 {
            return Err(DispatchError::InvalidConfig {
                field: "request_timeout_ms",
                details: "must be greater than zero".to_string(),
            });
        }
        if self.reconnect.step_ms == 0 || self.reconnect.max_ms < self.reconnect.step_ms {
            return Err(DispatchError::InvalidConfig {
                field: "reconnect",
                details: "step_ms must be non-zero and no larger than max_ms".to_string(),
            });
        }
        if let Some(addr) = self.push_addr.as_deref() {
            if !addr.contains(':') {
                return Err(DispatchError::InvalidConfig {
                    field: "push_addr",
                    details: format!("'{}' must be host:port", addr),
                });
            }
        }
        Ok(self)
    }
}

/// Reads client.toml, returning defaults if the file doesn't exist.
pub fn load_config_file(storage: &StorageConfig) -> Result<ClientConfig> {
    let path = storage.config_file();
    if !path.exists() {
        return Ok(ClientConfig::default());
    }

    let content = fs::read_to_string(&path).map_err(|source| DispatchError::Io {
        context: format!("reading {}", path.display()),
        source,
    })?;
    toml::from_str::<ClientConfig>(&content).map_err(|err| DispatchError::ConfigMalformed {
        path: path.clone(),
        details: err.to_string(),
    })
}

/// Loads the effective configuration: file, then process environment.
pub fn load_client_config(storage: &StorageConfig) -> Result<ClientConfig> {
    let mut config = load_config_file(storage)?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    config.validate()
}

/// Writes client.toml atomically (temp file + rename).
pub fn save_client_config(storage: &StorageConfig, config: &ClientConfig) -> Result<()> {
    let path = storage.config_file();
    let content = toml::to_string_pretty(config).map_err(|err| DispatchError::InvalidConfig {
        field: "client.toml",
        details: err.to_string(),
    })?;

    fs::create_dir_all(storage.root()).map_err(|source| DispatchError::ConfigWriteFailed {
        path: path.clone(),
        source,
    })?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, content).map_err(|source| DispatchError::ConfigWriteFailed {
        path: path.clone(),
        source,
    })?;
    fs::rename(&tmp_path, &path).map_err(|source| DispatchError::ConfigWriteFailed {
        path: path.clone(),
        source,
    })
}
