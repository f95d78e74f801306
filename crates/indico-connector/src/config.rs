//! Configuration for the Indico connector.
//!
//! Holds the defaults applied when a host call omits its polling interval,
//! timeout or list limit, plus the per-request timeout of the HTTP client.
//! Credentials are never read from here; they are passed to `init`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "indico-connector.json";

/// Default interval between readiness checks, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default overall wait timeout, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Default maximum number of submissions returned by a listing.
pub const DEFAULT_LIST_LIMIT: u32 = 1000;

const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

const fn default_list_limit() -> u32 {
    DEFAULT_LIST_LIMIT
}

/// Default per-request timeout of the HTTP client, in seconds.
const fn default_request_timeout_secs() -> u64 {
    30
}

/// Connector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorConfig {
    /// Interval between readiness checks when the caller gives none.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Overall wait timeout when the caller gives none.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Listing limit when the caller gives none.
    #[serde(default = "default_list_limit")]
    pub list_limit: u32,

    /// Timeout applied to each HTTP request made by the remote client.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_timeout_ms(),
            list_limit: default_list_limit(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ConnectorConfig {
    /// Loads configuration from the current working directory.
    ///
    /// Falls back to defaults when no `indico-connector.json` is present.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            ConnectorError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `indico-connector.json` in the given directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the default configuration. A file that exists
    /// but cannot be parsed yields [`ConnectorError::ConfigParse`]; parsed
    /// values are then checked with [`ConnectorConfig::validate`].
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConnectorError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConnectorError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configured defaults.
    ///
    /// The poll interval must be positive and no longer than the timeout, the
    /// list limit and the request timeout must be positive.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConnectorError::validation(
                "pollIntervalMs must be greater than 0",
            ));
        }

        if self.timeout_ms < self.poll_interval_ms {
            return Err(ConnectorError::validation(
                "timeoutMs must not be shorter than pollIntervalMs",
            ));
        }

        if self.list_limit == 0 {
            return Err(ConnectorError::validation(
                "listLimit must be greater than 0",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConnectorError::validation(
                "requestTimeoutSecs must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Default polling interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Default wait timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// HTTP request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
