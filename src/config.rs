//! Process configuration from the environment.
//!
//! Every setting is an environment variable; `main` loads a `.env` file first
//! if one exists. Parsing goes through [`Config::from_lookup`] so tests can
//! supply variables without touching the process environment.

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::source::DEFAULT_REQUEST_TIMEOUT;
use crate::types::LedgerIndex;

/// Public full-history node used when `WEB_SOCKET` is unset.
pub const DEFAULT_NODE_URL: &str = "wss://s2.ripple.com";

/// Errors from reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set to something unusable.
    #[error("invalid value for {var} ({value:?}): {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Document store hub settings.
#[derive(Clone)]
pub struct HubConfig {
    /// Hub base URL (`HUB_URL`).
    pub url: Url,
    /// Target thread (`THREAD_ID`).
    pub thread_id: String,
    /// API key (`USER_API_KEY`).
    pub api_key: String,
    /// API secret (`USER_API_SECRET`).
    pub api_secret: String,
    /// Hex Ed25519 seed of the user identity (`ORG_USER_PRIVATE_KEY`).
    pub identity_key: String,
}

impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("url", &self.url.as_str())
            .field("thread_id", &self.thread_id)
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// First ledger to ingest (`LEDGER`).
    pub start_ledger: LedgerIndex,

    /// Exclusive upper bound (`STOP_LEDGER`). Unbounded when unset.
    pub stop_ledger: Option<LedgerIndex>,

    /// Ledger node WebSocket endpoint (`WEB_SOCKET`).
    pub node_url: Url,

    /// Bound on each node request (`REQUEST_TIMEOUT_SECS`).
    pub request_timeout: Duration,

    pub hub: HubConfig,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let start_ledger = match get("LEDGER") {
            Some(value) => parse_index("LEDGER", value)?,
            None => LedgerIndex::HISTORICAL_FLOOR,
        };

        let stop_ledger = get("STOP_LEDGER")
            .map(|value| parse_index("STOP_LEDGER", value))
            .transpose()?;
        if let Some(stop) = stop_ledger
            && stop <= start_ledger
        {
            return Err(ConfigError::Invalid {
                var: "STOP_LEDGER",
                value: stop.to_string(),
                reason: format!("must be greater than the start ledger {start_ledger}"),
            });
        }

        let node_url = parse_url(
            "WEB_SOCKET",
            get("WEB_SOCKET").unwrap_or_else(|| DEFAULT_NODE_URL.to_string()),
        )?;

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "REQUEST_TIMEOUT_SECS",
                        value,
                        reason: "expected a positive number of seconds".to_string(),
                    });
                }
            },
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let hub = HubConfig {
            url: parse_url("HUB_URL", require("HUB_URL")?)?,
            thread_id: require("THREAD_ID")?,
            api_key: require("USER_API_KEY")?,
            api_secret: require("USER_API_SECRET")?,
            identity_key: require("ORG_USER_PRIVATE_KEY")?,
        };

        Ok(Config {
            start_ledger,
            stop_ledger,
            node_url,
            request_timeout,
            hub,
        })
    }
}

fn parse_index(var: &'static str, value: String) -> Result<LedgerIndex, ConfigError> {
    value
        .parse::<u64>()
        .map(LedgerIndex)
        .map_err(|e| ConfigError::Invalid {
            var,
            value,
            reason: e.to_string(),
        })
}

fn parse_url(var: &'static str, value: String) -> Result<Url, ConfigError> {
    Url::parse(&value).map_err(|e| ConfigError::Invalid {
        var,
        value,
        reason: e.to_string(),
    })
}
