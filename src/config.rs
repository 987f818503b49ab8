//! Tracker configuration

use crate::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Polling cadence for a tracking session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval between status probes (milliseconds)
    pub poll_interval_ms: u64,

    /// Give up on a session after this long (milliseconds)
    pub poll_timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
            poll_timeout_ms: 300_000, // 5 minutes
        }
    }
}

impl PollingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be non-zero".to_string()));
        }
        if self.poll_interval_ms >= self.poll_timeout_ms {
            return Err(Error::Config(format!(
                "poll_interval_ms ({}) must be shorter than poll_timeout_ms ({})",
                self.poll_interval_ms, self.poll_timeout_ms
            )));
        }
        Ok(())
    }
}

/// Ledger RPC endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL
    pub url: String,

    /// Per-request HTTP timeout (milliseconds)
    pub request_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8899".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl RpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Top-level tracker configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub polling: PollingConfig,

    pub rpc: RpcConfig,

    /// Synthesize identifiers and simulate statuses instead of using the ledger
    pub debug_mode: bool,
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        self.polling.validate()?;
        if self.rpc.request_timeout_ms == 0 {
            return Err(Error::Config("request_timeout_ms must be non-zero".to_string()));
        }
        if !self.debug_mode {
            url::Url::parse(&self.rpc.url)
                .map_err(|e| Error::Config(format!("invalid rpc url {}: {}", self.rpc.url, e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.polling.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.polling.poll_timeout(), Duration::from_secs(300));
        assert!(!config.debug_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: TrackerConfig = serde_json::from_str(
            r#"{ "debug_mode": true, "polling": { "poll_interval_ms": 500 } }"#,
        )
        .unwrap();
        assert!(config.debug_mode);
        assert_eq!(config.polling.poll_interval_ms, 500);
        assert_eq!(config.polling.poll_timeout_ms, 300_000);
        assert_eq!(config.rpc, RpcConfig::default());
    }

    #[test]
    fn test_validation() {
        let mut config = TrackerConfig::default();
        config.polling.poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.polling.poll_interval_ms = 400_000;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.polling = PollingConfig::default();
        config.rpc.url = "not a url".to_string();
        assert!(config.validate().is_err());

        // the url is never used in debug mode
        config.debug_mode = true;
        assert!(config.validate().is_ok());
    }
}
