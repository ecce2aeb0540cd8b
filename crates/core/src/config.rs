//! Runtime configuration consumed by the routing and session layers

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client configuration
///
/// Owned by the caller and shared read-only with the core components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Upper bound on known dispatchers (0 = unbounded)
    #[serde(default)]
    pub max_dispatchers: usize,

    /// Upper bound on queued sessions per session key (0 = unbounded)
    #[serde(default)]
    pub max_sessions: usize,

    /// HTTP request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Average block time in milliseconds
    #[serde(default = "default_block_time_ms")]
    pub block_time_ms: u64,

    /// Number of blocks a session stays valid
    #[serde(default = "default_session_block_frequency")]
    pub session_block_frequency: u64,

    /// Stale-session re-dispatches allowed within one relay call
    #[serde(default = "default_max_session_refreshes")]
    pub max_session_refreshes: u32,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_block_time_ms() -> u64 {
    60_000
}

fn default_session_block_frequency() -> u64 {
    4
}

fn default_max_session_refreshes() -> u32 {
    1
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            max_dispatchers: 0,
            max_sessions: 0,
            request_timeout_ms: default_request_timeout_ms(),
            block_time_ms: default_block_time_ms(),
            session_block_frequency: default_session_block_frequency(),
            max_session_refreshes: default_max_session_refreshes(),
        }
    }
}

impl Configuration {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn with_max_dispatchers(mut self, max: usize) -> Self {
        self.max_dispatchers = max;
        self
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    pub fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    pub fn with_block_time_ms(mut self, ms: u64) -> Self {
        self.block_time_ms = ms;
        self
    }

    pub fn with_session_block_frequency(mut self, blocks: u64) -> Self {
        self.session_block_frequency = blocks;
        self
    }

    pub fn with_max_session_refreshes(mut self, refreshes: u32) -> Self {
        self.max_session_refreshes = refreshes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = Configuration::default();
        assert_eq!(config.max_dispatchers, 0);
        assert_eq!(config.max_sessions, 0);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.block_time_ms, 60_000);
        assert_eq!(config.session_block_frequency, 4);
        assert_eq!(config.max_session_refreshes, 1);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Configuration = serde_json::from_str(r#"{"max_sessions": 3}"#).unwrap();
        assert_eq!(config.max_sessions, 3);
        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(config.block_time_ms, 60_000);
    }

    #[test]
    fn test_builder_helpers() {
        let config = Configuration::default()
            .with_max_dispatchers(5)
            .with_max_sessions(2)
            .with_request_timeout_ms(250)
            .with_block_time_ms(1_000)
            .with_session_block_frequency(10);
        assert_eq!(config.max_dispatchers, 5);
        assert_eq!(config.max_sessions, 2);
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.block_time_ms, 1_000);
        assert_eq!(config.session_block_frequency, 10);
    }
}
