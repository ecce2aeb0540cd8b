//! Session model and the dispatch RPC messages that produce it

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{Configuration, Node, PocketError, Result};

/// Current unix time in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHeader {
    pub app_public_key: String,
    pub chain: String,
    #[serde(rename = "session_height")]
    pub session_block_height: u64,
    /// Local estimate of when the session was created (unix ms).
    /// Never sent to a dispatcher.
    #[serde(default)]
    pub session_timestamp: u64,
}

impl SessionHeader {
    pub fn new(app_public_key: &str, chain: &str, session_block_height: u64) -> Result<Self> {
        let header = Self {
            app_public_key: app_public_key.to_string(),
            chain: chain.to_string(),
            session_block_height,
            session_timestamp: 0,
        };
        header.validate()?;
        Ok(header)
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_public_key.trim().is_empty() {
            return Err(PocketError::Configuration(
                "session header requires an application public key".to_string(),
            ));
        }
        if self.chain.trim().is_empty() {
            return Err(PocketError::Configuration(
                "session header requires a chain".to_string(),
            ));
        }
        Ok(())
    }
}

/// A block-bounded assignment of serving nodes to an application and chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub header: SessionHeader,
    /// Opaque server-issued session key
    pub key: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub relay_count: u64,
}

impl Session {
    pub fn new(header: SessionHeader, key: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            header,
            key: key.into(),
            nodes,
            relay_count: 0,
        }
    }

    /// Build a session from a dispatch response.
    ///
    /// The server does not report a creation time, so the timestamp is
    /// back-computed from the height difference assuming a constant block time.
    pub fn from_dispatch(response: DispatchResponse, config: &Configuration, now_ms: u64) -> Result<Self> {
        let DispatchResponse {
            session,
            key,
            block_height,
        } = response;

        let key = key
            .or(session.key)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PocketError::Serialization("dispatch response has no session key".to_string()))?;

        let mut header = session.header;
        header.validate()?;

        let elapsed_blocks = block_height.saturating_sub(header.session_block_height);
        let elapsed_ms = elapsed_blocks.saturating_mul(config.block_time_ms);
        header.session_timestamp = now_ms.saturating_sub(elapsed_ms);

        Ok(Self::new(header, key, session.nodes))
    }

    /// Whole blocks elapsed since the session was created
    pub fn blocks_since_creation(&self, config: &Configuration) -> u64 {
        self.blocks_since_creation_at(config, now_millis())
    }

    pub fn blocks_since_creation_at(&self, config: &Configuration, now_ms: u64) -> u64 {
        if config.block_time_ms == 0 {
            return 0;
        }
        now_ms.saturating_sub(self.header.session_timestamp) / config.block_time_ms
    }

    /// True once the session outlived its validity window
    pub fn is_stale(&self, config: &Configuration) -> bool {
        self.blocks_since_creation(config) > config.session_block_frequency
    }

    pub fn find_node(&self, address: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.has_address(address))
    }

    pub fn contains_node(&self, address: &str) -> bool {
        self.find_node(address).is_some()
    }
}

/// Body of the dispatch RPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub app_public_key: String,
    pub chain: String,
    pub session_height: u64,
}

impl From<&SessionHeader> for DispatchRequest {
    fn from(header: &SessionHeader) -> Self {
        Self {
            app_public_key: header.app_public_key.clone(),
            chain: header.chain.clone(),
            session_height: header.session_block_height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSession {
    pub header: SessionHeader,
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Some dispatchers nest the key inside the session object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Successful dispatch RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub session: DispatchSession,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub block_height: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch_json() -> serde_json::Value {
        serde_json::json!({
            "session": {
                "header": {
                    "app_public_key": "aa".repeat(32),
                    "chain": "ETH04",
                    "session_height": 5
                },
                "nodes": [{
                    "address": "11".repeat(20),
                    "public_key": "22".repeat(32),
                    "jailed": false,
                    "status": 2,
                    "tokens": "1000",
                    "service_url": "https://node.example.com",
                    "chains": ["ETH04"]
                }]
            },
            "key": "abc",
            "block_height": 9
        })
    }

    #[test]
    fn test_session_from_dispatch() {
        let config = Configuration::default().with_block_time_ms(1_000);
        let response: DispatchResponse = serde_json::from_value(dispatch_json()).unwrap();
        let session = Session::from_dispatch(response, &config, 100_000).unwrap();

        assert_eq!(session.key, "abc");
        assert_eq!(session.header.chain, "ETH04");
        assert_eq!(session.header.session_block_height, 5);
        // 4 blocks behind at 1s per block
        assert_eq!(session.header.session_timestamp, 96_000);
        assert_eq!(session.nodes.len(), 1);
        assert_eq!(session.blocks_since_creation_at(&config, 100_000), 4);
    }

    #[test]
    fn test_nested_key_fallback() {
        let mut json = dispatch_json();
        json.as_object_mut().unwrap().remove("key");
        json["session"]["key"] = serde_json::json!("nested");
        let response: DispatchResponse = serde_json::from_value(json).unwrap();
        let session = Session::from_dispatch(response, &Configuration::default(), 0).unwrap();
        assert_eq!(session.key, "nested");
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let mut json = dispatch_json();
        json.as_object_mut().unwrap().remove("key");
        let response: DispatchResponse = serde_json::from_value(json).unwrap();
        assert!(Session::from_dispatch(response, &Configuration::default(), 0).is_err());
    }

    #[test]
    fn test_blocks_since_creation_ten_minutes() {
        let config = Configuration::default().with_block_time_ms(60_000);
        let mut header = SessionHeader::new("aa", "ETH04", 5).unwrap();
        header.session_timestamp = now_millis() - 600_000;
        let session = Session::new(header, "k", vec![]);
        assert_eq!(session.blocks_since_creation(&config), 10);
        assert!(session.is_stale(&config));
    }

    #[test]
    fn test_zero_block_time_never_ages() {
        let config = Configuration::default().with_block_time_ms(0);
        let header = SessionHeader::new("aa", "ETH04", 5).unwrap();
        let session = Session::new(header, "k", vec![]);
        assert_eq!(session.blocks_since_creation_at(&config, u64::MAX), 0);
    }

    #[test]
    fn test_header_requires_chain() {
        assert!(SessionHeader::new("aa", "", 0).is_err());
        assert!(SessionHeader::new("", "ETH04", 0).is_err());
    }

    #[test]
    fn test_dispatch_request_from_header() {
        let header = SessionHeader::new("aa", "ETH04", 7).unwrap();
        let request = DispatchRequest::from(&header);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"app_public_key": "aa", "chain": "ETH04", "session_height": 7})
        );
    }

    #[test]
    fn test_find_node_case_insensitive() {
        let response: DispatchResponse = serde_json::from_value(dispatch_json()).unwrap();
        let session = Session::from_dispatch(response, &Configuration::default(), 0).unwrap();
        assert!(session.contains_node(&"11".repeat(20).to_uppercase()));
        assert!(!session.contains_node(&"33".repeat(20)));
    }
}
