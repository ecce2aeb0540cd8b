use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code used when a failure carries no server-assigned code
pub const UNKNOWN_ERROR_CODE: &str = "0";

/// Code used when a caller cancelled an in-flight request
pub const CANCELLED_ERROR_CODE: &str = "cancelled";

/// Network or server-reported failure of an RPC exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: String,
    pub message: String,
}

impl RpcError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Failure without a server-assigned code
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(UNKNOWN_ERROR_CODE, message)
    }

    pub fn cancelled() -> Self {
        Self::new(CANCELLED_ERROR_CODE, "request cancelled by caller")
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == CANCELLED_ERROR_CODE
    }

    /// True when the failure never reached a server (connect, timeout, decode)
    pub fn is_transport(&self) -> bool {
        self.code == UNKNOWN_ERROR_CODE
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Relay failure reported by (or while talking to) a specific serving node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayError {
    pub code: String,
    pub message: String,
    /// Public key of the node that served (or failed to serve) the relay
    pub node_pub_key: String,
}

impl RelayError {
    pub fn from_rpc(err: RpcError, node_pub_key: impl Into<String>) -> Self {
        Self {
            code: err.code,
            message: err.message,
            node_pub_key: node_pub_key.into(),
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node {} returned code {}: {}",
            self.node_pub_key, self.code, self.message
        )
    }
}

impl std::error::Error for RelayError {}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PocketError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No dispatcher available")]
    NoDispatcherAvailable,

    #[error("Maximum number of sessions reached for this key")]
    MaxSessionsReached,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Node {0} is not part of the current session")]
    NodeNotInSession(String),

    #[error("No available session node")]
    NoAvailableSessionNode,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

impl From<serde_json::Error> for PocketError {
    fn from(e: serde_json::Error) -> Self {
        PocketError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PocketError>;
