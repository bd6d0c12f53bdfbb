//! Error taxonomy for the broadcast node.
//!
//! Errors are split by blast radius: `TopologyError` and `ConfigError` abort startup,
//! `HandlerError` rejects a single inbound message, and `TransportError` / `QueueError`
//! are logged and dropped by the propagation path.

use thiserror::Error;

use crate::topology::types::NodeId;

/// Maelstrom error codes used in `error` replies.
pub mod codes {
    pub const NOT_SUPPORTED: u32 = 10;
    pub const TEMPORARILY_UNAVAILABLE: u32 = 11;
    pub const MALFORMED_REQUEST: u32 = 12;
    pub const CRASH: u32 = 13;
}

/// Fatal topology misconfiguration.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The delivered adjacency map has no entry for this node, so it cannot place itself.
    #[error("topology has no entry for node {0}")]
    MissingSelf(NodeId),
}

/// Rejection of a single inbound message.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("unsupported message type: {0}")]
    NotSupported(String),

    /// The message needs an established peer set and no topology has arrived yet.
    #[error("node has not received a topology yet")]
    Uninitialized,

    #[error(transparent)]
    Fatal(#[from] TopologyError),
}

impl HandlerError {
    /// Returns the wire error code for this rejection.
    pub fn code(&self) -> u32 {
        match self {
            Self::Malformed(_) => codes::MALFORMED_REQUEST,
            Self::NotSupported(_) => codes::NOT_SUPPORTED,
            Self::Uninitialized => codes::TEMPORARILY_UNAVAILABLE,
            Self::Fatal(_) => codes::CRASH,
        }
    }

    /// Returns true if the process must stop after reporting this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Failure of an outbound send. Never surfaced to the request that triggered propagation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timed out sending to {0}")]
    Timeout(NodeId),

    #[error("no route to peer {0}")]
    UnknownPeer(NodeId),

    #[error("peer {peer} replied with {reply}")]
    UnexpectedReply { peer: NodeId, reply: String },

    #[error("transport is closed")]
    Closed,

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Enqueue failure at the worker pool boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is at capacity and the overflow policy is `drop`.
    #[error("propagation queue is full")]
    Full,

    #[error("propagation queue is closed")]
    Closed,
}

/// Invalid or unreadable startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to load config file: {0}")]
    Load(#[from] config::ConfigError),
}
