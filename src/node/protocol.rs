//! Wire Protocol
//!
//! Maelstrom-style envelopes: `{"src": .., "dest": .., "body": {"type": .., ..}}`.
//! Requests carry a `msg_id`; replies carry `in_reply_to` pointing back at it.
//!
//! `broadcast` is used both for client announcements and for peer-to-peer propagation.
//! The receiving handler does not need to tell them apart: the envelope's `src` is the
//! originator either way, and clients are never in a peer set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::HandlerError;
use crate::store::types::Value;
use crate::topology::types::{NodeId, Topology};

/// Message kinds this node can decode.
pub const KNOWN_TYPES: &[&str] = &[
    "init",
    "init_ok",
    "broadcast",
    "broadcast_ok",
    "read",
    "read_ok",
    "topology",
    "topology_ok",
    "flush",
    "error",
];

/// A routed message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<B> {
    pub src: NodeId,
    pub dest: NodeId,
    pub body: B,
}

/// A fully decoded message.
pub type Message = Envelope<Body>;

/// A message whose body has not been validated yet.
pub type RawMessage = Envelope<serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Body {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,

    #[serde(flatten)]
    pub payload: Payload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Identity delivery from the harness.
    Init {
        node_id: NodeId,
        node_ids: Vec<NodeId>,
    },
    InitOk,

    /// Announce (from a client) or propagate (from a peer) one value.
    Broadcast {
        message: Value,
    },
    BroadcastOk,

    Read,
    ReadOk {
        messages: BTreeSet<Value>,
    },

    Topology {
        topology: Topology,
    },
    TopologyOk,

    /// Anti-entropy batch. Fire-and-forget, never answered.
    Flush {
        messages: Vec<Value>,
    },

    Error {
        code: u32,
        text: String,
    },
}

impl Payload {
    /// The wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::InitOk => "init_ok",
            Self::Broadcast { .. } => "broadcast",
            Self::BroadcastOk => "broadcast_ok",
            Self::Read => "read",
            Self::ReadOk { .. } => "read_ok",
            Self::Topology { .. } => "topology",
            Self::TopologyOk => "topology_ok",
            Self::Flush { .. } => "flush",
            Self::Error { .. } => "error",
        }
    }

    pub fn error(err: &HandlerError) -> Self {
        Self::Error {
            code: err.code(),
            text: err.to_string(),
        }
    }
}

impl Body {
    pub fn new(payload: Payload) -> Self {
        Self {
            msg_id: None,
            in_reply_to: None,
            payload,
        }
    }

    /// Validates a raw body.
    ///
    /// Unknown `type` tags are `NotSupported`; known tags with bad fields are `Malformed`.
    pub fn decode(raw: serde_json::Value) -> Result<Self, HandlerError> {
        let kind = raw
            .get("type")
            .and_then(|kind| kind.as_str())
            .ok_or_else(|| HandlerError::Malformed("missing message type".to_string()))?;

        if !KNOWN_TYPES.contains(&kind) {
            return Err(HandlerError::NotSupported(kind.to_string()));
        }

        serde_json::from_value(raw).map_err(|e| HandlerError::Malformed(e.to_string()))
    }
}

/// Reads `msg_id` from a body that may not decode, so even rejections can be answered.
pub fn request_id(raw: &serde_json::Value) -> Option<u64> {
    raw.get("msg_id").and_then(|id| id.as_u64())
}

/// Reads `in_reply_to` from a raw body.
pub fn reply_id(raw: &serde_json::Value) -> Option<u64> {
    raw.get("in_reply_to").and_then(|id| id.as_u64())
}
