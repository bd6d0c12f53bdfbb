use async_trait::async_trait;

use crate::error::{HandlerError, TransportError};
use crate::node::protocol::Payload;
use crate::topology::types::NodeId;

/// Outbound half of a transport, as seen by the worker pool.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stable identity of the local node.
    fn node_id(&self) -> &NodeId;

    /// Fire-and-forget send.
    async fn send(&self, dest: &NodeId, payload: Payload) -> Result<(), TransportError>;

    /// Sends a request and waits for the correlated reply.
    async fn rpc(&self, dest: &NodeId, payload: Payload) -> Result<Payload, TransportError>;
}

/// Inbound half: what a transport calls for every decoded request.
///
/// `Ok(None)` means the message kind takes no reply (e.g. `flush`).
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, src: &NodeId, payload: Payload)
    -> Result<Option<Payload>, HandlerError>;
}
