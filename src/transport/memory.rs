//! In-process network for multi-node tests.
//!
//! Nodes register their handlers with a shared `MemoryNetwork` and talk through
//! `MemoryTransport`s. A drop filter can discard chosen messages to simulate loss:
//! a dropped `send` vanishes silently, a dropped `rpc` times out.
//!
//! This is test tooling, not a production transport: the binary never builds one, and
//! only a network built with `recording` keeps delivered messages, for the life of the network.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::types::{MessageHandler, Transport};
use crate::error::TransportError;
use crate::node::protocol::Payload;
use crate::topology::types::NodeId;

/// One message that crossed the network.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub src: NodeId,
    pub dest: NodeId,
    pub payload: Payload,
}

/// Returns true for messages that should be lost.
pub type DropFilter = Box<dyn Fn(&Delivery) -> bool + Send + Sync>;

pub struct MemoryNetwork {
    handlers: DashMap<NodeId, Arc<dyn MessageHandler>>,
    drop_filter: Option<DropFilter>,
    /// `None` unless built with `recording`.
    deliveries: Option<Mutex<Vec<Delivery>>>,
    dropped: AtomicUsize,
}

impl MemoryNetwork {
    /// A lossless network.
    pub fn new() -> Arc<Self> {
        Self::build(None, false)
    }

    /// A lossless network that keeps a copy of every delivered message.
    pub fn recording() -> Arc<Self> {
        Self::build(None, true)
    }

    /// A network that loses every message `filter` selects.
    pub fn with_drop_filter<F>(filter: F) -> Arc<Self>
    where
        F: Fn(&Delivery) -> bool + Send + Sync + 'static,
    {
        Self::build(Some(Box::new(filter)), false)
    }

    fn build(drop_filter: Option<DropFilter>, record: bool) -> Arc<Self> {
        Arc::new(Self {
            handlers: DashMap::new(),
            drop_filter,
            deliveries: record.then(|| Mutex::new(Vec::new())),
            dropped: AtomicUsize::new(0),
        })
    }

    /// A transport that sends as `node_id`.
    pub fn transport(self: &Arc<Self>, node_id: NodeId) -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport {
            node_id,
            network: self.clone(),
        })
    }

    /// Routes messages for `node_id` to `handler`, replacing any previous registration.
    pub fn register(&self, node_id: NodeId, handler: Arc<dyn MessageHandler>) {
        self.handlers.insert(node_id, handler);
    }

    /// Every delivered (not dropped) message so far, in delivery order.
    ///
    /// Always empty unless the network was built with `recording`.
    pub async fn deliveries(&self) -> Vec<Delivery> {
        match &self.deliveries {
            Some(log) => log.lock().await.clone(),
            None => Vec::new(),
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    async fn deliver(
        &self,
        src: &NodeId,
        dest: &NodeId,
        payload: Payload,
    ) -> Result<Option<Payload>, TransportError> {
        let delivery = Delivery {
            src: src.clone(),
            dest: dest.clone(),
            payload,
        };

        if let Some(filter) = &self.drop_filter
            && filter(&delivery)
        {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Dropped {} from {} to {}", delivery.payload.kind(), src, dest);
            return Err(TransportError::Timeout(dest.clone()));
        }

        // Clone the handler out so no map shard is held across the await
        let handler = self
            .handlers
            .get(dest)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::UnknownPeer(dest.clone()))?;

        let payload = delivery.payload.clone();
        if let Some(log) = &self.deliveries {
            log.lock().await.push(delivery);
        }

        handler
            .handle(src, payload)
            .await
            .map_err(|e| TransportError::UnexpectedReply {
                peer: dest.clone(),
                reply: e.to_string(),
            })
    }
}

pub struct MemoryTransport {
    node_id: NodeId,
    network: Arc<MemoryNetwork>,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    async fn send(&self, dest: &NodeId, payload: Payload) -> Result<(), TransportError> {
        match self.network.deliver(&self.node_id, dest, payload).await {
            Ok(_) => Ok(()),
            // A lost one-way message looks like success to the sender
            Err(TransportError::Timeout(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn rpc(&self, dest: &NodeId, payload: Payload) -> Result<Payload, TransportError> {
        self.network
            .deliver(&self.node_id, dest, payload)
            .await?
            .ok_or_else(|| TransportError::UnexpectedReply {
                peer: dest.clone(),
                reply: "no reply".to_string(),
            })
    }
}
