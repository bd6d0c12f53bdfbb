use async_trait::async_trait;
use std::sync::Arc;

use super::protocol::Payload;
use crate::dissemination::engine::DisseminationEngine;
use crate::error::HandlerError;
use crate::store::types::Value;
use crate::store::value_store::ValueStore;
use crate::topology::model::TopologyModel;
use crate::topology::types::{NodeId, Topology};
use crate::transport::types::MessageHandler;

/// Maps inbound protocol messages onto the store, the topology and the engine.
pub struct BroadcastNode {
    local_id: NodeId,
    store: Arc<ValueStore>,
    topology: Arc<TopologyModel>,
    engine: Arc<DisseminationEngine>,
}

impl BroadcastNode {
    pub fn new(
        store: Arc<ValueStore>,
        topology: Arc<TopologyModel>,
        engine: Arc<DisseminationEngine>,
    ) -> Self {
        Self {
            local_id: topology.local_id().clone(),
            store,
            topology,
            engine,
        }
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    /// `broadcast`: observe, propagate if new, always acknowledge.
    pub async fn handle_broadcast(
        &self,
        src: &NodeId,
        value: Value,
    ) -> Result<Payload, HandlerError> {
        if !self.topology.is_active().await {
            return Err(HandlerError::Uninitialized);
        }

        if self.store.observe(value).await {
            tracing::debug!("New value {} from {}", value, src);
            self.engine.propagate(value, src).await;
        } else {
            tracing::trace!("Duplicate value {} from {}", value, src);
        }

        Ok(Payload::BroadcastOk)
    }

    /// `read`: the current value set.
    pub async fn handle_read(&self) -> Payload {
        Payload::ReadOk {
            messages: self.store.snapshot().await,
        }
    }

    /// `topology`: establish the peer set once, acknowledge every delivery.
    pub async fn handle_topology(&self, topology: &Topology) -> Result<Payload, HandlerError> {
        if self.topology.set_topology(topology).await? {
            tracing::info!("Node {} is now active", self.local_id);
        }
        Ok(Payload::TopologyOk)
    }

    /// `flush`: observe the batch, re-propagate whatever was new. Never answered.
    pub async fn handle_flush(&self, src: &NodeId, values: Vec<Value>) -> Result<(), HandlerError> {
        if !self.topology.is_active().await {
            return Err(HandlerError::Uninitialized);
        }

        let received = values.len();
        let new = self.store.observe_all(values).await;

        tracing::debug!(
            "Flush from {}: {} values, {} new",
            src,
            received,
            new.len()
        );

        if !new.is_empty() {
            self.engine.propagate_batch(&new, src).await;
        }
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for BroadcastNode {
    async fn handle(
        &self,
        src: &NodeId,
        payload: Payload,
    ) -> Result<Option<Payload>, HandlerError> {
        match payload {
            Payload::Broadcast { message } => self.handle_broadcast(src, message).await.map(Some),
            Payload::Read => Ok(Some(self.handle_read().await)),
            Payload::Topology { topology } => self.handle_topology(&topology).await.map(Some),
            Payload::Flush { messages } => self.handle_flush(src, messages).await.map(|_| None),
            other => Err(HandlerError::NotSupported(other.kind().to_string())),
        }
    }
}
