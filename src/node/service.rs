//! Node Service
//!
//! Assembles one node: value store, topology model, job queue, worker pool, dissemination
//! engine and anti-entropy task, all bound to a single transport.

use std::sync::Arc;

use super::handlers::BroadcastNode;
use super::types::{NodeSettings, NodeStats};
use crate::dissemination::engine::DisseminationEngine;
use crate::dissemination::ticker::{AntiEntropyTask, IntervalTicker, Ticker};
use crate::dissemination::types::EngineConfig;
use crate::executor::pool::{PoolConfig, WorkerPool};
use crate::executor::queue::{self, JobQueue};
use crate::store::value_store::ValueStore;
use crate::topology::model::TopologyModel;
use crate::transport::types::{MessageHandler, Transport};

pub struct NodeService {
    node: Arc<BroadcastNode>,
    store: Arc<ValueStore>,
    topology: Arc<TopologyModel>,
    engine: Arc<DisseminationEngine>,
    queue: JobQueue,
    pool: WorkerPool,
    anti_entropy: Option<AntiEntropyTask>,
}

impl NodeService {
    /// Starts a node whose anti-entropy runs on the wall clock.
    pub fn start(transport: Arc<dyn Transport>, settings: &NodeSettings) -> Self {
        let ticker = IntervalTicker::new(settings.flush_interval);
        Self::start_with_ticker(transport, settings, ticker)
    }

    /// Starts a node whose anti-entropy is driven by `ticker`.
    pub fn start_with_ticker<T>(
        transport: Arc<dyn Transport>,
        settings: &NodeSettings,
        ticker: T,
    ) -> Self
    where
        T: Ticker + 'static,
    {
        let local_id = transport.node_id().clone();
        tracing::info!(
            "Starting node {} (topology={}, propagation={}, workers={}, queue={} {})",
            local_id,
            settings.topology_mode,
            settings.propagation,
            settings.workers,
            settings.queue_capacity,
            settings.overflow
        );

        let store = Arc::new(ValueStore::new());
        let topology = Arc::new(TopologyModel::new(local_id, settings.topology_mode));
        let (queue, receiver) = queue::channel(settings.queue_capacity, settings.overflow);

        let engine = Arc::new(DisseminationEngine::new(
            EngineConfig {
                mode: settings.propagation,
                resync_every: settings.resync_every,
            },
            topology.clone(),
            store.clone(),
            queue.clone(),
        ));

        let pool = WorkerPool::start(
            receiver,
            transport,
            PoolConfig {
                workers: settings.workers,
                send_timeout: settings.send_timeout,
            },
        );

        let anti_entropy = if settings.propagation.is_batched() || settings.resync_every > 0 {
            Some(AntiEntropyTask::start(engine.clone(), ticker))
        } else {
            tracing::info!("Anti-entropy disabled (direct mode without resync)");
            None
        };

        let node = Arc::new(BroadcastNode::new(
            store.clone(),
            topology.clone(),
            engine.clone(),
        ));

        Self {
            node,
            store,
            topology,
            engine,
            queue,
            pool,
            anti_entropy,
        }
    }

    /// The node as the transport-facing inbound handler.
    pub fn handler(&self) -> Arc<dyn MessageHandler> {
        self.node.clone()
    }

    pub async fn stats(&self) -> NodeStats {
        NodeStats {
            values: self.store.len().await,
            active: self.topology.is_active().await,
            peers: self.topology.peers().await.len(),
            queued: self.queue.len(),
            pending_flush: self.engine.pending().await,
            pool: self.pool.stats(),
        }
    }

    /// Stops anti-entropy, then the workers.
    pub async fn shutdown(self) {
        if let Some(task) = self.anti_entropy {
            task.stop().await;
        }
        self.pool.shutdown().await;
        tracing::info!("Node {} shut down", self.node.local_id());
    }
}
