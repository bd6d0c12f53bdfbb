use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::log::AntiEntropyLog;
use super::types::{EngineConfig, PropagationMode};
use crate::error::QueueError;
use crate::executor::queue::JobQueue;
use crate::executor::types::PropagationJob;
use crate::store::types::Value;
use crate::store::value_store::ValueStore;
use crate::topology::model::TopologyModel;
use crate::topology::types::NodeId;

/// Converts new values into queued propagation work.
///
/// Callers must only hand in values for which `ValueStore::observe` just returned `true`;
/// the engine itself never checks novelty.
pub struct DisseminationEngine {
    local_id: NodeId,
    config: EngineConfig,
    topology: Arc<TopologyModel>,
    store: Arc<ValueStore>,
    log: AntiEntropyLog,
    queue: JobQueue,
    ticks: AtomicU64,
}

impl DisseminationEngine {
    pub fn new(
        config: EngineConfig,
        topology: Arc<TopologyModel>,
        store: Arc<ValueStore>,
        queue: JobQueue,
    ) -> Self {
        Self {
            local_id: topology.local_id().clone(),
            config,
            topology,
            store,
            log: AntiEntropyLog::new(),
            queue,
            ticks: AtomicU64::new(0),
        }
    }

    pub fn mode(&self) -> PropagationMode {
        self.config.mode
    }

    /// Number of values waiting for the next batch flush.
    pub async fn pending(&self) -> usize {
        self.log.len().await
    }

    /// Propagates one newly observed value that arrived from `origin`.
    ///
    /// Returns the number of jobs enqueued right away.
    pub async fn propagate(&self, value: Value, origin: &NodeId) -> usize {
        let mut enqueued = 0;

        if self.config.mode.is_direct() {
            for peer in self.topology.peers_except(origin).await {
                let job = PropagationJob::single(peer, origin.clone(), value);
                if self.enqueue(job).await {
                    enqueued += 1;
                }
            }
        }

        if self.config.mode.is_batched() {
            self.log.record(value, origin).await;
        }

        tracing::debug!(
            "Propagating {} from {}: {} direct jobs",
            value,
            origin,
            enqueued
        );
        enqueued
    }

    /// Propagates the new part of a received batch.
    ///
    /// Direct fan-out is coalesced into one batch per peer rather than one job per value.
    pub async fn propagate_batch(&self, values: &[Value], origin: &NodeId) -> usize {
        if values.is_empty() {
            return 0;
        }

        let mut enqueued = 0;

        if self.config.mode.is_direct() {
            for peer in self.topology.peers_except(origin).await {
                let job = PropagationJob::batch(peer, origin.clone(), values.to_vec());
                if self.enqueue(job).await {
                    enqueued += 1;
                }
            }
        }

        if self.config.mode.is_batched() {
            self.log.record_all(values, origin).await;
        }

        tracing::debug!(
            "Propagating batch of {} from {}: {} direct jobs",
            values.len(),
            origin,
            enqueued
        );
        enqueued
    }

    /// One anti-entropy round. Returns the number of jobs enqueued.
    ///
    /// - Every `resync_every`-th tick flushes the whole value set to every peer.
    /// - Otherwise, in batched modes, the log is drained and flushed.
    /// - With no peers the log is discarded: there is nobody to flush it to.
    pub async fn tick(&self) -> usize {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;

        let peers = self.topology.peers().await;
        if peers.is_empty() {
            let discarded = self.log.drain().await.len();
            tracing::trace!(
                "Anti-entropy tick {}: no peers, discarded {} pending values",
                tick,
                discarded
            );
            return 0;
        }

        let resync = self.config.resync_every > 0 && tick % self.config.resync_every == 0;

        if resync {
            self.resync(&peers).await
        } else if self.config.mode.is_batched() {
            self.flush_log(&peers).await
        } else {
            0
        }
    }

    async fn flush_log(&self, peers: &[NodeId]) -> usize {
        let pending = self.log.drain().await;
        if pending.is_empty() {
            return 0;
        }

        let mut enqueued = 0;
        for peer in peers {
            let mut batch: Vec<Value> = pending
                .iter()
                .filter(|(_, origin)| *origin != peer)
                .map(|(value, _)| *value)
                .collect();

            if batch.is_empty() {
                continue;
            }
            batch.sort();

            let job = PropagationJob::batch(peer.clone(), self.local_id.clone(), batch);
            if self.enqueue(job).await {
                enqueued += 1;
            }
        }

        tracing::debug!(
            "Flushed {} pending values in {} batches",
            pending.len(),
            enqueued
        );
        enqueued
    }

    async fn resync(&self, peers: &[NodeId]) -> usize {
        // The snapshot is a superset of anything logged
        self.log.drain().await;

        let values: Vec<Value> = self.store.snapshot().await.into_iter().collect();
        if values.is_empty() {
            return 0;
        }

        let mut enqueued = 0;
        for peer in peers {
            let job = PropagationJob::batch(peer.clone(), self.local_id.clone(), values.clone());
            if self.enqueue(job).await {
                enqueued += 1;
            }
        }

        tracing::debug!(
            "Resynced {} values to {} peers",
            values.len(),
            enqueued
        );
        enqueued
    }

    async fn enqueue(&self, job: PropagationJob) -> bool {
        match self.queue.enqueue(job).await {
            Ok(()) => true,
            // Already counted and logged by the queue
            Err(QueueError::Full) => false,
            Err(QueueError::Closed) => {
                tracing::warn!("Propagation queue closed, job discarded");
                false
            }
        }
    }
}
