//! Worker Pool Implementation
//!
//! Spawns a fixed number of workers that drain the propagation queue.
//!
//! ## Responsibilities
//! - **Draining**: each worker pulls one `PropagationJob` at a time.
//! - **Sending**: direct jobs are sent as `broadcast` requests and must be acknowledged;
//!   batches are sent as fire-and-forget `flush` messages.
//! - **Bounding**: every send runs under `send_timeout`. Failures are logged and dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::queue::JobReceiver;
use super::types::{JobValues, PoolCounters, PoolStats, PropagationJob};
use crate::error::TransportError;
use crate::node::protocol::Payload;
use crate::transport::types::Transport;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of concurrent senders.
    pub workers: usize,
    /// Upper bound on a single send, including the wait for an acknowledgment.
    pub send_timeout: Duration,
}

/// The running set of propagation workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    /// Spawns `config.workers` workers and returns immediately.
    pub fn start(receiver: JobReceiver, transport: Arc<dyn Transport>, config: PoolConfig) -> Self {
        tracing::info!(
            "Starting {} propagation workers (send timeout {:?})",
            config.workers,
            config.send_timeout
        );

        let (shutdown, _) = watch::channel(false);
        let counters = receiver.counters();

        let handles = (0..config.workers)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    receiver: receiver.clone(),
                    transport: transport.clone(),
                    send_timeout: config.send_timeout,
                    counters: counters.clone(),
                };
                let shutdown = shutdown.subscribe();
                tokio::spawn(async move {
                    worker.run(shutdown).await;
                })
            })
            .collect();

        Self {
            handles,
            shutdown,
            counters,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Signals every worker to stop and waits for them.
    ///
    /// A worker finishes the send it is performing; jobs still queued are abandoned.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);

        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!("Propagation worker ended abnormally: {}", e);
            }
        }

        tracing::info!("Propagation workers stopped");
    }
}

struct Worker {
    id: usize,
    receiver: JobReceiver,
    transport: Arc<dyn Transport>,
    send_timeout: Duration,
    counters: Arc<PoolCounters>,
}

impl Worker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!("Propagation worker {} started", self.id);

        loop {
            let job = tokio::select! {
                _ = shutdown.changed() => break,
                job = self.receiver.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            self.deliver(job).await;
        }

        tracing::debug!("Propagation worker {} stopped", self.id);
    }

    async fn deliver(&self, job: PropagationJob) {
        match tokio::time::timeout(self.send_timeout, self.send(&job)).await {
            Ok(Ok(())) => {
                self.counters.record_sent();
                tracing::trace!("Worker {} propagated {:?} to {}", self.id, job.values, job.dest);
            }
            Ok(Err(e)) => {
                self.counters.record_failed();
                tracing::warn!("Worker {} failed to propagate to {}: {}", self.id, job.dest, e);
            }
            Err(_) => {
                self.counters.record_failed();
                tracing::warn!(
                    "Worker {} timed out propagating to {} after {:?}",
                    self.id,
                    job.dest,
                    self.send_timeout
                );
            }
        }
    }

    async fn send(&self, job: &PropagationJob) -> Result<(), TransportError> {
        match &job.values {
            JobValues::Single(_) => match self.transport.rpc(&job.dest, job.payload()).await? {
                Payload::BroadcastOk => Ok(()),
                other => Err(TransportError::UnexpectedReply {
                    peer: job.dest.clone(),
                    reply: other.kind().to_string(),
                }),
            },
            JobValues::Batch(_) => self.transport.send(&job.dest, job.payload()).await,
        }
    }
}
