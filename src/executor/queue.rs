//! Bounded Propagation Queue
//!
//! A tokio `mpsc` channel whose receiver is shared by every worker behind a mutex.
//! Only one worker waits on the channel at a time; the others wait on the lock.

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use super::types::{OverflowPolicy, PoolCounters, PropagationJob};
use crate::error::QueueError;

/// Creates a queue with room for `capacity` jobs.
pub fn channel(capacity: usize, policy: OverflowPolicy) -> (JobQueue, JobReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    let counters = Arc::new(PoolCounters::default());

    (
        JobQueue {
            sender,
            policy,
            counters: counters.clone(),
        },
        JobReceiver {
            inner: Arc::new(Mutex::new(receiver)),
            counters,
        },
    )
}

/// Producer side, held by the dissemination engine.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<PropagationJob>,
    policy: OverflowPolicy,
    counters: Arc<PoolCounters>,
}

impl JobQueue {
    /// Enqueues a job according to the overflow policy.
    ///
    /// Under `Block` this waits for capacity; under `Drop` a full queue returns
    /// `QueueError::Full` and the job is counted as dropped.
    pub async fn enqueue(&self, job: PropagationJob) -> Result<(), QueueError> {
        match self.policy {
            OverflowPolicy::Block => self
                .sender
                .send(job)
                .await
                .map_err(|_| QueueError::Closed),
            OverflowPolicy::Drop => match self.sender.try_send(job) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(job)) => {
                    self.counters.record_dropped();
                    tracing::warn!(
                        "Propagation queue full, dropping job for {} ({} queued)",
                        job.dest,
                        self.len()
                    );
                    Err(QueueError::Full)
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(QueueError::Closed),
            },
        }
    }

    /// Number of jobs currently waiting.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counters(&self) -> Arc<PoolCounters> {
        self.counters.clone()
    }
}

/// Consumer side, cloned into every worker.
#[derive(Clone)]
pub struct JobReceiver {
    inner: Arc<Mutex<mpsc::Receiver<PropagationJob>>>,
    counters: Arc<PoolCounters>,
}

impl JobReceiver {
    /// Waits for the next job. `None` once every producer is gone and the queue is empty.
    pub async fn recv(&self) -> Option<PropagationJob> {
        self.inner.lock().await.recv().await
    }

    /// Takes a job if one is ready and no worker currently holds the receiver.
    pub fn try_recv(&self) -> Option<PropagationJob> {
        let mut receiver = self.inner.try_lock().ok()?;
        receiver.try_recv().ok()
    }

    pub fn counters(&self) -> Arc<PoolCounters> {
        self.counters.clone()
    }
}
