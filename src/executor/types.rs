use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::node::protocol::Payload;
use crate::store::types::Value;
use crate::topology::types::NodeId;

/// What a job carries to its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobValues {
    /// Direct fan-out of one value, sent as a `broadcast` request.
    Single(Value),
    /// Anti-entropy batch, sent as a fire-and-forget `flush`.
    Batch(Vec<Value>),
}

/// One unit of outbound propagation work, consumed exactly once by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationJob {
    /// The peer this job is sent to.
    pub dest: NodeId,
    /// The node the values were learned from (the local node for ticker batches).
    pub origin: NodeId,
    pub values: JobValues,
}

impl PropagationJob {
    pub fn single(dest: NodeId, origin: NodeId, value: Value) -> Self {
        Self {
            dest,
            origin,
            values: JobValues::Single(value),
        }
    }

    pub fn batch(dest: NodeId, origin: NodeId, values: Vec<Value>) -> Self {
        Self {
            dest,
            origin,
            values: JobValues::Batch(values),
        }
    }

    /// The wire payload sent to `dest`.
    pub fn payload(&self) -> Payload {
        match &self.values {
            JobValues::Single(value) => Payload::Broadcast { message: *value },
            JobValues::Batch(values) => Payload::Flush {
                messages: values.clone(),
            },
        }
    }
}

/// What `enqueue` does when the queue is full.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Wait for capacity. The enqueuing handler is slowed down (backpressure).
    #[default]
    Block,
    /// Drop the job immediately and count it. Anti-entropy repairs the loss.
    Drop,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => f.write_str("block"),
            Self::Drop => f.write_str("drop"),
        }
    }
}

/// Shared counters for the queue and its workers.
#[derive(Debug, Default)]
pub struct PoolCounters {
    sent: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl PoolCounters {
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the pool counters.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct PoolStats {
    /// Jobs delivered (and acknowledged, for direct sends).
    pub sent: u64,
    /// Jobs that errored or timed out.
    pub failed: u64,
    /// Jobs rejected by a full queue under `OverflowPolicy::Drop`.
    pub dropped: u64,
}
