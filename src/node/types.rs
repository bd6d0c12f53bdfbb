use serde::Serialize;
use std::time::Duration;

use crate::dissemination::types::PropagationMode;
use crate::executor::types::{OverflowPolicy, PoolStats};
use crate::topology::types::TopologyMode;

/// Runtime settings for one node, resolved from configuration.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub topology_mode: TopologyMode,
    pub propagation: PropagationMode,
    /// Period of the anti-entropy ticker.
    pub flush_interval: Duration,
    /// Full-state resync every this many ticks, `0` disables.
    pub resync_every: u64,
    pub workers: usize,
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
    pub send_timeout: Duration,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            topology_mode: TopologyMode::default(),
            propagation: PropagationMode::default(),
            flush_interval: Duration::from_millis(200),
            resync_every: 10,
            workers: default_workers(),
            queue_capacity: 4096,
            overflow: OverflowPolicy::default(),
            send_timeout: Duration::from_secs(1),
        }
    }
}

/// Two senders per available core.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        * 2
}

/// Periodic health report.
#[derive(Debug, Clone, Serialize)]
pub struct NodeStats {
    pub values: usize,
    pub active: bool,
    pub peers: usize,
    pub queued: usize,
    pub pending_flush: usize,
    pub pool: PoolStats,
}
