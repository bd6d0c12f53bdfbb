use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::store::types::Value;
use crate::topology::types::NodeId;

/// Values waiting for the next anti-entropy flush.
///
/// Each value remembers the node it was first learned from so a batch is not sent straight
/// back to that node.
#[derive(Debug, Default)]
pub struct AntiEntropyLog {
    pending: Mutex<HashMap<Value, NodeId>>,
}

impl AntiEntropyLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, value: Value, origin: &NodeId) {
        self.pending
            .lock()
            .await
            .entry(value)
            .or_insert_with(|| origin.clone());
    }

    pub async fn record_all(&self, values: &[Value], origin: &NodeId) {
        let mut pending = self.pending.lock().await;
        for value in values {
            pending.entry(*value).or_insert_with(|| origin.clone());
        }
    }

    /// Swaps the log for an empty one and returns what it held.
    pub async fn drain(&self) -> HashMap<Value, NodeId> {
        std::mem::take(&mut *self.pending.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }
}
