use std::collections::{BTreeSet, HashSet};
use tokio::sync::RwLock;

use super::types::Value;

/// The node-local set of every value observed so far.
#[derive(Debug, Default)]
pub struct ValueStore {
    values: RwLock<HashSet<Value>>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically tests and inserts `value`.
    ///
    /// Returns `true` if the value was previously unknown. A `true` result is the
    /// only trigger for propagation.
    pub async fn observe(&self, value: Value) -> bool {
        self.values.write().await.insert(value)
    }

    /// Observes a whole batch under one write lock.
    ///
    /// Returns the values that were new, in batch order, without duplicates.
    pub async fn observe_all<I>(&self, values: I) -> Vec<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut guard = self.values.write().await;
        let new: Vec<Value> = values
            .into_iter()
            .filter(|value| guard.insert(*value))
            .collect();
        new
    }

    /// Returns the current set, copied out under the read lock.
    pub async fn snapshot(&self) -> BTreeSet<Value> {
        self.values.read().await.iter().copied().collect()
    }

    pub async fn contains(&self, value: Value) -> bool {
        self.values.read().await.contains(&value)
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}
