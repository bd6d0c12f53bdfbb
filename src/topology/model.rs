use tokio::sync::RwLock;

use super::spanning_tree::SpanningTree;
use super::types::{LocalPeerSet, NodeId, Topology, TopologyMode};
use crate::error::TopologyError;

/// Owns this node's view of the cluster and the peer set derived from it.
///
/// `None` inside the lock means the node is still Uninitialized. The first valid topology
/// moves it to Active for the rest of the process lifetime.
pub struct TopologyModel {
    local_id: NodeId,
    mode: TopologyMode,
    peers: RwLock<Option<LocalPeerSet>>,
}

impl TopologyModel {
    pub fn new(local_id: NodeId, mode: TopologyMode) -> Self {
        Self {
            local_id,
            mode,
            peers: RwLock::new(None),
        }
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    pub fn mode(&self) -> TopologyMode {
        self.mode
    }

    /// Derives the local peer set from a full adjacency map.
    ///
    /// Returns `Ok(true)` if the peer set was established by this call and `Ok(false)` if
    /// it was already established (the delivery is ignored). A map without an entry for
    /// this node is a fatal misconfiguration.
    pub async fn set_topology(&self, topology: &Topology) -> Result<bool, TopologyError> {
        let mut guard = self.peers.write().await;

        if guard.is_some() {
            tracing::debug!("Topology already established, ignoring re-delivery");
            return Ok(false);
        }

        let neighbors = topology
            .get(&self.local_id)
            .ok_or_else(|| TopologyError::MissingSelf(self.local_id.clone()))?;

        let peer_set = match self.mode {
            TopologyMode::Flat => LocalPeerSet::flat(neighbors, &self.local_id),
            TopologyMode::Tree => self.tree_peers(topology, neighbors),
        };

        tracing::info!(
            "Topology established ({} mode): parent={:?} peers={:?}",
            self.mode,
            peer_set.parent,
            peer_set.peers
        );

        *guard = Some(peer_set);
        Ok(true)
    }

    fn tree_peers(&self, topology: &Topology, neighbors: &[NodeId]) -> LocalPeerSet {
        match SpanningTree::build(topology) {
            Some(tree) if tree.contains(&self.local_id) => LocalPeerSet::tree(
                tree.parent_of(&self.local_id).cloned(),
                tree.children_of(&self.local_id).to_vec(),
            ),
            _ => {
                // Disconnected from the root: the tree cannot reach us, so keep our direct
                // neighbors instead of going silent.
                tracing::warn!(
                    "Node {} is not reachable from the spanning tree root, using flat neighbors",
                    self.local_id
                );
                LocalPeerSet::flat(neighbors, &self.local_id)
            }
        }
    }

    /// Returns true once a topology has been accepted.
    pub async fn is_active(&self) -> bool {
        self.peers.read().await.is_some()
    }

    /// Copy of the current peer set, `None` while Uninitialized.
    pub async fn local_peers(&self) -> Option<LocalPeerSet> {
        self.peers.read().await.clone()
    }

    /// Copy of the peer list. Empty while Uninitialized.
    pub async fn peers(&self) -> Vec<NodeId> {
        self.peers
            .read()
            .await
            .as_ref()
            .map(|set| set.peers.clone())
            .unwrap_or_default()
    }

    /// Copy of the peer list without `origin`, used to avoid echoing a value back.
    pub async fn peers_except(&self, origin: &NodeId) -> Vec<NodeId> {
        self.peers
            .read()
            .await
            .as_ref()
            .map(|set| {
                set.peers
                    .iter()
                    .filter(|peer| *peer != origin)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
