use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a cluster member, assigned by the harness (e.g. `n1`, or `c3` for clients).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Full cluster adjacency: node id -> ordered neighbor list.
pub type Topology = HashMap<NodeId, Vec<NodeId>>;

/// How the local peer set is derived from the delivered topology.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TopologyMode {
    /// Use the neighbor list assigned to this node.
    Flat,
    /// Use parent and children in a BFS spanning tree over the whole cluster.
    #[default]
    Tree,
}

impl fmt::Display for TopologyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => f.write_str("flat"),
            Self::Tree => f.write_str("tree"),
        }
    }
}

/// The peers this node actively propagates to.
///
/// In tree mode `parent` is the node's parent in the spanning tree (`None` at the root) and
/// `peers` holds the parent followed by the children. In flat mode `parent` is always `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalPeerSet {
    pub parent: Option<NodeId>,
    pub peers: Vec<NodeId>,
}

impl LocalPeerSet {
    pub fn flat(neighbors: &[NodeId], local_id: &NodeId) -> Self {
        let mut peers: Vec<NodeId> = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            if neighbor != local_id && !peers.contains(neighbor) {
                peers.push(neighbor.clone());
            }
        }

        Self {
            parent: None,
            peers,
        }
    }

    pub fn tree(parent: Option<NodeId>, children: Vec<NodeId>) -> Self {
        let peers = parent.iter().cloned().chain(children).collect();
        Self { parent, peers }
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.peers.contains(node)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
