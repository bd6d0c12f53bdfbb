//! Spanning Tree Construction
//!
//! Breadth-first traversal over the delivered adjacency, rooted at the lexically smallest
//! node id. Every node in the cluster computes the same tree from the same map, so parent
//! and child relationships agree without any coordination.

use std::collections::{HashMap, HashSet, VecDeque};

use super::types::{NodeId, Topology};

/// A BFS spanning tree over a cluster topology.
#[derive(Debug, Clone)]
pub struct SpanningTree {
    root: NodeId,
    parents: HashMap<NodeId, NodeId>,
    children: HashMap<NodeId, Vec<NodeId>>,
    /// Nodes in visit order, root first.
    order: Vec<NodeId>,
}

impl SpanningTree {
    /// Builds the tree. Returns `None` for an empty topology.
    ///
    /// Neighbors are visited in the order they are listed, so the result is fully
    /// determined by the map contents. Nodes unreachable from the root are left out.
    pub fn build(topology: &Topology) -> Option<Self> {
        let root = topology.keys().min()?.clone();

        let mut parents: HashMap<NodeId, NodeId> = HashMap::new();
        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut order = Vec::with_capacity(topology.len());
        let mut queue = VecDeque::new();

        visited.insert(root.clone());
        queue.push_back(root.clone());

        while let Some(node) = queue.pop_front() {
            if let Some(neighbors) = topology.get(&node) {
                for neighbor in neighbors {
                    if visited.insert(neighbor.clone()) {
                        parents.insert(neighbor.clone(), node.clone());
                        children
                            .entry(node.clone())
                            .or_default()
                            .push(neighbor.clone());
                        queue.push_back(neighbor.clone());
                    }
                }
            }
            order.push(node);
        }

        tracing::debug!(
            "Built spanning tree rooted at {} covering {} of {} nodes",
            root,
            order.len(),
            topology.len()
        );

        Some(Self {
            root,
            parents,
            children,
            order,
        })
    }

    pub fn root(&self) -> &NodeId {
        &self.root
    }

    pub fn parent_of(&self, node: &NodeId) -> Option<&NodeId> {
        self.parents.get(node)
    }

    /// Children of `node` in visit order.
    pub fn children_of(&self, node: &NodeId) -> &[NodeId] {
        self.children.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        node == &self.root || self.parents.contains_key(node)
    }

    /// All nodes in BFS order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.order
    }

    /// Tree edges as `(parent, child)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&NodeId, &NodeId)> {
        self.parents.iter().map(|(child, parent)| (parent, child))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
