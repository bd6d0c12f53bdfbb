//! Topology Module
//!
//! Decides which peers this node gossips to. The harness delivers the full cluster
//! adjacency once; from it the node derives its `LocalPeerSet`.
//!
//! ## Derivations
//! - **Flat**: the neighbor list assigned to this node, verbatim.
//! - **Tree**: a BFS spanning tree rooted at the lexically smallest node id. The node's
//!   parent and children become its peers, bounding fan-out to O(1) on average.
//!
//! The peer set is computed exactly once. Later deliveries are acknowledged but ignored.

pub mod model;
pub mod spanning_tree;
pub mod types;
