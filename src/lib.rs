//! Gossip Broadcast Node Library
//!
//! This library crate defines the core modules of a best-effort multi-value broadcast node.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of loosely coupled subsystems, leaves first:
//!
//! - **`store`**: The deduplicated value set. Single source of truth for "have we seen this?"
//!   and for read replies.
//! - **`topology`**: The peer model. Derives the set of peers to gossip to, either as the flat
//!   neighbor list delivered by the harness or as a spanning tree computed locally (BFS).
//! - **`dissemination`**: Turns newly observed values into propagation jobs, either directly
//!   (fan-out on arrival) or lazily (anti-entropy batches on a timer), or both.
//! - **`executor`**: The worker pool. A bounded job queue drained by a fixed set of senders so
//!   the request path never waits on network I/O to peers.
//! - **`node`**: Wire protocol and request handlers (`broadcast`, `read`, `topology`, `flush`).
//! - **`transport`**: Pluggable message transports (Maelstrom stdio, HTTP, in-memory).
//! - **`config`** / **`error`**: Startup configuration and the error taxonomy.

pub mod config;
pub mod dissemination;
pub mod error;
pub mod executor;
pub mod node;
pub mod store;
pub mod topology;
pub mod transport;
