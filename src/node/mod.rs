//! Broadcast Node Module
//!
//! The request-handling surface of the node and the service that wires the subsystems
//! together.
//!
//! ## Request Flow
//! 1. A transport decodes an inbound message and calls `BroadcastNode::handle`.
//! 2. The handler mutates the `ValueStore` and/or `TopologyModel`.
//! 3. New values are handed to the `DisseminationEngine`, which only enqueues jobs.
//! 4. The reply goes back immediately; workers propagate in the background.
//!
//! ## Lifecycle
//! A node starts **Uninitialized** and becomes **Active** on its first valid topology.
//! While Uninitialized, `read` answers with what is known (normally nothing) and
//! `broadcast` / `flush` are rejected as temporarily unavailable.

pub mod handlers;
pub mod protocol;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;
