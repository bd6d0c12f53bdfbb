//! Value Store Module
//!
//! A concurrency-safe, grow-only set of observed values. Every handler and the
//! dissemination engine go through the same `ValueStore`, so "is this value new?"
//! has exactly one answer per value across the whole node.
//!
//! ## Invariants
//! - **Monotone**: values are never removed; membership only grows.
//! - **Single synchronization point**: test-and-insert and snapshots take one lock, so a
//!   snapshot never observes a value mid-insertion.

pub mod types;
pub mod value_store;
