//! Propagation Worker Pool
//!
//! Decouples the request path from network I/O to peers. Handlers and the anti-entropy
//! ticker only ever *enqueue* `PropagationJob`s; a fixed set of workers drains the queue
//! and performs best-effort sends.
//!
//! ## Architecture Overview
//! 1. **Queue**: a bounded multi-producer queue shared by all workers. When full, the
//!    `OverflowPolicy` decides between backpressure (`block`) and loss (`drop`).
//! 2. **Workers**: each pulls one job at a time and sends it under a timeout, so a slow
//!    peer occupies at most one worker for at most `send_timeout`.
//! 3. **Failure**: failed or timed-out sends are counted and dropped, never requeued.
//!    Anti-entropy resync is the durability backstop.
//!
//! ## Submodules
//! - **`types`**: job definitions, overflow policy and pool counters.
//! - **`queue`**: the bounded job queue and its shared receiver.
//! - **`pool`**: the worker lifecycle (start -> drain -> shutdown).

pub mod pool;
pub mod queue;
pub mod types;

#[cfg(test)]
mod tests;
