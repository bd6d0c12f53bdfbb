//! Dissemination Engine Module
//!
//! Turns newly observed values into propagation jobs for the worker pool.
//!
//! ## Disciplines
//! - **Direct**: on arrival, one job per peer (except the one the value came from).
//! - **Batched**: on arrival, the value goes into the anti-entropy log. Each tick drains the
//!   log into one `flush` batch per peer.
//! - **Hybrid**: both. Direct sends give latency, ticks repair lost sends.
//!
//! Every few ticks (`resync_every`) the full value set is flushed to all peers regardless of
//! mode, so values whose sends were all lost are still swept out eventually.
//!
//! The engine only ever enqueues. Ticks are driven by an injected `Ticker`, so tests can
//! step anti-entropy deterministically.

pub mod engine;
pub mod log;
pub mod ticker;
pub mod types;
