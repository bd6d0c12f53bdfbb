//! Transport Module
//!
//! The node core is transport-agnostic: it consumes a `Transport` (identity, send, rpc) and
//! exposes a `MessageHandler`. Implementations:
//!
//! - **`stdio`**: line-delimited JSON on stdin/stdout, compatible with the Maelstrom harness.
//!   Identity arrives in the `init` message; replies are correlated by `in_reply_to`.
//! - **`http`**: one `POST /message` endpoint per node (axum), outbound calls via reqwest.
//!   Peer addresses come from configuration.
//! - **`memory`**: an in-process network for multi-node tests, with optional message loss.

pub mod http;
pub mod memory;
pub mod stdio;
pub mod types;
