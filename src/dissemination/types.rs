use serde::{Deserialize, Serialize};
use std::fmt;

/// Which propagation discipline a node runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PropagationMode {
    /// Fan out to every peer as soon as a value is new.
    Direct,
    /// Log new values and flush them to every peer on the next tick.
    Batched,
    /// Direct fan-out plus batched flushes.
    #[default]
    Hybrid,
}

impl PropagationMode {
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct | Self::Hybrid)
    }

    pub fn is_batched(&self) -> bool {
        matches!(self, Self::Batched | Self::Hybrid)
    }
}

impl fmt::Display for PropagationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Batched => f.write_str("batched"),
            Self::Hybrid => f.write_str("hybrid"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: PropagationMode,
    /// Flush the whole value set every this many ticks. `0` disables resync.
    pub resync_every: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: PropagationMode::default(),
            resync_every: 10,
        }
    }
}
