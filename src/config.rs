//! Configuration management.
//!
//! Settings are resolved in three layers: built-in defaults, then an optional TOML file
//! (`--config`), then command-line flags and their environment fallbacks.

use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::dissemination::types::PropagationMode;
use crate::error::ConfigError;
use crate::executor::types::OverflowPolicy;
use crate::node::types::{NodeSettings, default_workers};
use crate::topology::types::{NodeId, TopologyMode};

/// Gossip broadcast node
#[derive(Parser, Debug)]
#[command(name = "gossip-broadcast")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, env = "GOSSIP_CONFIG")]
    pub config: Option<String>,

    /// Message transport (overrides config)
    #[arg(long, value_enum, env = "GOSSIP_TRANSPORT")]
    pub transport: Option<TransportKind>,

    /// Node id, required for the http transport
    #[arg(long, env = "GOSSIP_NODE_ID")]
    pub node_id: Option<String>,

    /// HTTP listen address (overrides config)
    #[arg(short, long, env = "GOSSIP_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Peer address for the http transport, repeatable
    #[arg(long = "peer", value_name = "ID=ADDR", value_parser = parse_peer)]
    pub peers: Vec<(String, SocketAddr)>,

    #[arg(long, value_enum)]
    pub topology_mode: Option<TopologyMode>,

    #[arg(long, value_enum)]
    pub propagation: Option<PropagationMode>,

    /// Anti-entropy tick period in milliseconds
    #[arg(long)]
    pub flush_interval_ms: Option<u64>,

    /// Full-state resync every N ticks (0 disables)
    #[arg(long)]
    pub resync_every: Option<u64>,

    /// Number of propagation workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Bound on queued propagation jobs
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// What to do when the propagation queue is full
    #[arg(long, value_enum)]
    pub overflow: Option<OverflowPolicy>,

    /// Per-send timeout in milliseconds
    #[arg(long)]
    pub send_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    pub json_logs: bool,
}

fn parse_peer(s: &str) -> Result<(String, SocketAddr), String> {
    let (id, addr) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=ADDR, got '{}'", s))?;
    if id.is_empty() {
        return Err(format!("empty peer id in '{}'", s));
    }
    let addr = addr
        .parse()
        .map_err(|e| format!("invalid address '{}': {}", addr, e))?;
    Ok((id.to_string(), addr))
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Line-delimited JSON on stdin/stdout
    #[default]
    Stdio,
    /// `POST /message` between configured peers
    Http,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => f.write_str("stdio"),
            Self::Http => f.write_str("http"),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub transport: TransportKind,

    #[serde(default)]
    pub node_id: Option<String>,

    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Peer id to HTTP address
    #[serde(default)]
    pub peers: HashMap<String, SocketAddr>,

    #[serde(default)]
    pub topology_mode: TopologyMode,

    #[serde(default)]
    pub propagation: PropagationMode,

    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    #[serde(default = "default_resync_every")]
    pub resync_every: u64,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub overflow: OverflowPolicy,

    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            node_id: None,
            listen: default_listen(),
            peers: HashMap::new(),
            topology_mode: TopologyMode::default(),
            propagation: PropagationMode::default(),
            flush_interval_ms: default_flush_interval_ms(),
            resync_every: default_resync_every(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            overflow: OverflowPolicy::default(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7000))
}

fn default_flush_interval_ms() -> u64 {
    200
}

fn default_resync_every() -> u64 {
    10
}

fn default_queue_capacity() -> usize {
    4096
}

// 1 second
fn default_send_timeout_ms() -> u64 {
    1000
}

impl AppConfig {
    /// Load configuration from the `--config` file if given, with CLI overrides
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path);
                Self::from_source(config::File::with_name(path))?
            }
            None => Self::default(),
        };

        config.apply(args);
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration layered over the defaults.
    pub fn from_source<S>(source: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder().add_source(source).build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Applies the flags that were actually given.
    pub fn apply(&mut self, args: &Args) {
        if let Some(transport) = args.transport {
            self.transport = transport;
        }
        if let Some(ref node_id) = args.node_id {
            self.node_id = Some(node_id.clone());
        }
        if let Some(listen) = args.listen {
            self.listen = listen;
        }
        for (id, addr) in &args.peers {
            self.peers.insert(id.clone(), *addr);
        }
        if let Some(mode) = args.topology_mode {
            self.topology_mode = mode;
        }
        if let Some(mode) = args.propagation {
            self.propagation = mode;
        }
        if let Some(ms) = args.flush_interval_ms {
            self.flush_interval_ms = ms;
        }
        if let Some(n) = args.resync_every {
            self.resync_every = n;
        }
        if let Some(n) = args.workers {
            self.workers = n;
        }
        if let Some(n) = args.queue_capacity {
            self.queue_capacity = n;
        }
        if let Some(policy) = args.overflow {
            self.overflow = policy;
        }
        if let Some(ms) = args.send_timeout_ms {
            self.send_timeout_ms = ms;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport == TransportKind::Http && self.node_id.is_none() {
            return Err(ConfigError::Invalid(
                "the http transport requires a node id".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "flush interval must be positive".to_string(),
            ));
        }
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "send timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn node_settings(&self) -> NodeSettings {
        NodeSettings {
            topology_mode: self.topology_mode,
            propagation: self.propagation,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            resync_every: self.resync_every,
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            overflow: self.overflow,
            send_timeout: Duration::from_millis(self.send_timeout_ms),
        }
    }

    pub fn peer_addrs(&self) -> HashMap<NodeId, SocketAddr> {
        self.peers
            .iter()
            .map(|(id, addr)| (NodeId::new(id.as_str()), *addr))
            .collect()
    }
}
