use anyhow::Result;
use clap::Parser;
use gossip_broadcast::config::{AppConfig, Args, TransportKind};
use gossip_broadcast::node::service::NodeService;
use gossip_broadcast::node::types::NodeSettings;
use gossip_broadcast::topology::types::NodeId;
use gossip_broadcast::transport::http::HttpTransport;
use gossip_broadcast::transport::stdio::StdioTransport;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting gossip-broadcast v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&args)?;
    let settings = config.node_settings();

    match config.transport {
        TransportKind::Stdio => run_stdio(&settings).await,
        TransportKind::Http => run_http(&config, &settings).await,
    }
}

/// Logs go to stderr: stdout carries protocol messages in stdio mode.
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}

async fn run_stdio(settings: &NodeSettings) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // 1. Identity from the harness:
    let transport = StdioTransport::handshake(&mut lines, tokio::io::stdout()).await?;

    // 2. Node subsystems:
    let service = NodeService::start(transport.clone(), settings);

    // 3. Serve until stdin closes or a fatal error:
    let result = tokio::select! {
        result = transport.serve(lines, service.handler()) => result,
        _ = report_stats(&service) => Ok(()),
    };

    service.shutdown().await;
    result
}

async fn run_http(config: &AppConfig, settings: &NodeSettings) -> Result<()> {
    let node_id = NodeId::new(config.node_id.clone().unwrap_or_default());
    let peers = config.peer_addrs();
    info!("Peers: {:?}", peers);

    let transport = HttpTransport::new(node_id, peers, settings.send_timeout);
    let service = NodeService::start(transport.clone(), settings);

    info!("Press Ctrl+C to shutdown");

    let result = tokio::select! {
        result = transport.serve(config.listen, service.handler()) => result,
        _ = report_stats(&service) => Ok(()),
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    service.shutdown().await;
    result
}

async fn report_stats(service: &NodeService) {
    let mut interval = tokio::time::interval(STATS_INTERVAL);
    interval.tick().await;

    loop {
        interval.tick().await;
        let stats = service.stats().await;
        info!(
            "Node stats: {} values, active={} peers={} queued={} pending_flush={}",
            stats.values, stats.active, stats.peers, stats.queued, stats.pending_flush
        );
        info!(
            "  - propagation: sent={} failed={} dropped={}",
            stats.pool.sent, stats.pool.failed, stats.pool.dropped
        );
    }
}
