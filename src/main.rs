use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use boxbox::sink::LineProtocolSink;
use boxbox::{Collector, Config, Driver, ReplayProvider, UdpProvider};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Decode F1 UDP telemetry and write lap, sector and live points as line protocol.
#[derive(Parser, Debug)]
#[command(name = "boxbox", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "BOXBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Override the UDP listen address
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Override the wire-format specification file
    #[arg(long)]
    spec: Option<PathBuf>,

    /// Replay a datagram capture instead of listening on UDP
    #[arg(long, value_name = "CAPTURE")]
    replay: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Points go to stdout, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(spec) = cli.spec {
        config.spec = Some(spec);
    }
    config.validate()?;

    let sink = LineProtocolSink::new(std::io::stdout(), &config.sink);
    let collector = Collector::from_config(&config, sink).context("compiling wire-format specification")?;
    info!(bucket = %config.sink.bucket, packet_format = config.packet_format, "Collector ready");

    let handle = match &cli.replay {
        Some(path) => Driver::spawn(ReplayProvider::open(path)?, collector),
        None => Driver::spawn(UdpProvider::bind(config.listen, config.max_datagram_size).await?, collector),
    };

    let cancel = handle.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Box box.");
            cancel.cancel();
        }
    });

    let stats = handle.join().await;
    info!(
        received = stats.received,
        processed = stats.processed,
        unknown = stats.unknown_packets,
        malformed = stats.malformed,
        dropped = stats.dropped_records,
        sessions = stats.tracker.sessions,
        sink_errors = stats.tracker.sink_errors,
        "Shut down"
    );
    Ok(())
}
