//! devlbd - heterogeneous device load-balancing daemon

use anyhow::{Context, Result};
use clap::Parser;
use devlb_config::DaemonConfig;
use devlb_daemon::pidfile::PidFile;
use devlb_daemon::server::Server;
use devlb_daemon::Cli;
use devlb_sched::{DeviceKind, Dispatcher};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = DaemonConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(socket) = cli.socket {
        config.socket_path = socket;
    }
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }

    // Initialize tracing; -v flags override the configured level.
    let filter = match cli.verbose {
        0 => config.log.level.as_filter(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    devlb_config::validate(&config).context("invalid configuration")?;

    let kinds: Vec<DeviceKind> = config.slots.iter().map(|slot| slot.kind).collect();
    let predictor = config.predictor.build(&kinds)?;
    info!(
        predictor = predictor.name(),
        slots = config.slots.len(),
        queues = config.queues.len(),
        threshold = config.threshold,
        "configured"
    );
    for (i, queue) in config.queues.iter().enumerate() {
        info!(
            queue = i,
            alloc = %queue.alloc(),
            max_running = queue.max_running,
            partitioning = queue.dynamic_partitioning,
            "hardware queue"
        );
    }

    let dispatcher = Dispatcher::new(
        config.queues.clone(),
        config.slots.clone(),
        predictor,
        config.threshold,
    );

    let _pid = PidFile::acquire(&config.pid_file)?;
    let mut server = Server::bind(&config.socket_path, dispatcher)?;
    server.run().await
}
