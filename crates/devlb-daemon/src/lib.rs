//! devlb daemon: CLI surface, PID-file bookkeeping, and the request loop

pub mod pidfile;
pub mod server;

use clap::Parser;
use std::path::PathBuf;

/// Heterogeneous device load-balancing daemon
///
/// Listens for resource requests on a Unix socket, scores each kernel with
/// the configured predictor, and hands out device allocations subject to
/// per-queue concurrency limits.
#[derive(Debug, Parser)]
#[command(name = "devlbd", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "devlb.toml")]
    pub config: PathBuf,

    /// Listen on this socket instead of the configured one
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Override the performance-substitution threshold
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
