use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use common::Tier;
use tracing_subscriber::EnvFilter;

mod cmd;
mod config;
mod export;
mod probe;
mod tui;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "pulseboard")]
#[command(about = "Live latency and availability board for hosted model endpoints", version)]
struct Cli {
    /// Config file (default: <config dir>/pulseboard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Only consider models of this tier (S+, S, A+, A, A-, B+, B, C)
    #[arg(long, global = true)]
    tier: Option<Tier>,
    /// Probe interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Probe everything a few times and print the best provider/model
    Best {
        /// Upper bound on probe rounds
        #[arg(long, default_value_t = 4)]
        passes: usize,
    },
    /// Print the configured catalog
    List,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.command.is_none());

    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(ms) = cli.interval_ms {
        cfg.interval_ms = ms;
    }

    match cli.command {
        None => cmd::dashboard(cfg, cli.tier).await,
        Some(Commands::Best { passes }) => cmd::best(cfg, passes, cli.tier).await,
        Some(Commands::List) => cmd::list(&cfg, cli.tier),
    }
}

/// The dashboard owns the terminal, so its logs go to a file; batch
/// commands log to stderr.
fn init_tracing(dashboard: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact();
    if !dashboard {
        builder.with_writer(std::io::stderr).init();
        return;
    }
    match open_log_file() {
        Some(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
        None => builder.with_writer(std::io::sink).init(),
    }
}

fn open_log_file() -> Option<std::fs::File> {
    let dir = dirs::data_dir()?.join("pulseboard");
    std::fs::create_dir_all(&dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("pulseboard.log"))
        .ok()
}
