//! `moor-server`: loads a textdump database and serves it over TCP
//! (spec §6 "Startup/CLI").

use clap::Parser;
use moor_core::config::ServerConfig;
use moor_core::net::Server;
use moor_core::textdump::{read_textdump_file, LoadedDatabase};
use moor_core::{builtins::BuiltinRegistry, objstore::ObjectStore, scheduler::Scheduler};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "moor-server", about = "Serve a LambdaMOO-compatible database")]
struct Args {
    /// Path to a textdump database file. Created empty if it doesn't exist.
    #[arg(long)]
    db: PathBuf,

    /// Port to listen for player connections on.
    #[arg(long)]
    port: Option<u16>,

    /// Tracing log level (`error`, `warn`, `info`, `debug`, `trace`).
    #[arg(long)]
    log_level: Option<String>,

    /// Optional TOML config file; CLI flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds between automatic checkpoints; 0 disables periodic writes.
    #[arg(long)]
    checkpoint_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    config.database_path = args.db.clone();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    if let Some(secs) = args.checkpoint_interval_secs {
        config.checkpoint_interval_secs = secs;
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_level))
        .init();

    let (store, scheduler) = if config.database_path.exists() {
        let LoadedDatabase { store, scheduler, version } = read_textdump_file(&config.database_path)?;
        tracing::info!(?version, "database loaded");
        (store, scheduler)
    } else {
        tracing::warn!(path = ?config.database_path, "database file not found, starting empty");
        (ObjectStore::new(), Scheduler::new())
    };

    let builtins = BuiltinRegistry::new();
    let server = Server::new(config, store, scheduler, builtins);
    server.run().await?;
    Ok(())
}
