//! Understory CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "understory")]
#[command(about = "Bounded code-structure graph view over a live analysis backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (missing file means defaults)
    #[arg(short, long, default_value = understory_client::CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the analysis backend, keep the graph fresh and serve it
    Watch {
        /// WebSocket URL of the analysis backend
        #[arg(long, env = "UNDERSTORY_BACKEND_URL")]
        backend_url: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Background refresh period in milliseconds
        #[arg(long)]
        refresh_interval_ms: Option<u64>,
    },
    /// Assemble a graph model from JSON snapshot files and print it
    Assemble {
        /// Digest JSON file
        #[arg(long)]
        digest: PathBuf,

        /// Issues JSON file
        #[arg(long)]
        issues: Option<PathBuf>,

        /// Edges JSON file
        #[arg(long)]
        edges: Option<PathBuf>,

        /// Diagnostics JSON file
        #[arg(long)]
        diagnostics: Option<PathBuf>,

        /// Print the flat file-index view from this file index instead
        #[arg(long)]
        file_index: Option<PathBuf>,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before parsing, so .env can supply UNDERSTORY_BACKEND_URL.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("understory={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Watch {
            backend_url,
            port,
            host,
            refresh_interval_ms,
        } => {
            let overrides = commands::WatchOverrides {
                backend_url,
                host,
                port,
                refresh_interval_ms,
            };
            commands::watch(&cli.config, overrides).await
        }
        Commands::Assemble {
            digest,
            issues,
            edges,
            diagnostics,
            file_index,
        } => {
            let inputs = commands::AssembleInputs {
                digest,
                issues,
                edges,
                diagnostics,
                file_index,
            };
            commands::assemble(&inputs)
        }
        Commands::Version => {
            println!("Understory v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
