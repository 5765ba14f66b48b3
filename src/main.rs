//! # docsync CLI
//!
//! ```bash
//! docsync --config ./config/docsync.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsync sync [--rebuild]` | Reconcile the index with the data directory |
//! | `docsync search "<query>"` | Sync, then print the top-k cited results |
//! | `docsync manifest` | List indexed sources, newest first |
//! | `docsync prune` | Drop sources that no longer exist on disk |
//! | `docsync serve` | Start the HTTP API |
//! | `docsync completions <shell>` | Print shell completions |

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docsync::config::{self, Config};
use docsync::server;
use docsync::{RagContext, SyncError};
use docsync_core::models::SyncStatus;

const DEFAULT_CONFIG: &str = "./config/docsync.toml";

#[derive(Parser)]
#[command(
    name = "docsync",
    about = "Incremental document indexing and cited retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults to
    /// `./config/docsync.toml`, or built-in defaults if that is missing.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the index with the data directory.
    Sync {
        /// Erase the index and manifest and rebuild from scratch.
        #[arg(long)]
        rebuild: bool,

        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Sync incrementally, then search.
    Search {
        query: String,

        /// Number of results.
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// List indexed sources, newest first.
    Manifest {
        #[arg(long)]
        json: bool,
    },

    /// Remove sources that no longer exist from the manifest and index.
    Prune,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("RUST_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => config::load_config(p),
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            if default.exists() {
                config::load_config(default)
            } else {
                tracing::debug!("no config file; using defaults");
                Ok(Config::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "docsync", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = resolve_config(cli.config.as_deref())?;
    let ctx = RagContext::open(cfg).await?;

    match cli.command {
        Commands::Sync { rebuild, json } => {
            let status = ctx.orchestrator().initialize(rebuild).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
        Commands::Search { query, k } => {
            ctx.orchestrator().initialize(false).await?;
            println!("{}", ctx.search(&query, k).await?);
        }
        Commands::Manifest { json } => {
            let entries = ctx.manifest().entries_by_recency();
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No sources indexed.");
            } else {
                for e in entries {
                    println!(
                        "{}  {:>10} B  {}  {}",
                        e.sha256_short, e.size, e.ingested_at_utc, e.file
                    );
                }
            }
        }
        Commands::Prune => {
            let report = ctx.orchestrator().prune().await?;
            println!("pruned: {}", report.removed.len());
            for path in &report.removed {
                println!("  {}", path);
            }
            for w in &report.warnings {
                println!("  warning: {}", w);
            }
        }
        Commands::Serve => {
            let ctx = Arc::new(ctx);
            match ctx.orchestrator().initialize(false).await {
                Ok(status) => print_status(&status),
                Err(e) if e.downcast_ref::<SyncError>().is_some() => {
                    tracing::warn!(error = %e, "initial sync skipped; searches report not initialized");
                }
                Err(e) => return Err(e),
            }
            server::run_server(ctx).await?;
        }
        Commands::Completions { .. } => unreachable!("handled before config loading"),
    }

    Ok(())
}

fn print_status(status: &SyncStatus) {
    println!("sync ({})", status.mode);
    println!("  sources: {}", status.total_sources);
    println!("  added: {}", status.added);
    println!("  updated: {}", status.updated);
    println!("  skipped: {}", status.skipped);
    if status.failed > 0 {
        println!("  failed: {}", status.failed);
    }
    if status.recovered > 0 {
        println!("  recovered: {}", status.recovered);
    }
    if status.pruned > 0 {
        println!("  pruned: {}", status.pruned);
    }
    println!("  chunks added: {}", status.chunks_added);
    for w in &status.warnings {
        println!("  warning: {}", w);
    }
    println!("ok");
}
