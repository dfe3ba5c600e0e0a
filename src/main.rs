//! # Chroma Local Search CLI (`cls`)
//!
//! ## Usage
//!
//! ```bash
//! cls [--config cls.toml] [--url URL] [--collection NAME] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cls index <path>` | Walk `path` and add every accepted file to the collection |
//! | `cls query "<text>"` | Print the closest matches |
//! | `cls delete` | Delete the collection |
//!
//! ## Examples
//!
//! ```bash
//! # Index a notes directory into the default "files" collection
//! cls index ~/notes
//!
//! # Ten results from a remote server
//! cls --url http://chroma.internal:8000 query "release checklist" -n 10
//!
//! # Start over
//! cls --collection scratch delete
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chroma_local_search::config::{self, Config};
use chroma_local_search::progress::ProgressMode;
use chroma_local_search::store::chroma::ChromaClient;
use chroma_local_search::{delete, ingest, search};

/// Index local files into Chroma and search them semantically.
#[derive(Parser)]
#[command(
    name = "cls",
    about = "Index local files into a Chroma collection and search them",
    version
)]
struct Cli {
    /// Path to a TOML configuration file. Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chroma server URL (overrides `[store].url`).
    #[arg(long, global = true)]
    url: Option<String>,

    /// Collection name (overrides `[store].collection`).
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Progress output on stderr. Defaults to human when stderr is a TTY.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    /// More log output (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk a directory (or a single file) and add its files to the collection.
    ///
    /// Hidden entries, VCS and dependency directories, `.gitignore` matches
    /// and files outside the extension allow-list are skipped.
    Index {
        /// File or directory to index.
        path: PathBuf,
    },

    /// Query the collection and print the closest matches.
    Query {
        /// Query text.
        text: String,

        /// Number of results (overrides `[query].results`).
        #[arg(short = 'n', long)]
        results: Option<usize>,
    },

    /// Delete the collection and everything in it.
    Delete,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };
    if let Some(url) = &cli.url {
        cfg.store.url = url.clone();
    }
    if let Some(collection) = &cli.collection {
        cfg.store.collection = collection.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = resolve_config(&cli)?;
    let client = ChromaClient::from_config(&cfg)?;

    match cli.command {
        Commands::Index { path } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, waiting for in-flight batches");
                    on_signal.cancel();
                }
            });

            let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_index(
                &client,
                &cfg,
                &path,
                Arc::from(progress.reporter()),
                cancel,
            )
            .await?;
        }
        Commands::Query { text, results } => {
            search::run_search(&client, &cfg, &text, results).await?;
        }
        Commands::Delete => {
            delete::run_delete(&client, &cfg).await?;
        }
    }

    Ok(())
}
