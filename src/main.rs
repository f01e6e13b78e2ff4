//! # Corpus Viewer CLI (`cview`)
//!
//! ## Usage
//!
//! ```bash
//! cview --config ./config/cview.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cview pages` | Page index, filtered by title and paginated |
//! | `cview page <id>` | Page content with navigation sidebar |
//! | `cview tree` | Navigation tree |
//! | `cview search "<query>"` | Retrieval hits |
//! | `cview ask "<question>"` | RAG answer with sources |
//! | `cview health` | Check the configured transport |
//! | `cview serve` | Serve the snapshot directory over HTTP |
//!
//! Rendered views go to stdout; logs go to stderr (`RUST_LOG` or
//! `--verbose`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use corpus_viewer::{config, fetcher, listing, navtree, query, reconcile, server};

#[derive(Parser)]
#[command(
    name = "cview",
    about = "Corpus Viewer: browse a scraped document corpus from the terminal",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/cview.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List pages.
    Pages {
        /// Case-insensitive title filter.
        #[arg(long, short)]
        query: Option<String>,

        /// 1-based page of results.
        #[arg(long, default_value_t = 1)]
        page: usize,
    },

    /// Show one page with its navigation context.
    Page {
        /// Page id.
        id: String,
    },

    /// Show the navigation tree.
    ///
    /// Root nodes start expanded. Use `--expand` to open more nodes,
    /// `--all` to open everything and `--current` to reveal and mark a page.
    Tree {
        /// Page ids to expand (repeatable).
        #[arg(long)]
        expand: Vec<String>,

        /// Expand every node.
        #[arg(long)]
        all: bool,

        /// Page id to reveal and mark.
        #[arg(long)]
        current: Option<String>,
    },

    /// Search the corpus.
    Search {
        query: String,

        /// Number of hits (1-50). Defaults to `[query] top_k`.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Ask a question and get an answer grounded in the corpus.
    Ask {
        query: String,

        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Check that the configured transport is reachable.
    Health,

    /// Serve `[source] data_dir` as a static snapshot API.
    Serve,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Pages { query, page } => {
            listing::run_pages(&cfg, query.as_deref(), page).await?;
        }
        Commands::Page { id } => {
            reconcile::run_page(&cfg, &id).await?;
        }
        Commands::Tree {
            expand,
            all,
            current,
        } => {
            navtree::run_tree(&cfg, &expand, all, current.as_deref()).await?;
        }
        Commands::Search { query: q, top_k } => {
            query::run_search(&cfg, &q, top_k).await?;
        }
        Commands::Ask { query: q, top_k } => {
            query::run_ask(&cfg, &q, top_k).await?;
        }
        Commands::Health => {
            fetcher::run_health(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
