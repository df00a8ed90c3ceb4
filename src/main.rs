//! # marinereg CLI (`mreg`)
//!
//! Index maritime regulation PDFs and ask questions against them.
//!
//! ## Usage
//!
//! ```bash
//! mreg --config ./config/mreg.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mreg bootstrap` | Seed the shared index from the bundled PDFs (once) |
//! | `mreg ingest <PDF>...` | Index uploaded PDFs, one index per file name |
//! | `mreg promote <NAME>` | Merge a document index into the shared index |
//! | `mreg ask "<question>"` | Answer from the shared index or `--doc NAME` |
//! | `mreg list` | List the shared index and document indexes |
//! | `mreg delete-all --yes` | Remove every document index |
//! | `mreg history <NAME>` | Show past questions for a document (`marine` for shared) |
//!
//! Logs go to stderr and honour `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use marinereg::{commands, config};

/// Retrieval-augmented Q&A over MARPOL, SOLAS and uploaded regulation PDFs.
#[derive(Parser)]
#[command(
    name = "mreg",
    about = "Question answering over maritime regulation PDFs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/mreg.toml`.
    #[arg(long, global = true, default_value = "./config/mreg.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the shared index from the configured seed PDFs.
    ///
    /// Does nothing if the shared index location already has content.
    Bootstrap,

    /// Index one or more PDFs.
    ///
    /// Each file gets its own index keyed by file name. An existing index
    /// with the same name is deleted first unless `--keep-existing` is set.
    Ingest {
        /// PDF files to index.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Do not delete an existing index before rebuilding; apply the
        /// `[lifecycle].when_present` policy instead.
        #[arg(long)]
        keep_existing: bool,
    },

    /// Append a document's chunks to the shared index.
    Promote {
        /// Document name as listed by `mreg list`.
        name: String,
    },

    /// Ask a question.
    Ask {
        question: String,

        /// Ask against this document's index instead of the shared one.
        #[arg(long)]
        doc: Option<String>,

        /// Answer language: `english`, `simple-english`, or `hindi`.
        #[arg(long, default_value = "english")]
        language: String,

        /// Answer YES/NO first with a regulation reference.
        #[arg(long)]
        compliance: bool,

        /// Explain penalties for non-compliance.
        #[arg(long)]
        penalty: bool,

        /// Step-by-step crew training guidance.
        #[arg(long)]
        scenario: bool,
    },

    /// List indexes.
    List,

    /// Delete every per-document index. The shared index is kept.
    DeleteAll {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Show question history for a document.
    History {
        /// Document name, or `marine` for the shared index.
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Bootstrap => {
            commands::run_bootstrap(&cfg).await?;
        }
        Commands::Ingest {
            paths,
            keep_existing,
        } => {
            commands::run_ingest(&cfg, &paths, keep_existing).await?;
        }
        Commands::Promote { name } => {
            commands::run_promote(&cfg, &name).await?;
        }
        Commands::Ask {
            question,
            doc,
            language,
            compliance,
            penalty,
            scenario,
        } => {
            commands::run_ask(&cfg, &question, doc, &language, compliance, penalty, scenario)
                .await?;
        }
        Commands::List => {
            commands::run_list(&cfg)?;
        }
        Commands::DeleteAll { yes } => {
            commands::run_delete_all(&cfg, yes).await?;
        }
        Commands::History { name } => {
            commands::run_history(&cfg, &name).await?;
        }
    }

    Ok(())
}
