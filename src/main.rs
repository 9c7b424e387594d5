//! Context Forge - ask questions about a codebase
//!
//! Embeds the tracked files of a repository into a local SQLite store and
//! answers questions with the most similar files attached as context.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod ai;
mod cli;
mod config;
mod core;
mod index;
mod retrieval;
mod store;
mod ui;

/// Context Forge - embeddings-backed answers about your code
#[derive(Parser)]
#[command(name = "forge")]
#[command(author = "Mustafa Saraç <mustafa@mustafasarac.com>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ask questions about your codebase using file embeddings", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "FORGE_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed the tracked files of a directory
    Index {
        /// Directory to index (defaults to TARGET_DIRECTORY or the config)
        path: Option<String>,

        /// Remove all stored embeddings first
        #[arg(long)]
        clear: bool,
    },

    /// Ask a question about your codebase
    Ask {
        /// The question to ask
        question: String,

        /// Maximum number of files sent as context
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Similarity a file must exceed to be picked first
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Similarity used when nothing exceeds the threshold
        #[arg(long)]
        fallback_threshold: Option<f32>,

        /// Do not write the answer to the responses directory
        #[arg(long)]
        no_save: bool,
    },

    /// List stored embeddings and their dimensions
    Check,

    /// Print the tracked file tree
    Tree {
        /// Directory to show (defaults to TARGET_DIRECTORY or the config)
        path: Option<String>,
    },

    /// Delete all stored embeddings
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize configuration file
        #[arg(long)]
        init: bool,
    },

    /// Show version and system info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config(cli.config.as_deref())?;

    // Initialize logging
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = log_filter(cli.verbose || config.general.debug, rust_log.as_deref());
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    debug!("Context Forge v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(Commands::Index { path, clear }) => {
            cli::index::run(config, path.as_deref(), clear).await?;
        }
        Some(Commands::Ask {
            question,
            top_n,
            threshold,
            fallback_threshold,
            no_save,
        }) => {
            let options = cli::ask::AskOptions {
                top_n,
                threshold,
                fallback_threshold,
                no_save,
            };
            cli::ask::run(config, &question, options).await?;
        }
        Some(Commands::Check) => {
            cli::check::run(config)?;
        }
        Some(Commands::Tree { path }) => {
            cli::tree::run(config, path.as_deref())?;
        }
        Some(Commands::Clear { yes }) => {
            cli::clear::run(config, yes)?;
        }
        Some(Commands::Config { show, init }) => {
            if init {
                config::init_config()?;
            } else if show {
                config::show_config(&config)?;
            } else {
                println!("{}", config::config_path()?.display());
            }
        }
        Some(Commands::Info) => {
            cli::info::run(&config)?;
        }
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// `-v` or `DEBUG` force debug output; otherwise a valid `RUST_LOG` applies
fn log_filter(debug: bool, rust_log: Option<&str>) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
