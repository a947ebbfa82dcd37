//! Pagewise - Browse very large ordered message stores through a bounded window
//!
//! Subcommands:
//! - `seed`: create a SQLite message store with the demo conversation
//! - `page`: print one raw cursor page as JSON
//! - `browse`: headless scrolling session over the paging engine

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use pagewise_core::config::{self, PagingConfig};
use pagewise_core::constants::storage::LOG_FILE_NAME;
use pagewise_core::Direction;

mod commands;

/// Pagewise - windowed pagination engine
#[derive(Parser)]
#[command(name = "pagewise")]
#[command(about = "Browse very large ordered message stores through a bounded window", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.pagewise/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Items per cursor page (overrides the config file)
    #[arg(long, global = true)]
    page_size: Option<usize>,

    /// Log to stderr instead of ~/.pagewise/logs
    #[arg(long, global = true)]
    log_stderr: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or refill a message store with the demo conversation
    Seed {
        /// SQLite database file
        #[arg(long)]
        db: PathBuf,

        /// Number of messages
        #[arg(long, default_value_t = 1000)]
        count: usize,
    },

    /// Print one cursor page as JSON
    Page {
        /// SQLite database file
        #[arg(long)]
        db: PathBuf,

        /// Cursor token (`sortKey::id`); omit for the head of the store
        #[arg(long)]
        cursor: Option<String>,

        #[arg(long, value_enum, default_value_t = DirectionArg::Older)]
        direction: DirectionArg,

        /// Items per page (defaults to the configured page size)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run a search and scroll a headless viewport through the results
    Browse {
        /// SQLite database file; the in-memory demo conversation when omitted
        #[arg(long)]
        db: Option<PathBuf>,

        /// Search term; the latest messages when omitted
        #[arg(long)]
        term: Option<String>,

        /// Message id to center on
        #[arg(long)]
        anchor: Option<String>,

        /// Scroll steps toward each edge
        #[arg(long, default_value_t = 5)]
        scrolls: usize,

        /// Viewport height in pixels
        #[arg(long, default_value_t = 600.0)]
        height: f32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Older,
    Newer,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Older => Direction::Older,
            DirectionArg::Newer => Direction::Newer,
        }
    }
}

/// Install the tracing subscriber: log file by default, stderr on request
fn init_logging(to_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    if !to_stderr {
        let log_dir = config::logs_dir();
        if std::fs::create_dir_all(&log_dir).is_ok() {
            if let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME)) {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::sync::Mutex::new(log_file))
                    .with_ansi(false)
                    .init();
                return;
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<PagingConfig> {
    let path = cli.config.clone().unwrap_or_else(PagingConfig::default_path);
    let mut config = PagingConfig::load(&path)?;
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size;
    }
    Ok(config.validate())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_stderr);

    let config = load_config(&cli)?;
    tracing::info!(page_size = config.page_size, max_pages = config.max_pages(), "Starting pagewise");

    match cli.command {
        Commands::Seed { db, count } => commands::seed::run(&db, count),
        Commands::Page {
            db,
            cursor,
            direction,
            limit,
        } => {
            let limit = limit.unwrap_or(config.page_size);
            commands::page::run(&db, cursor.as_deref(), direction.into(), limit, &config).await
        }
        Commands::Browse {
            db,
            term,
            anchor,
            scrolls,
            height,
        } => {
            let options = commands::browse::BrowseOptions {
                term,
                anchor,
                scrolls,
                viewport_height: height,
            };
            commands::browse::run(db.as_deref(), options, config).await
        }
    }
}
