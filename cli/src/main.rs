//! lnindex CLI: replay decoded contract events into an entity store.
//!
//! # Commands
//! ```text
//! lnindex replay --events <file.jsonl> [--config <cfg.json>] [--contract-state <state.json>] [--db <path>] [--dump]
//! lnindex get    --db <path> --collection <name> --id <id>
//! lnindex info
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use lnindex_core::{ChainEvent, Collection, EntityStore, IndexerConfig};
use lnindex_storage::SqliteStorage;

mod cmd_replay;
mod logging;

#[derive(Parser)]
#[command(
    name = "lnindex",
    about = "Reconcile HTLC, node NFT and node sale events into entities",
    version
)]
struct Cli {
    /// Enable debug logging (overrides the configured level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines file of decoded events
    Replay {
        /// One decoded event per line, in chain order
        #[arg(long)]
        events: String,
        /// Indexer config JSON (defaults apply when omitted)
        #[arg(long)]
        config: Option<String>,
        /// HTLC contract state snapshot: { "<contractId>": { "preimage", "watcher" } }
        #[arg(long)]
        contract_state: Option<String>,
        /// SQLite database path (in-memory store when omitted)
        #[arg(long)]
        db: Option<String>,
        /// Print every stored entity after the replay
        #[arg(long)]
        dump: bool,
    },

    /// Print one stored entity as JSON
    Get {
        /// SQLite database path
        #[arg(long)]
        db: String,
        /// Collection name, e.g. nodes
        #[arg(long)]
        collection: Collection,
        /// Entity id
        #[arg(long)]
        id: String,
    },

    /// Show supported events and collections
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { events, config, contract_state, db, dump } => {
            let mut config = match config {
                Some(path) => IndexerConfig::from_json_file(&path)
                    .with_context(|| format!("load config '{path}'"))?,
                None => IndexerConfig::default(),
            };
            config.validate()?;
            if cli.verbose {
                config.log.level = "debug".into();
            }
            logging::init_tracing(&config.log);

            let args = cmd_replay::ReplayArgs {
                events: &events,
                contract_state: contract_state.as_deref(),
                db: db.as_deref(),
                dump,
            };
            cmd_replay::run(&config, args).await
        }

        Commands::Get { db, collection, id } => {
            init_default_tracing(cli.verbose);
            cmd_get(&db, collection, &id).await
        }

        Commands::Info => cmd_info(),
    }
}

fn init_default_tracing(verbose: bool) {
    let mut log = lnindex_core::LogConfig::default();
    if verbose {
        log.level = "debug".into();
    }
    logging::init_tracing(&log);
}

// ─── Command implementations ─────────────────────────────────────────────────

async fn cmd_get(db: &str, collection: Collection, id: &str) -> Result<()> {
    let store = SqliteStorage::open(db).await?;
    match EntityStore::load(&store, collection, id).await? {
        Some(doc) => {
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
        None => anyhow::bail!("no {collection} entity with id '{id}'"),
    }
}

fn cmd_info() -> Result<()> {
    println!("lnindex v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Events:");
    for schema in ChainEvent::SCHEMAS {
        println!("  {schema}");
    }
    println!();
    println!("Collections:");
    for collection in Collection::ALL {
        println!("  {collection}");
    }
    println!();
    println!("Storage backends:              memory, sqlite");
    Ok(())
}
