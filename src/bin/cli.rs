//! kdb CLI
//!
//! Command-line interface over a WAL-backed store.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use kdb::{Config, Store, WalSyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// kdb CLI
#[derive(Parser, Debug)]
#[command(name = "kdb-cli")]
#[command(about = "Embedded B-tree key-value store with a write-ahead log")]
#[command(version)]
struct Args {
    /// WAL file
    #[arg(short, long, default_value = "kdb.wal")]
    wal: String,

    /// fsync once every N records instead of after each one
    #[arg(long)]
    sync_every: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a value (existing keys are kept)
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Insert user1..userN with values value-1..value-N
    Seed {
        #[arg(short, long, default_value = "50")]
        count: usize,
    },

    /// Print the tree structure
    Tree,

    /// Print key count and tree height
    Stats,

    /// Truncate the WAL (discards all history)
    Checkpoint,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> kdb::Result<()> {
    let strategy = match args.sync_every {
        Some(count) => WalSyncStrategy::EveryNEntries { count },
        None => WalSyncStrategy::EveryWrite,
    };
    let config = Config::builder()
        .wal_path(&args.wal)
        .wal_sync_strategy(strategy)
        .build();

    let mut store = Store::open(config)?;

    match args.command {
        Commands::Put { key, value } => {
            let outcome = store.put(&key, value)?;
            if outcome.committed() {
                println!("OK");
            } else {
                println!("EXISTS");
            }
        }
        Commands::Get { key } => match store.get(&key) {
            Some(value) => println!("{}", value),
            None => println!("(nil)"),
        },
        Commands::Seed { count } => {
            let mut inserted = 0;
            for i in 1..=count {
                if store.put(&format!("user{}", i), format!("value-{}", i))?.committed() {
                    inserted += 1;
                }
            }
            if let Some(wal) = store.wal() {
                wal.sync()?;
            }
            println!("inserted {} of {} records", inserted, count);
        }
        Commands::Tree => print!("{}", store.render_tree()),
        Commands::Stats => {
            println!("keys: {}", store.len());
            println!("height: {}", store.tree().height());
        }
        Commands::Checkpoint => {
            store.checkpoint()?;
            println!("OK");
        }
    }

    store.close()
}
