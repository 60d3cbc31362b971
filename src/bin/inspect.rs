//! raftlog Inspector
//!
//! Offline inspection of a replicated log's data directory.
//!
//! Every command only reads the WAL; a torn tail is reported, never
//! truncated.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use raftlog::wal::{RecoveredState, WalRecovery, WalStore};
use raftlog::{LogError, ReplicatedLog};
use tracing_subscriber::{fmt, EnvFilter};

/// raftlog Inspector
#[derive(Parser, Debug)]
#[command(name = "raftlog-inspect")]
#[command(about = "Inspect the write-ahead log of a raftlog data directory")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./raftlog_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check WAL integrity without modifying it
    Verify,

    /// Print term, vote and log bounds
    State,

    /// Print entries
    Dump {
        /// First index to print
        #[arg(long, default_value = "1")]
        from: u64,

        /// Last index to print (defaults to the last entry)
        #[arg(long)]
        to: Option<u64>,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,raftlog=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> raftlog::Result<()> {
    let wal_path = args.data_dir.join(ReplicatedLog::WAL_FILENAME);
    match args.command {
        Commands::Verify => {
            let result = WalRecovery::verify(&wal_path)?;
            println!("records:   {}", result.entries_recovered);
            println!("last lsn:  {}", result.last_lsn);
            println!("corrupted: {}", result.entries_corrupted);
            println!("valid:     {} bytes", result.valid_bytes);
            println!("clean:     {}", !result.was_truncated);
        }
        Commands::State => {
            let state = read(&wal_path)?;
            println!("term:         {}", state.term);
            match state.voted_for {
                Some(member) => println!("voted for:    {}", member),
                None => println!("voted for:    -"),
            }
            println!("last index:   {}", state.entries.len());
            println!("commit index: {}", state.commit_index);
        }
        Commands::Dump { from, to } => {
            let state = read(&wal_path)?;
            let last_index = state.entries.len() as u64;
            let to = to.unwrap_or(last_index);
            if to > last_index {
                return Err(LogError::IndexOutOfRange {
                    index: to,
                    length: last_index + 1,
                });
            }
            // index 0 is the sentinel and is never stored
            let from = from.max(1);
            if from > to {
                return Ok(());
            }
            let entries = &state.entries[(from - 1) as usize..to as usize];
            for (offset, entry) in entries.iter().enumerate() {
                let index = from + offset as u64;
                println!(
                    "{:>8} {} term={} {} bytes{}{}",
                    index,
                    entry.timestamp().to_rfc3339(),
                    entry.term(),
                    entry.len(),
                    if entry.is_snapshot() { " snapshot" } else { "" },
                    if index <= state.commit_index { " committed" } else { "" },
                );
            }
        }
    }
    Ok(())
}

fn read(wal_path: &Path) -> raftlog::Result<RecoveredState> {
    if !wal_path.exists() {
        return Err(LogError::Config(format!("no WAL at {}", wal_path.display())));
    }
    WalStore::read_state(wal_path)
}
