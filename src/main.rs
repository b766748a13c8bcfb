use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, bail};
use payledger::application::ledger::LedgerService;
use payledger::domain::ports::LedgerStoreBox;
use payledger::infrastructure::in_memory::InMemoryStore;
use payledger::infrastructure::snapshot::SnapshotStore;
use payledger::interfaces::jsonl::notification_reader::NotificationReader;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the durable snapshot. Runs in-memory if omitted.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Path to a RocksDB database. Takes precedence over --data-dir.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long, global = true)]
    rocksdb_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read notifications as JSON lines and record each one
    Ingest {
        /// Input file, or "-" for stdin
        input: PathBuf,
    },
    /// Print the current snapshot of one order
    GetOrder {
        /// Business order reference
        business_ref: String,
    },
    /// Print the most recent callback records, one JSON object per line
    ListCallbacks {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

fn open_store(cli: &Cli) -> Result<LedgerStoreBox> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(path) = &cli.rocksdb_path {
        let store = payledger::infrastructure::rocksdb::RocksDbStore::open(path).into_diagnostic()?;
        return Ok(Box::new(store));
    }

    match &cli.data_dir {
        Some(dir) => Ok(Box::new(SnapshotStore::open(dir).into_diagnostic()?)),
        None => Ok(Box::new(InMemoryStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only JSON results.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let service = LedgerService::new(open_store(&cli)?);

    match cli.command {
        Command::Ingest { input } => {
            let source: Box<dyn BufRead> = if input.to_str() == Some("-") {
                Box::new(BufReader::new(io::stdin()))
            } else {
                Box::new(BufReader::new(File::open(input).into_diagnostic()?))
            };

            let reader = NotificationReader::new(source);
            for payload in reader.notifications() {
                match payload {
                    Ok(payload) => match service.record_notification(payload).await {
                        Ok(outcome) => {
                            println!("{}", serde_json::to_string(&outcome).into_diagnostic()?);
                        }
                        Err(e) => eprintln!("Error recording notification: {e}"),
                    },
                    Err(e) => eprintln!("Error reading notification: {e}"),
                }
            }
        }
        Command::GetOrder { business_ref } => {
            match service.get_order(&business_ref).await.into_diagnostic()? {
                Some(order) => println!("{}", serde_json::to_string(&order).into_diagnostic()?),
                None => bail!("order not found: {business_ref}"),
            }
        }
        Command::ListCallbacks { limit } => {
            for record in service.list_callbacks(limit).await.into_diagnostic()? {
                println!("{}", serde_json::to_string(&record).into_diagnostic()?);
            }
        }
    }

    Ok(())
}
