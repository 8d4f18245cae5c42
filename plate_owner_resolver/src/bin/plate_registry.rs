use anyhow::Context;
use clap::{Parser, Subcommand};

use plate_owner_resolver::logging::{init_logging, LogFormat};
use plate_owner_resolver::registry::SqliteRecordStore;
use plate_owner_resolver::{RecordStore, RegistryEntry};

/// Manages the vehicle registry used for owner lookups.
#[derive(Parser, Debug)]
#[command(name = "plate_registry", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a vehicle
    Add {
        #[arg(long, env = "PLATES_REGISTRY_DB", default_value = "registry.db")]
        db: String,
        #[arg(long)]
        plate: String,
        #[arg(long)]
        owner: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        vehicle_info: String,
    },
    /// Print every registered vehicle as JSON lines
    List {
        #[arg(long, env = "PLATES_REGISTRY_DB", default_value = "registry.db")]
        db: String,
    },
}

fn main() -> anyhow::Result<()> {
    init_logging(LogFormat::from_env());
    let cli = Cli::parse();

    match cli.command {
        Command::Add {
            db,
            plate,
            owner,
            phone,
            vehicle_info,
        } => {
            let store = SqliteRecordStore::open(&db)
                .with_context(|| format!("cannot open registry {db}"))?;
            let stored = store.register(&RegistryEntry {
                plate,
                owner_name: owner,
                phone,
                vehicle_info,
            })?;
            println!("{}", serde_json::to_string(&stored)?);
        }
        Command::List { db } => {
            let store = SqliteRecordStore::open(&db)
                .with_context(|| format!("cannot open registry {db}"))?;
            for entry in store.snapshot()? {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
    }
    Ok(())
}
