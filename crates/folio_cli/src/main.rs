//! Operator entry point for the Folio storage core.
//!
//! # Responsibility
//! - Provision a database file the same way the server does at startup.
//! - Print the authoritative collection/index schema for ops tooling.

use clap::{Parser, Subcommand};
use folio_core::{
    core_version, default_log_level, init_collections, init_logging, logging_status,
    open_db_with_config, StoreConfig, COLLECTION_SPECS,
};
use log::info;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Folio storage provisioning")]
struct Cli {
    /// trace|debug|info|warn|error; defaults by build mode.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files. Logging is off when omitted.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create missing collections and indexes, then list what exists.
    Provision {
        #[arg(long)]
        db: PathBuf,

        /// JSON store config, e.g. `{"collectionPrefix":"apos"}`.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the required collections and indexes.
    Schema {
        #[arg(long, default_value = folio_core::config::DEFAULT_COLLECTION_PREFIX)]
        prefix: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("folio: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }
    if let Some((level, log_dir)) = logging_status() {
        eprintln!("folio: logging at {level} to {}", log_dir.display());
        info!(
            "event=cli_start module=cli status=ok core_version={}",
            core_version()
        );
    }

    match cli.command {
        Command::Provision { db, config } => provision(&db, config.as_deref()),
        Command::Schema { prefix } => {
            let config = StoreConfig {
                collection_prefix: prefix,
                ..StoreConfig::default()
            };
            config.validate()?;
            print_schema(&config);
            Ok(())
        }
    }
}

fn provision(db: &Path, config_path: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let config = match config_path {
        Some(path) => StoreConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => StoreConfig::default(),
    };

    let conn = open_db_with_config(db, &config)?;
    let collections = init_collections(&conn, &config)?;
    info!("event=cli_provision module=cli status=ok db={}", db.display());

    println!("# folio_core {}", core_version());
    for (logical, collection) in collections.iter() {
        println!(
            "{logical}\t{}\tdocuments={}",
            collection.name(),
            collection.count()?
        );
        for index in collection.list_indexes()? {
            println!(
                "  {}{}",
                index.name,
                index_options(index.unique, index.multikey)
            );
        }
    }
    Ok(())
}

fn print_schema(config: &StoreConfig) {
    println!("# folio_core {}", core_version());
    for spec in COLLECTION_SPECS {
        println!("{}\t{}", spec.logical, config.physical_name(spec.logical));
        for index in spec.indexes {
            println!(
                "  {}{}",
                index.name(),
                index_options(index.unique, index.multikey)
            );
        }
    }
}

fn index_options(unique: bool, multikey: bool) -> &'static str {
    match (unique, multikey) {
        (true, _) => " unique",
        (false, true) => " multikey",
        (false, false) => "",
    }
}
