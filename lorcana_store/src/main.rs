//! Lorcana Store - REST API over the card catalog data directory
//!
//! Opens the document store (flat JSON files or SQLite), then serves the
//! catalog, collection and data management endpoints until Ctrl-C.

use clap::{Parser, ValueEnum};
use lorcana_store::{
    AppState, DocumentStore, FileStore, RandomIds, Records, SqliteStore, StoreConfig,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Where the documents are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// One pretty-printed JSON file per document
    File,
    /// Single SQLite database (catalog.db) in the data directory
    Sqlite,
}

/// Lorcana card catalog server
#[derive(Parser, Debug)]
#[command(name = "lorcana_store")]
#[command(version, about, long_about = None)]
struct Args {
    /// Data directory holding the documents, backups, exports and uploads
    #[arg(short, long, env = "DATA_PATH", default_value_os_t = StoreConfig::default_data_dir())]
    data_dir: PathBuf,

    /// Port for the HTTP API
    #[arg(short, long, env = "PORT", default_value_t = 1923)]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Directory with a static web UI to serve (index.html fallback)
    #[arg(long)]
    public_dir: Option<PathBuf>,

    /// Storage backend
    #[arg(long, value_enum, default_value_t = Backend::File)]
    backend: Backend,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = StoreConfig::new(&args.data_dir);

    log::info!("Starting lorcana_store...");
    log::info!("Data directory: {}", config.data_dir().display());

    if let Err(e) = config.ensure_directories() {
        log::error!("Failed to create data directories: {}", e);
        std::process::exit(1);
    }

    let store: Arc<dyn DocumentStore> = match args.backend {
        Backend::File => Arc::new(FileStore::new(config.data_dir())),
        Backend::Sqlite => match SqliteStore::open(&config.sqlite_path()) {
            Ok(store) => {
                log::info!("Opened database: {}", config.sqlite_path().display());
                Arc::new(store)
            }
            Err(e) => {
                log::error!("Failed to open database: {}", e);
                std::process::exit(1);
            }
        },
    };

    let state = AppState::new(Records::new(store), Arc::new(RandomIds), config);

    if let Err(e) = lorcana_store::web::serve(state, args.public_dir, &args.bind, args.port).await {
        log::error!("Web server error: {}", e);
        std::process::exit(1);
    }
}
