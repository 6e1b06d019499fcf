//! swcache Proxy - offline-first caching proxy.
//!
//! This binary hosts one swcache worker in front of an upstream origin:
//! page requests are routed through the worker's cache strategies, and the
//! worker's message, push, notification and sync events are exposed as
//! control endpoints under `/__sw/`.

mod handler;
mod server;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use swcache_core::{
    AppConfig, DynCacheStore, DynFetcher, HttpFetcher, MemoryStore, Router, SqliteStore,
    WorkerConfig, WorkerHandlers,
};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "swcache-proxy")]
#[command(about = "Offline-first caching proxy for static sites")]
struct Args {
    /// Upstream origin, e.g. https://blog.example (overrides the config file)
    #[arg(long)]
    origin: Option<String>,

    /// Worker configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Deployment version; derives the namespace names
    #[arg(long)]
    version: Option<String>,

    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// SQLite cache database (defaults to the user data directory)
    #[arg(long, conflicts_with = "memory")]
    db: Option<PathBuf>,

    /// Keep the cache in memory only
    #[arg(long)]
    memory: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn load_config(args: &Args) -> Result<WorkerConfig> {
    let mut config = match (&args.config, &args.origin) {
        (Some(path), _) => WorkerConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        (None, Some(origin)) => WorkerConfig::for_origin(origin.clone()),
        (None, None) => bail!("either --origin or --config is required"),
    };

    if let Some(origin) = &args.origin {
        config.origin = origin.clone();
    }
    if let Some(version) = &args.version {
        config = config.with_version(version.clone());
    }
    config.validate()?;
    Ok(config)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(AppConfig::APP_NAME)
        .join(AppConfig::DEFAULT_DB_FILENAME)
}

fn open_store(args: &Args) -> Result<DynCacheStore> {
    if args.memory {
        info!("Using in-memory cache store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let path = args.db.clone().unwrap_or_else(default_db_path);
    info!("Cache database: {}", path.display());
    Ok(Arc::new(SqliteStore::new(&path)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting swcache proxy");

    let config = load_config(&args)?;
    info!("Origin: {} (version {})", config.origin, config.version);

    let store = open_store(&args)?;
    let fetcher: DynFetcher = Arc::new(HttpFetcher::new(&config.origin_url()?)?);
    let router = Arc::new(Router::new(config, store, fetcher.clone())?);

    // A failed install keeps whatever caches a previous run left behind.
    match router.on_install().await {
        Ok(report) => {
            info!("Precached {} resources", report.precached);
            let activated = router.on_activate().await?;
            if !activated.deleted.is_empty() {
                info!("Removed {} old namespaces", activated.deleted.len());
            }
        }
        Err(e) => warn!("Install failed, serving from existing caches: {}", e),
    }

    let addr = server::start_server(router.clone(), fetcher, &args.host, args.port).await?;

    // Print port for launchers to read (intentional stdout)
    println!("PROXY_PORT={}", addr.port());

    info!("Proxy running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, waiting for background cache writes");
    router.background().wait_idle().await;

    Ok(())
}
