//! lazy-traveler: terminal client for the lazy-traveler travel chat
//!
//! Usage:
//!   lazy-traveler            - Start the interactive chat
//!   lazy-traveler --help     - Show help
//!   lazy-traveler --version  - Show version

mod cli;
mod error;

use lt_api::ApiClient;
use lt_chat::{ChatSessionManager, ManagerConfig, WsTransport};
use lt_core::quota::DailyQuota;
use lt_core::{ClientState, Config, SqliteStore};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Interactive chat
    Chat,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let mode = parse_args();

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("lazy-traveler {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Chat => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting lazy-traveler...");
    tracing::info!("API: {}", config.api.base_url);

    let store = SqliteStore::new(&config.storage.db_path)
        .map_err(|e| anyhow::anyhow!("Failed to open client storage: {}", e))?;
    let state = ClientState::new(Arc::new(store));

    let api = ApiClient::from_config(&config.api)
        .map_err(|e| anyhow::anyhow!("Failed to create API client: {}", e))?;
    if let Some(token) = state.access_token()? {
        api.set_token(Some(token));
    }

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let manager = ChatSessionManager::new(
        ManagerConfig::from_config(&config),
        state.clone(),
        Arc::new(WsTransport::new()),
        Arc::new(api.clone()),
        event_tx,
    );
    let (chat, manager_task) = manager.spawn();
    chat.connect()?;
    chat.refresh_history()?;

    let app = cli::App {
        api,
        state,
        chat,
        position: config.location,
        message_quota: DailyQuota::messages(config.limits.daily_messages),
        history: Arc::new(RwLock::new(Default::default())),
    };
    cli::run_cli(app, event_rx).await?;

    // Let the manager forget the session before exiting
    if let Err(e) = manager_task.await {
        tracing::warn!("Chat manager ended abnormally: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    let args: Vec<String> = std::env::args().collect();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Chat
}

/// Print help message
fn print_help() {
    println!("lazy-traveler - travel planning chat");
    println!();
    println!("Usage:");
    println!("  lazy-traveler            Start the interactive chat");
    println!("  lazy-traveler --help     Show this help message");
    println!("  lazy-traveler --version  Show version");
    println!();
    println!("Configuration is read from ./lazy-traveler.toml when present.");
    println!();
    println!("Environment Variables:");
    println!("  LT_API_BASE_URL          REST API base URL (default: https://api.lazy-traveler.store)");
    println!("  LT_WS_URL                Chat socket URL (default: wss://api.lazy-traveler.store/ws/chat/)");
    println!("  LT_DB_PATH               Client state database (default: data/lazy-traveler.db)");
    println!("  LT_RECONNECT_DELAY_SECS  Wait before reconnecting (default: 10)");
    println!("  LT_DAILY_MESSAGE_LIMIT   Messages per day (default: 100)");
    println!("  LT_DAILY_REFRESH_LIMIT   New conversations per day (default: 5)");
    println!("  RUST_LOG                 Log filter (default: info)");
}
