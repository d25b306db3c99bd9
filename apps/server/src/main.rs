//! Inventory Tracker - Telegram bot server
//!
//! Links Steam profiles, caches inventory contents, and alerts on
//! marketplace price increases.

mod api;

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tracker_alerts::{Database, Monitor, MonitorConfig, TelegramBot};
use tracker_steam::{SteamClient, SteamClientConfig};

/// Inventory Tracker CLI
#[derive(Parser, Debug)]
#[command(name = "inventory-bot")]
#[command(about = "Steam inventory price tracker bot", long_about = None)]
struct Args {
    /// SQLite database path
    #[arg(long, default_value = "sqlite://tracker.db")]
    db: String,

    /// HTTP port for the Mini App inventory API
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Seconds between price sweeps
    #[arg(long, default_value_t = 3600)]
    poll_interval: u64,

    /// Seconds between price requests inside a sweep
    #[arg(long, default_value_t = 5)]
    request_delay: u64,

    /// Steam currency code for quotes (5 = RUB)
    #[arg(long, default_value_t = 5)]
    currency: u32,

    /// Game whose inventories are tracked (730 = CS2)
    #[arg(long, default_value_t = 730)]
    app_id: u32,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    info!("🎒 Inventory Tracker starting...");
    info!("  DB: {}", args.db);
    info!("  API Port: {}", args.port);
    info!("  Poll interval: {}s", args.poll_interval);
    info!("  Request delay: {}s", args.request_delay);
    info!("  Currency: {}", args.currency);
    info!("  App: {}", args.app_id);

    let token = match std::env::var("BOT_TOKEN") {
        Ok(t) => t,
        Err(_) => {
            tracing::error!("BOT_TOKEN is not set (put it in .env or the environment)");
            return;
        }
    };

    let db = match Database::connect(&args.db).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            return;
        }
    };

    let steam_config = SteamClientConfig {
        app_id: args.app_id,
        ..Default::default()
    };
    let steam = match SteamClient::new(steam_config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to build HTTP client: {}", e);
            return;
        }
    };

    let bot = Arc::new(TelegramBot::new(&token, db.clone(), steam.clone(), args.currency));

    // Web API for the companion static page
    let api_handle = tokio::spawn(api::serve(db.clone(), args.port));

    // Background price monitor
    let monitor = Monitor::new(
        db.clone(),
        steam.clone(),
        Arc::clone(&bot),
        MonitorConfig {
            poll_interval: Duration::from_secs(args.poll_interval),
            request_delay: Duration::from_secs(args.request_delay),
            currency: args.currency,
            ..Default::default()
        },
    );
    let monitor_handle = tokio::spawn(monitor.run());

    // The dispatcher blocks until Ctrl-C (teloxide's ctrlc handler)
    bot.run().await;

    warn!("Shutdown signal received");
    monitor_handle.abort();
    api_handle.abort();

    info!("👋 Inventory Tracker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["inventory-bot"]);
        assert_eq!(args.port, 8080);
        assert_eq!(args.poll_interval, 3600);
        assert_eq!(args.request_delay, 5);
        assert_eq!(args.currency, 5);
        assert_eq!(args.app_id, 730);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from([
            "inventory-bot",
            "--db",
            "sqlite://other.db",
            "--poll-interval",
            "60",
            "--currency",
            "1",
        ]);
        assert_eq!(args.db, "sqlite://other.db");
        assert_eq!(args.poll_interval, 60);
        assert_eq!(args.currency, 1);
    }
}
