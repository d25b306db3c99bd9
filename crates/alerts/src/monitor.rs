//! Background price monitoring.
//!
//! One timer task sweeps the tracking table on a fixed interval, fetching
//! prices sequentially with a constant delay between remote calls. Only a
//! strict price increase notifies; decreases are ignored.

use crate::db::Database;
use crate::telegram::TelegramBot;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracker_steam::{SteamClient, SteamError};
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),
}

/// Configuration for the price monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between full sweeps over the tracking table.
    pub poll_interval: Duration,
    /// Fixed delay between price requests inside a sweep.
    pub request_delay: Duration,
    /// Steam currency code used for quotes (5 = RUB).
    pub currency: u32,
    /// Days to keep price history.
    pub history_retention_days: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3600),
            request_delay: Duration::from_secs(5),
            currency: 5,
            history_retention_days: 30,
        }
    }
}

/// Decide whether a fresh quote warrants a notification.
fn should_notify(last_price: f64, current: f64) -> bool {
    current > last_price
}

/// Format the price-increase message.
fn format_increase_message(item_name: &str, last_price: f64, quote_text: &str) -> String {
    let mut msg = format!(
        "📈 <b>Price went up!</b>\n{}\nWas: {:.2} → Now: {}",
        teloxide::utils::html::escape(item_name),
        last_price,
        teloxide::utils::html::escape(quote_text)
    );
    let now = chrono::Utc::now();
    msg.push_str(&format!("\n\n⏰ {}", now.format("%Y-%m-%d %H:%M:%S UTC")));
    msg
}

/// Price monitor that sweeps tracked items and notifies on increases.
pub struct Monitor {
    db: Database,
    steam: SteamClient,
    bot: Arc<TelegramBot>,
    config: MonitorConfig,
}

impl Monitor {
    /// Create a new monitor.
    pub fn new(
        db: Database,
        steam: SteamClient,
        bot: Arc<TelegramBot>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            db,
            steam,
            bot,
            config,
        }
    }

    /// Run the sweep loop until the task is aborted.
    pub async fn run(self) {
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            "Starting price monitor"
        );

        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            if let Err(e) = self.sweep().await {
                error!(error = %e, "Price sweep failed");
            }
        }
    }

    /// One pass over every tracked item.
    pub async fn sweep(&self) -> Result<(), MonitorError> {
        let rows = self.db.all_tracking().await?;
        if rows.is_empty() {
            debug!("No tracked items, skipping sweep");
            return Ok(());
        }
        info!(items = rows.len(), "Starting price sweep");

        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.request_delay).await;
            }

            match self.steam.fetch_price(&row.item_name, self.config.currency).await {
                Ok(Some(quote)) => {
                    let Some(lowest) = quote.lowest else {
                        debug!(item = %row.item_name, "Quote had no parseable price");
                        continue;
                    };
                    self.db
                        .record_observation(&row.item_name, lowest, quote.median)
                        .await?;

                    if should_notify(row.last_price, lowest) {
                        let message =
                            format_increase_message(&row.item_name, row.last_price, &quote.lowest_text);
                        match self.bot.send_alert(row.chat_id, &message).await {
                            Ok(()) => {
                                info!(
                                    chat_id = row.chat_id,
                                    item = %row.item_name,
                                    last = row.last_price,
                                    current = lowest,
                                    "Price alert sent"
                                );
                                self.db.update_last_price(row.id, lowest).await?;
                            }
                            Err(e) => {
                                error!(chat_id = row.chat_id, error = %e, "Failed to send price alert");
                            }
                        }
                    }
                }
                Ok(None) => {
                    debug!(item = %row.item_name, "No market data");
                }
                Err(SteamError::RateLimited) => {
                    warn!("Rate limited by Steam, aborting the rest of this sweep");
                    break;
                }
                Err(e) => {
                    warn!(item = %row.item_name, error = %e, "Price fetch failed");
                }
            }
        }

        let deleted = self
            .db
            .cleanup_old_history(self.config.history_retention_days)
            .await?;
        if deleted > 0 {
            info!(deleted, "Cleaned up old price history");
        }

        Ok(())
    }
}
