//! SQLite cache for users, inventory contents, and tracked prices.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;
use tracker_core::InventoryItem;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// A user's cached inventory row, joined with the shared item table.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct UserItemRow {
    pub item_id: i64,
    pub name: String,
    pub category: String,
    pub icon: String,
    pub amount: i64,
}

/// A tracked item with its price baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingRow {
    pub id: i64,
    pub chat_id: i64,
    pub item_name: String,
    pub start_price: f64,
    pub last_price: f64,
    pub currency: String,
}

/// Outcome of a tracking insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Added,
    AlreadyTracked,
}

/// Database connection for the tracker.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to SQLite database at the given path.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                chat_id INTEGER PRIMARY KEY,
                steam_id TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                category TEXT NOT NULL,
                icon TEXT NOT NULL DEFAULT '',
                app_id INTEGER NOT NULL DEFAULT 730
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_items (
                chat_id INTEGER NOT NULL,
                item_id INTEGER NOT NULL,
                amount INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (chat_id, item_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tracking (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                item_name TEXT NOT NULL,
                start_price REAL NOT NULL,
                last_price REAL NOT NULL,
                currency TEXT NOT NULL DEFAULT '',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(chat_id, item_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_name TEXT NOT NULL,
                lowest REAL NOT NULL,
                median REAL,
                observed_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_price_history
            ON price_history(item_name, observed_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the linked Steam ID for a chat, if any.
    pub async fn get_user(&self, chat_id: i64) -> Result<Option<String>, DbError> {
        let steam_id =
            sqlx::query_scalar::<_, String>("SELECT steam_id FROM users WHERE chat_id = ?")
                .bind(chat_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(steam_id)
    }

    /// Link (or relink) a chat to a Steam ID.
    pub async fn save_user(&self, chat_id: i64, steam_id: &str) -> Result<(), DbError> {
        sqlx::query("INSERT OR REPLACE INTO users (chat_id, steam_id) VALUES (?, ?)")
            .bind(chat_id)
            .bind(steam_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Rebuild a user's cached inventory wholesale: old rows are deleted
    /// and the snapshot is reinserted inside one transaction. Items are
    /// upserted into the shared table, deduplicated by canonical name.
    pub async fn replace_user_inventory(
        &self,
        chat_id: i64,
        items: &[InventoryItem],
        app_id: u32,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_items WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        for item in items {
            let item_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO items (name, category, icon, app_id) VALUES (?, ?, ?, ?)
                ON CONFLICT(name) DO UPDATE SET category = excluded.category, icon = excluded.icon
                RETURNING id
                "#,
            )
            .bind(item.market_hash_name.as_str())
            .bind(item.category.label())
            .bind(item.icon_link())
            .bind(app_id as i64)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT OR REPLACE INTO user_items (chat_id, item_id, amount) VALUES (?, ?, ?)",
            )
            .bind(chat_id)
            .bind(item_id)
            .bind(item.amount as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// All cached inventory rows for a chat.
    pub async fn user_inventory(&self, chat_id: i64) -> Result<Vec<UserItemRow>, DbError> {
        let rows = sqlx::query_as::<_, (i64, String, String, String, i64)>(
            r#"
            SELECT i.id, i.name, i.category, i.icon, ui.amount
            FROM items i JOIN user_items ui ON i.id = ui.item_id
            WHERE ui.chat_id = ?
            ORDER BY i.name
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(item_id, name, category, icon, amount)| UserItemRow {
                item_id,
                name,
                category,
                icon,
                amount,
            })
            .collect())
    }

    /// Category labels present in a user's cached inventory, with counts.
    pub async fn user_categories(&self, chat_id: i64) -> Result<Vec<(String, i64)>, DbError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT i.category, COUNT(*)
            FROM items i JOIN user_items ui ON i.id = ui.item_id
            WHERE ui.chat_id = ?
            GROUP BY i.category
            ORDER BY i.category
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Cached inventory rows for one category of a chat.
    pub async fn items_in_category(
        &self,
        chat_id: i64,
        category: &str,
    ) -> Result<Vec<UserItemRow>, DbError> {
        let rows = sqlx::query_as::<_, (i64, String, String, String, i64)>(
            r#"
            SELECT i.id, i.name, i.category, i.icon, ui.amount
            FROM items i JOIN user_items ui ON i.id = ui.item_id
            WHERE ui.chat_id = ? AND i.category = ?
            ORDER BY i.name
            "#,
        )
        .bind(chat_id)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(item_id, name, category, icon, amount)| UserItemRow {
                item_id,
                name,
                category,
                icon,
                amount,
            })
            .collect())
    }

    /// Look up an item's canonical name, category, and icon by id.
    pub async fn item_by_id(
        &self,
        item_id: i64,
    ) -> Result<Option<(String, String, String)>, DbError> {
        let row = sqlx::query_as::<_, (String, String, String)>(
            "SELECT name, category, icon FROM items WHERE id = ?",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Start tracking an item for a chat with the given price baseline.
    pub async fn add_tracking(
        &self,
        chat_id: i64,
        item_name: &str,
        price: f64,
        currency: &str,
    ) -> Result<TrackOutcome, DbError> {
        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM tracking WHERE chat_id = ? AND item_name = ?",
        )
        .bind(chat_id)
        .bind(item_name)
        .fetch_optional(&self.pool)
        .await?;

        if existing.is_some() {
            return Ok(TrackOutcome::AlreadyTracked);
        }

        sqlx::query(
            r#"
            INSERT INTO tracking (chat_id, item_name, start_price, last_price, currency)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(chat_id)
        .bind(item_name)
        .bind(price)
        .bind(price)
        .bind(currency)
        .execute(&self.pool)
        .await?;

        Ok(TrackOutcome::Added)
    }

    /// Stop tracking one item. Returns the number of rows removed.
    pub async fn remove_tracking(&self, chat_id: i64, item_name: &str) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM tracking WHERE chat_id = ? AND item_name = ?")
            .bind(chat_id)
            .bind(item_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Stop tracking everything for a chat.
    pub async fn remove_all_tracking(&self, chat_id: i64) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM tracking WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Names of the items a chat is tracking.
    pub async fn tracked_names_for_user(&self, chat_id: i64) -> Result<Vec<String>, DbError> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT item_name FROM tracking WHERE chat_id = ? ORDER BY item_name",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// Full tracking rows for a chat.
    pub async fn tracking_for_user(&self, chat_id: i64) -> Result<Vec<TrackingRow>, DbError> {
        let rows = sqlx::query_as::<_, (i64, i64, String, f64, f64, String)>(
            r#"
            SELECT id, chat_id, item_name, start_price, last_price, currency
            FROM tracking WHERE chat_id = ? ORDER BY item_name
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(tracking_row).collect())
    }

    /// Every tracking row, across all users. The monitor sweeps this.
    pub async fn all_tracking(&self) -> Result<Vec<TrackingRow>, DbError> {
        let rows = sqlx::query_as::<_, (i64, i64, String, f64, f64, String)>(
            "SELECT id, chat_id, item_name, start_price, last_price, currency FROM tracking ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(tracking_row).collect())
    }

    /// Persist a new price baseline after a notification.
    pub async fn update_last_price(&self, id: i64, price: f64) -> Result<(), DbError> {
        sqlx::query("UPDATE tracking SET last_price = ? WHERE id = ?")
            .bind(price)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Unsubscribe tracked items that are no longer in the inventory
    /// snapshot. Returns the names that were removed.
    pub async fn prune_missing_tracked(
        &self,
        chat_id: i64,
        current_names: &[String],
    ) -> Result<Vec<String>, DbError> {
        let tracked = self.tracked_names_for_user(chat_id).await?;
        let current: HashSet<&str> = current_names.iter().map(String::as_str).collect();
        let removed: Vec<String> = tracked
            .into_iter()
            .filter(|name| !current.contains(name.as_str()))
            .collect();

        if removed.is_empty() {
            return Ok(removed);
        }

        let placeholders = vec!["?"; removed.len()].join(",");
        let sql = format!(
            "DELETE FROM tracking WHERE chat_id = ? AND item_name IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql).bind(chat_id);
        for name in &removed {
            query = query.bind(name);
        }
        query.execute(&self.pool).await?;

        Ok(removed)
    }

    /// Append a price observation for an item.
    pub async fn record_observation(
        &self,
        item_name: &str,
        lowest: f64,
        median: Option<f64>,
    ) -> Result<(), DbError> {
        sqlx::query("INSERT INTO price_history (item_name, lowest, median) VALUES (?, ?, ?)")
            .bind(item_name)
            .bind(lowest)
            .bind(median)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Most recent price observation for an item.
    pub async fn latest_observation(
        &self,
        item_name: &str,
    ) -> Result<Option<(f64, Option<f64>)>, DbError> {
        let row = sqlx::query_as::<_, (f64, Option<f64>)>(
            r#"
            SELECT lowest, median FROM price_history
            WHERE item_name = ?
            ORDER BY observed_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(item_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Clean up old history entries (older than days).
    pub async fn cleanup_old_history(&self, days: i64) -> Result<u64, DbError> {
        let result = sqlx::query(
            "DELETE FROM price_history WHERE observed_at < datetime('now', ? || ' days')",
        )
        .bind(-days)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn tracking_row(
    (id, chat_id, item_name, start_price, last_price, currency): (i64, i64, String, f64, f64, String),
) -> TrackingRow {
    TrackingRow {
        id,
        chat_id,
        item_name,
        start_price,
        last_price,
        currency,
    }
}
