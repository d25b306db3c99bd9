//! Telegram bot handlers.
//!
//! Commands and inline-keyboard callbacks over the cached inventory, plus
//! the linear link wizard: a chat is either idle, waiting for a profile
//! link, or browsing categories/items via callback buttons.

use crate::db::{Database, TrackOutcome, TrackingRow, UserItemRow};
use std::sync::Arc;
use teloxide::dispatching::dialogue::{Dialogue, GetChatId, InMemStorage, InMemStorageError};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use teloxide::utils::command::BotCommands;
use teloxide::utils::html;
use thiserror::Error;
use tracker_core::{Category, ProfileRef, SteamId};
use tracker_steam::{SteamClient, SteamError};
use tracing::{info, warn};

/// Cap on item buttons per category page; Telegram keyboards get unwieldy
/// well before the hard API limit.
const MAX_ITEM_BUTTONS: usize = 30;

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
    #[error("Dialogue storage error: {0}")]
    Storage(#[from] InMemStorageError),
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),
    #[error("Steam error: {0}")]
    Steam(#[from] SteamError),
}

type HandlerResult = Result<(), TelegramError>;
type WizardDialogue = Dialogue<WizardState, InMemStorage<WizardState>>;

/// Linear per-user wizard state.
#[derive(Debug, Clone, Default)]
pub enum WizardState {
    #[default]
    Idle,
    /// Waiting for a profile link or SteamID64 as free text.
    AwaitingLink,
    /// Category keyboard is on screen.
    BrowsingCategories,
    /// Item keyboard for one category is on screen.
    BrowsingItems(String),
}

/// Bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and show the main menu")]
    Start,
    #[command(description = "Link a Steam profile")]
    Link,
    #[command(description = "Browse your cached inventory")]
    Items,
    #[command(description = "Show tracked items and their prices")]
    Status,
    #[command(description = "Re-fetch your inventory from Steam")]
    Refresh,
    #[command(description = "Stop tracking an item. Usage: /untrack <name> (or 'all')")]
    Untrack(String),
    #[command(description = "Show help")]
    Help,
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
    db: Database,
    steam: SteamClient,
    currency: u32,
}

impl TelegramBot {
    /// Create a new bot with the given token.
    pub fn new(token: &str, db: Database, steam: SteamClient, currency: u32) -> Self {
        Self {
            bot: Bot::new(token),
            db,
            steam,
            currency,
        }
    }

    /// Get the underlying bot for sending messages.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Send a notification message to a chat.
    pub async fn send_alert(&self, chat_id: i64, message: &str) -> Result<(), TelegramError> {
        self.bot
            .send_message(ChatId(chat_id), message)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    /// Run the bot dispatcher until shutdown.
    pub async fn run(self: Arc<Self>) {
        let bot = self.bot.clone();

        let commands = Arc::clone(&self);
        let texts = Arc::clone(&self);
        let callbacks = Arc::clone(&self);

        let message_handler = Update::filter_message()
            .enter_dialogue::<Message, InMemStorage<WizardState>, WizardState>()
            .branch(dptree::entry().filter_command::<Command>().endpoint(
                move |bot: Bot, dialogue: WizardDialogue, msg: Message, cmd: Command| {
                    let this = Arc::clone(&commands);
                    async move { this.handle_command(bot, dialogue, msg, cmd).await }
                },
            ))
            .branch(dptree::endpoint(
                move |bot: Bot, dialogue: WizardDialogue, msg: Message| {
                    let this = Arc::clone(&texts);
                    async move { this.handle_message(bot, dialogue, msg).await }
                },
            ));

        let callback_handler = Update::filter_callback_query()
            .enter_dialogue::<CallbackQuery, InMemStorage<WizardState>, WizardState>()
            .endpoint(move |bot: Bot, dialogue: WizardDialogue, q: CallbackQuery| {
                let this = Arc::clone(&callbacks);
                async move { this.handle_callback(bot, dialogue, q).await }
            });

        let handler = dptree::entry()
            .branch(message_handler)
            .branch(callback_handler);

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![InMemStorage::<WizardState>::new()])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    async fn handle_command(
        &self,
        bot: Bot,
        dialogue: WizardDialogue,
        msg: Message,
        cmd: Command,
    ) -> HandlerResult {
        let chat_id = msg.chat.id;

        match cmd {
            Command::Start => {
                let linked = self.db.get_user(chat_id.0).await?.is_some();
                let text = if linked {
                    "Welcome back! Browse your items or check tracked prices with /status."
                } else {
                    "Hi! I watch Steam marketplace prices for the items in your inventory.\n\n\
                     Link your Steam profile to get started."
                };
                bot.send_message(chat_id, text)
                    .reply_markup(main_menu_keyboard(linked))
                    .await?;
                dialogue.update(WizardState::Idle).await?;
            }

            Command::Link => {
                self.prompt_link(&bot, chat_id, &dialogue).await?;
            }

            Command::Items => {
                self.show_categories(&bot, chat_id, &dialogue).await?;
            }

            Command::Status => {
                let rows = self.db.tracking_for_user(chat_id.0).await?;
                if rows.is_empty() {
                    bot.send_message(
                        chat_id,
                        "You're not tracking anything yet. Pick an item via /items.",
                    )
                    .await?;
                } else {
                    let mut observed = Vec::with_capacity(rows.len());
                    for row in &rows {
                        observed.push(
                            self.db
                                .latest_observation(&row.item_name)
                                .await?
                                .map(|(lowest, _)| lowest),
                        );
                    }
                    bot.send_message(chat_id, format_status(&rows, &observed))
                        .await?;
                }
            }

            Command::Refresh => {
                let Some(steam_id) = self.linked_steam_id(chat_id.0).await? else {
                    bot.send_message(chat_id, "No Steam profile linked yet. Use /link first.")
                        .await?;
                    return Ok(());
                };
                bot.send_message(chat_id, "Fetching your inventory from Steam...")
                    .await?;
                match self.refresh_inventory(chat_id.0, steam_id).await {
                    Ok((count, removed)) => {
                        bot.send_message(chat_id, format_refresh_report(count, &removed))
                            .await?;
                    }
                    Err(TelegramError::Steam(e)) => {
                        bot.send_message(chat_id, steam_error_text(&e)).await?;
                    }
                    Err(e) => return Err(e),
                }
            }

            Command::Untrack(value) => {
                let value = value.trim();
                if value.is_empty() {
                    bot.send_message(
                        chat_id,
                        "Usage: /untrack <exact item name>, or /untrack all",
                    )
                    .await?;
                } else if value.eq_ignore_ascii_case("all") {
                    let removed = self.db.remove_all_tracking(chat_id.0).await?;
                    bot.send_message(chat_id, format!("Stopped tracking {removed} item(s)."))
                        .await?;
                } else {
                    let removed = self.db.remove_tracking(chat_id.0, value).await?;
                    if removed > 0 {
                        bot.send_message(chat_id, format!("Stopped tracking {value}."))
                            .await?;
                    } else {
                        bot.send_message(chat_id, format!("{value} wasn't being tracked."))
                            .await?;
                    }
                }
            }

            Command::Help => {
                bot.send_message(chat_id, Command::descriptions().to_string())
                    .await?;
            }
        }

        Ok(())
    }

    async fn handle_message(
        &self,
        bot: Bot,
        dialogue: WizardDialogue,
        msg: Message,
    ) -> HandlerResult {
        let Some(text) = msg.text().map(str::trim) else {
            return Ok(());
        };
        let chat_id = msg.chat.id;
        let state = dialogue.get().await?.unwrap_or_default();

        match state {
            WizardState::AwaitingLink => {
                let Some(profile) = ProfileRef::parse(text) else {
                    bot.send_message(
                        chat_id,
                        "That doesn't look like a Steam profile. Send a SteamID64, \
                         a steamcommunity.com/profiles/... link, or an /id/... vanity link.",
                    )
                    .await?;
                    return Ok(());
                };

                match self.link_profile(chat_id.0, &profile).await {
                    Ok(Some((count, removed))) => {
                        bot.send_message(
                            chat_id,
                            format!("Profile linked! {}", format_refresh_report(count, &removed)),
                        )
                        .reply_markup(main_menu_keyboard(true))
                        .await?;
                        dialogue.update(WizardState::Idle).await?;
                    }
                    Ok(None) => {
                        bot.send_message(
                            chat_id,
                            "Couldn't resolve that profile. Check the link and try again.",
                        )
                        .await?;
                    }
                    Err(TelegramError::Steam(e)) => {
                        bot.send_message(chat_id, steam_error_text(&e)).await?;
                    }
                    Err(e) => return Err(e),
                }
            }

            WizardState::BrowsingCategories | WizardState::BrowsingItems(_) => {
                bot.send_message(chat_id, "Use the buttons to browse, or /help for commands.")
                    .await?;
            }

            WizardState::Idle => {
                bot.send_message(chat_id, "I didn't get that. Use /help to see commands.")
                    .await?;
            }
        }

        Ok(())
    }

    async fn handle_callback(
        &self,
        bot: Bot,
        dialogue: WizardDialogue,
        q: CallbackQuery,
    ) -> HandlerResult {
        let Some(data) = q.data.clone() else {
            return Ok(());
        };
        let chat_id = q.chat_id().unwrap_or(ChatId(q.from.id.0 as i64));

        bot.answer_callback_query(q.id.clone()).await?;

        match data.as_str() {
            "link" => {
                self.prompt_link(&bot, chat_id, &dialogue).await?;
            }

            "back:cats" => {
                self.show_categories(&bot, chat_id, &dialogue).await?;
            }

            other if other.starts_with("cat:") => {
                let label = other.trim_start_matches("cat:");
                if Category::from_label(label).is_none() {
                    warn!(label, "Unknown category in callback data");
                    return Ok(());
                }
                let items = self.db.items_in_category(chat_id.0, label).await?;
                if items.is_empty() {
                    bot.send_message(chat_id, "Nothing in that category any more.")
                        .await?;
                    return Ok(());
                }
                let text = if items.len() > MAX_ITEM_BUTTONS {
                    format!("{label}, showing first {MAX_ITEM_BUTTONS} of {}:", items.len())
                } else {
                    format!("{label}:")
                };
                bot.send_message(chat_id, text)
                    .reply_markup(items_keyboard(&items))
                    .await?;
                dialogue
                    .update(WizardState::BrowsingItems(label.to_string()))
                    .await?;
            }

            other if other.starts_with("item:") => {
                let Ok(item_id) = other.trim_start_matches("item:").parse::<i64>() else {
                    return Ok(());
                };
                self.show_item_detail(&bot, chat_id, item_id).await?;
            }

            other if other.starts_with("track:") => {
                let Ok(item_id) = other.trim_start_matches("track:").parse::<i64>() else {
                    return Ok(());
                };
                self.track_item(&bot, chat_id, item_id).await?;
            }

            other if other.starts_with("untrack:") => {
                let Ok(item_id) = other.trim_start_matches("untrack:").parse::<i64>() else {
                    return Ok(());
                };
                let Some((name, _, _)) = self.db.item_by_id(item_id).await? else {
                    return Ok(());
                };
                let removed = self.db.remove_tracking(chat_id.0, &name).await?;
                if removed > 0 {
                    bot.send_message(chat_id, format!("Stopped tracking {name}."))
                        .await?;
                } else {
                    bot.send_message(chat_id, format!("{name} wasn't being tracked."))
                        .await?;
                }
            }

            _ => {}
        }

        Ok(())
    }

    async fn prompt_link(
        &self,
        bot: &Bot,
        chat_id: ChatId,
        dialogue: &WizardDialogue,
    ) -> HandlerResult {
        bot.send_message(
            chat_id,
            "Send me your Steam profile link or SteamID64.\n\
             Examples:\n\
             76561198012345678\n\
             https://steamcommunity.com/profiles/76561198012345678\n\
             https://steamcommunity.com/id/yourname",
        )
        .await?;
        dialogue.update(WizardState::AwaitingLink).await?;
        Ok(())
    }

    async fn show_categories(
        &self,
        bot: &Bot,
        chat_id: ChatId,
        dialogue: &WizardDialogue,
    ) -> HandlerResult {
        let Some(steam_id) = self.linked_steam_id(chat_id.0).await? else {
            bot.send_message(chat_id, "No Steam profile linked yet. Use /link first.")
                .await?;
            return Ok(());
        };

        let mut categories = self.db.user_categories(chat_id.0).await?;
        if categories.is_empty() {
            bot.send_message(chat_id, "Inventory cache is empty, fetching from Steam...")
                .await?;
            match self.refresh_inventory(chat_id.0, steam_id).await {
                Ok((0, _)) => {
                    bot.send_message(chat_id, "Your inventory came back empty.")
                        .await?;
                    return Ok(());
                }
                Ok(_) => {}
                Err(TelegramError::Steam(e)) => {
                    bot.send_message(chat_id, steam_error_text(&e)).await?;
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
            categories = self.db.user_categories(chat_id.0).await?;
        }

        bot.send_message(chat_id, "Your inventory by category:")
            .reply_markup(categories_keyboard(&categories))
            .await?;
        dialogue.update(WizardState::BrowsingCategories).await?;
        Ok(())
    }

    async fn show_item_detail(&self, bot: &Bot, chat_id: ChatId, item_id: i64) -> HandlerResult {
        let Some((name, category, icon)) = self.db.item_by_id(item_id).await? else {
            bot.send_message(chat_id, "That item is gone from the cache.")
                .await?;
            return Ok(());
        };

        let quote = match self.steam.fetch_price(&name, self.currency).await {
            Ok(q) => q,
            Err(e) => {
                bot.send_message(chat_id, steam_error_text(&e)).await?;
                return Ok(());
            }
        };

        let title = if icon.is_empty() {
            format!("<b>{}</b>", html::escape(&name))
        } else {
            format!("<a href=\"{}\"><b>{}</b></a>", icon, html::escape(&name))
        };
        let text = match quote {
            Some(quote) => {
                let mut lines = format!("{title}\nLowest: {}", html::escape(&quote.lowest_text));
                if let Some(median) = quote.median {
                    lines.push_str(&format!("\nMedian: {median:.2}"));
                }
                if let Some(volume) = quote.volume {
                    lines.push_str(&format!("\nSold last 24h: {volume}"));
                }
                lines
            }
            None => format!("{title}\nNo market data right now."),
        };

        bot.send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(item_detail_keyboard(item_id, &category))
            .await?;
        Ok(())
    }

    async fn track_item(&self, bot: &Bot, chat_id: ChatId, item_id: i64) -> HandlerResult {
        let Some((name, _, _)) = self.db.item_by_id(item_id).await? else {
            return Ok(());
        };

        let quote = match self.steam.fetch_price(&name, self.currency).await {
            Ok(q) => q,
            Err(e) => {
                bot.send_message(chat_id, steam_error_text(&e)).await?;
                return Ok(());
            }
        };

        let Some(lowest) = quote.as_ref().and_then(|q| q.lowest) else {
            bot.send_message(
                chat_id,
                "No market data right now, so there's no baseline to track from.",
            )
            .await?;
            return Ok(());
        };
        let quote = quote.unwrap_or_default();

        let outcome = self
            .db
            .add_tracking(chat_id.0, &name, lowest, &self.currency.to_string())
            .await?;
        match outcome {
            TrackOutcome::Added => {
                info!(chat_id = chat_id.0, item = %name, baseline = lowest, "Tracking added");
                bot.send_message(
                    chat_id,
                    format!(
                        "Now tracking {} at {}. I'll ping you when the price goes up.",
                        name, quote.lowest_text
                    ),
                )
                .await?;
            }
            TrackOutcome::AlreadyTracked => {
                bot.send_message(chat_id, format!("{name} is already being tracked."))
                    .await?;
            }
        }
        Ok(())
    }

    async fn linked_steam_id(&self, chat_id: i64) -> Result<Option<SteamId>, TelegramError> {
        Ok(self
            .db
            .get_user(chat_id)
            .await?
            .and_then(|s| SteamId::parse(&s)))
    }

    /// Resolve, store, and prime the cache for a newly linked profile.
    /// Returns `None` when the vanity name cannot be resolved.
    async fn link_profile(
        &self,
        chat_id: i64,
        profile: &ProfileRef,
    ) -> Result<Option<(usize, Vec<String>)>, TelegramError> {
        let Some(steam_id) = self.steam.resolve(profile).await? else {
            return Ok(None);
        };
        self.db.save_user(chat_id, &steam_id.to_string()).await?;
        info!(chat_id, steam_id = %steam_id, "Linked Steam profile");

        let result = self.refresh_inventory(chat_id, steam_id).await?;
        Ok(Some(result))
    }

    /// Fetch the remote inventory and rebuild the cache for a chat.
    /// Returns the item count and the tracking entries that were dropped
    /// because their item left the inventory.
    async fn refresh_inventory(
        &self,
        chat_id: i64,
        steam_id: SteamId,
    ) -> Result<(usize, Vec<String>), TelegramError> {
        let items = self.steam.fetch_inventory(steam_id).await?;
        self.db
            .replace_user_inventory(chat_id, &items, self.steam.app_id())
            .await?;

        let names: Vec<String> = items
            .iter()
            .map(|i| i.market_hash_name.to_string())
            .collect();
        let removed = self.db.prune_missing_tracked(chat_id, &names).await?;
        if !removed.is_empty() {
            info!(chat_id, removed = removed.len(), "Pruned tracking for missing items");
        }

        info!(chat_id, items = items.len(), "Inventory cache rebuilt");
        Ok((items.len(), removed))
    }
}

fn steam_error_text(err: &SteamError) -> &'static str {
    match err {
        SteamError::PrivateProfile => {
            "Your Steam inventory is private. Open it in your privacy settings and try again."
        }
        SteamError::RateLimited => "Steam is rate limiting us. Try again in 5-10 minutes.",
        _ => "Steam request failed. Try again later.",
    }
}

fn main_menu_keyboard(linked: bool) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if linked {
        rows.push(vec![InlineKeyboardButton::callback(
            "📦 My items",
            "back:cats",
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        "🔗 Link profile",
        "link",
    )]);
    InlineKeyboardMarkup::new(rows)
}

fn categories_keyboard(categories: &[(String, i64)]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = categories
        .iter()
        .map(|(label, count)| {
            vec![InlineKeyboardButton::callback(
                format!("{label} ({count})"),
                format!("cat:{label}"),
            )]
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

fn items_keyboard(items: &[UserItemRow]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = items
        .iter()
        .take(MAX_ITEM_BUTTONS)
        .map(|item| {
            let label = if item.amount > 1 {
                format!("{} ×{}", item.name, item.amount)
            } else {
                item.name.clone()
            };
            vec![InlineKeyboardButton::callback(
                label,
                format!("item:{}", item.item_id),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("« Back", "back:cats")]);
    InlineKeyboardMarkup::new(rows)
}

fn item_detail_keyboard(item_id: i64, category: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("🔔 Track", format!("track:{item_id}")),
            InlineKeyboardButton::callback("🔕 Untrack", format!("untrack:{item_id}")),
        ],
        vec![InlineKeyboardButton::callback(
            "« Back",
            format!("cat:{category}"),
        )],
    ])
}

/// One line per tracked item; `observed` carries the newest recorded
/// market price per row, when there is one.
fn format_status(rows: &[TrackingRow], observed: &[Option<f64>]) -> String {
    let mut lines = vec!["Tracked items:".to_string()];
    for (i, row) in rows.iter().enumerate() {
        let mut line = format!(
            "• {}: started at {:.2}, last seen {:.2}",
            row.item_name, row.start_price, row.last_price
        );
        if let Some(Some(market)) = observed.get(i) {
            line.push_str(&format!(" (market: {market:.2})"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn format_refresh_report(count: usize, removed: &[String]) -> String {
    let mut text = format!("Cached {count} marketable item(s).");
    if !removed.is_empty() {
        text.push_str(&format!(
            "\nStopped tracking (no longer in your inventory): {}",
            removed.join(", ")
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(name: &str, start: f64, last: f64) -> TrackingRow {
        TrackingRow {
            id: 1,
            chat_id: 1,
            item_name: name.to_string(),
            start_price: start,
            last_price: last,
            currency: "5".to_string(),
        }
    }

    #[test]
    fn test_format_status() {
        let rows = vec![row("AK-47 | Redline (Field-Tested)", 10.0, 12.5)];
        let text = format_status(&rows, &[None]);
        assert_eq!(
            text,
            "Tracked items:\n• AK-47 | Redline (Field-Tested): started at 10.00, last seen 12.50"
        );
    }

    #[test]
    fn test_format_status_with_observation() {
        let rows = vec![row("Revolution Case", 1.0, 1.5)];
        let text = format_status(&rows, &[Some(1.75)]);
        assert!(text.ends_with("(market: 1.75)"));
    }

    #[test]
    fn test_format_refresh_report() {
        assert_eq!(
            format_refresh_report(3, &[]),
            "Cached 3 marketable item(s)."
        );
        let removed = vec!["Gone Item".to_string()];
        assert_eq!(
            format_refresh_report(3, &removed),
            "Cached 3 marketable item(s).\nStopped tracking (no longer in your inventory): Gone Item"
        );
    }

    #[test]
    fn test_categories_keyboard_layout() {
        let categories = vec![("Rifles".to_string(), 2), ("Cases".to_string(), 5)];
        let markup = categories_keyboard(&categories);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 1);
        assert_eq!(markup.inline_keyboard[0][0].text, "Rifles (2)");
    }

    #[test]
    fn test_items_keyboard_caps_buttons() {
        let items: Vec<UserItemRow> = (0..40)
            .map(|i| UserItemRow {
                item_id: i,
                name: format!("Item {i}"),
                category: "Other".to_string(),
                icon: String::new(),
                amount: 1,
            })
            .collect();
        let markup = items_keyboard(&items);
        // 30 item rows plus the back row
        assert_eq!(markup.inline_keyboard.len(), MAX_ITEM_BUTTONS + 1);
    }

    #[test]
    fn test_items_keyboard_amount_suffix() {
        let items = vec![UserItemRow {
            item_id: 7,
            name: "Revolution Case".to_string(),
            category: "Cases".to_string(),
            icon: String::new(),
            amount: 12,
        }];
        let markup = items_keyboard(&items);
        assert_eq!(markup.inline_keyboard[0][0].text, "Revolution Case ×12");
    }

    #[test]
    fn test_steam_error_text() {
        assert!(steam_error_text(&SteamError::PrivateProfile).contains("private"));
        assert!(steam_error_text(&SteamError::RateLimited).contains("rate limiting"));
        assert!(steam_error_text(&SteamError::Parse("HTTP 500".into())).contains("failed"));
    }
}
