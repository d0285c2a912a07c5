use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::auction::AuctionApi;
use crate::catalog::ItemCatalog;
use crate::favorites::FavoritesHandle;
use crate::intent::{Callback, Intent, ItemCommand};
use crate::reporter::{
    daily_summaries, history_message, lots_message, split_message, truncate_chars,
};
use crate::types::{CatalogScope, ItemRef, Region};
use crate::{LIST_LIMIT, MAX_MESSAGE_CHARS, MAX_NOTICE_CHARS};

const WELCOME: &str = "👋 Привет. Это бот для отслеживания цен и активности предметов на аукционе Stalcraft.\n\n\
🔎 Можно просто написать название предмета, и бот покажет его ID.\n\n\
Также доступны кнопки ниже.";

const MAIN_MENU: &str = "📋 Главное меню.\n\n\
🔎 Можно просто написать название предмета, и бот покажет его ID.";

const HELP: &str = "ℹ️ Справка по использованию бота:\n\n\
🔎 Поиск предметов:\n\
- можно искать по полному или частичному названию;\n\
- примеры: 'штрих', 'HK417', 'костюм'.\n\n\
📋 Команды:\n\
- /profile — профиль;\n\
- /favorites — избранные предметы;\n\
- /add <название> — добавить в избранное;\n\
- /remove <название> — удалить из избранного;\n\
- /history <название> — история цен на аукционе;\n\
- /lots <название> — активные лоты;\n\
- /search <название> — найти ID предмета.\n\n\
Можно просто написать название предмета в чат. 💬";

/// Button labels are cut to this many characters of the item name.
const BUTTON_NAME_CHARS: usize = 20;

/// Queries echoed back in replies are cut to this many characters.
const QUERY_ECHO_CHARS: usize = 100;

/// Inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub callback: Callback,
}

impl Button {
    fn new(label: impl Into<String>, callback: Callback) -> Self {
        Self {
            label: label.into(),
            callback,
        }
    }
}

/// A message to send, with an optional inline keyboard (rows of buttons).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Vec<Vec<Button>>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Vec::new(),
        }
    }

    fn with_keyboard(text: impl Into<String>, keyboard: Vec<Vec<Button>>) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}

/// Short popup shown in response to a button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    /// Modal alert instead of a transient toast.
    pub alert: bool,
}

impl Notice {
    /// Popup text is capped at [`MAX_NOTICE_CHARS`]; Telegram rejects longer ones.
    pub fn new(text: &str, alert: bool) -> Self {
        Self {
            text: truncate_chars(text, MAX_NOTICE_CHARS),
            alert,
        }
    }
}

/// Response to a button press: an optional popup and an optional in-place
/// edit of the message that carried the button.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackReply {
    pub notice: Option<Notice>,
    pub edit: Option<Reply>,
}

impl CallbackReply {
    fn edit(reply: Reply) -> Self {
        Self {
            notice: None,
            edit: Some(reply),
        }
    }

    fn toast_and_edit(text: &str, reply: Reply) -> Self {
        Self {
            notice: Some(Notice::new(text, false)),
            edit: Some(reply),
        }
    }

    fn alert(text: &str) -> Self {
        Self {
            notice: Some(Notice::new(text, true)),
            edit: None,
        }
    }
}

/// Dispatches parsed user input against the catalog, favorites and auction API.
#[derive(Clone)]
pub struct Handler {
    catalog: Arc<ItemCatalog>,
    favorites: FavoritesHandle,
    auction: Arc<dyn AuctionApi>,
    region: Region,
}

impl Handler {
    pub fn new(
        catalog: Arc<ItemCatalog>,
        favorites: FavoritesHandle,
        auction: Arc<dyn AuctionApi>,
        region: Region,
    ) -> Self {
        Self {
            catalog,
            favorites,
            auction,
            region,
        }
    }

    fn resolve(&self, query: &str) -> Option<ItemRef> {
        self.catalog.resolve(query, CatalogScope::Both)
    }

    /// Handle a text message. Store failures are returned as errors.
    pub async fn handle_message(&self, user_id: &str, intent: Intent) -> Result<Vec<Reply>> {
        let replies = match intent {
            Intent::Start => {
                self.favorites.get_or_create_profile(user_id).await?;
                vec![Reply::with_keyboard(
                    WELCOME,
                    vec![
                        vec![
                            Button::new("👤 Профиль", Callback::Profile),
                            Button::new("⭐ Избранное", Callback::Favorites),
                        ],
                        vec![Button::new("ℹ️ Справка", Callback::Help)],
                    ],
                )]
            }
            Intent::Help => vec![Reply::text(HELP)],
            Intent::Profile => vec![self.profile_view(user_id).await?],
            Intent::Favorites => self.favorites_message(user_id).await?,
            Intent::Search(query) | Intent::FreeText(query) => match self.resolve(&query) {
                Some(item) => vec![self.item_card(user_id, &item).await?],
                None => vec![Reply::text(format!(
                    "❌ Предмет '{}' не найден. Попробуйте другое название.",
                    truncate_chars(&query, QUERY_ECHO_CHARS)
                ))],
            },
            Intent::History(query) => match self.resolve(&query) {
                Some(item) => self.history_replies(&item).await,
                None => vec![not_found(&query)],
            },
            Intent::Lots(query) => match self.resolve(&query) {
                Some(item) => vec![self.lots_reply(&item).await],
                None => vec![not_found(&query)],
            },
            Intent::AddFavorite(query) => match self.resolve(&query) {
                Some(item) => {
                    let name = item.name.clone();
                    if self.favorites.add_favorite(user_id, item).await? {
                        info!("User {user_id} added {name} to favorites");
                        vec![Reply::text(format!(
                            "⭐ Предмет добавлен в избранное.\n\n📦 {name}\n\n\
                             Используйте /favorites, чтобы посмотреть список."
                        ))]
                    } else {
                        vec![Reply::text(format!(
                            "⚠️ Предмет '{name}' уже есть в избранном."
                        ))]
                    }
                }
                None => vec![not_found(&query)],
            },
            Intent::RemoveFavorite(query) => match self.resolve(&query) {
                Some(item) => {
                    if self.favorites.remove_favorite(user_id, &item.id).await? {
                        info!("User {user_id} removed {} from favorites", item.name);
                        vec![Reply::text(format!(
                            "🗑️ Предмет удален из избранного.\n\n📦 {}",
                            item.name
                        ))]
                    } else {
                        vec![Reply::text(format!(
                            "⚠️ Предмет '{}' не найден в избранном.",
                            item.name
                        ))]
                    }
                }
                None => vec![not_found(&query)],
            },
            Intent::MissingArgument(cmd) => vec![missing_argument(cmd)],
            Intent::Unknown(cmd) => vec![Reply::text(format!(
                "❓ Неизвестная команда /{}. Список команд: /help",
                truncate_chars(&cmd, QUERY_ECHO_CHARS)
            ))],
        };
        Ok(replies)
    }

    /// Progress message to send before [`Handler::handle_message`] starts a
    /// slow auction request, if the intent needs one.
    pub fn pending_reply(&self, intent: &Intent) -> Option<Reply> {
        let text = match intent {
            Intent::History(query) if self.resolve(query).is_some() => {
                "⏳ Загружаю историю цен..."
            }
            Intent::Lots(query) if self.resolve(query).is_some() => "⏳ Загружаю активные лоты...",
            _ => return None,
        };
        Some(Reply::text(text))
    }

    /// Handle an inline button press.
    pub async fn handle_callback(&self, user_id: &str, callback: Callback) -> Result<CallbackReply> {
        let reply = match callback {
            Callback::MainMenu => CallbackReply::edit(Reply::with_keyboard(
                MAIN_MENU,
                vec![
                    vec![
                        Button::new("Мой профиль", Callback::Profile),
                        Button::new("Избранное", Callback::Favorites),
                    ],
                    vec![Button::new("Справка", Callback::Help)],
                ],
            )),
            Callback::Profile => CallbackReply::edit(self.profile_view(user_id).await?),
            Callback::Favorites => CallbackReply::edit(self.favorites_view(user_id).await?),
            Callback::Help => CallbackReply::edit(Reply::with_keyboard(
                HELP,
                vec![vec![Button::new("Назад", Callback::MainMenu)]],
            )),
            Callback::History(id) => {
                let Some(item) = self.catalog.find_by_id(&id) else {
                    return Ok(CallbackReply::alert("Предмет не найден"));
                };
                match self.auction.fetch_price_history(self.region, &item.id).await {
                    Ok(history) if !history.is_empty() => {
                        let text = history_message(&item.name, &daily_summaries(&history));
                        CallbackReply::edit(Reply::with_keyboard(
                            truncate_chars(&text, MAX_MESSAGE_CHARS),
                            vec![vec![Button::new("Назад", Callback::Favorites)]],
                        ))
                    }
                    Ok(_) => CallbackReply::alert("История не найдена"),
                    Err(e) => {
                        warn!("History request for {} failed: {e}", item.id);
                        CallbackReply::alert(&format!("Ошибка: {e}"))
                    }
                }
            }
            Callback::Lots(id) => {
                let Some(item) = self.catalog.find_by_id(&id) else {
                    return Ok(CallbackReply::alert("Предмет не найден"));
                };
                match self.auction.fetch_active_lots(&item.id, self.region).await {
                    Ok(lots) if !lots.is_empty() => CallbackReply::edit(Reply::with_keyboard(
                        truncate_chars(&lots_message(&item.name, &lots), MAX_MESSAGE_CHARS),
                        vec![vec![Button::new("Назад", Callback::Favorites)]],
                    )),
                    Ok(_) => CallbackReply::alert("Активных лотов нет"),
                    Err(e) => {
                        warn!("Lots request for {} failed: {e}", item.id);
                        CallbackReply::alert(&format!("Ошибка: {e}"))
                    }
                }
            }
            Callback::Add(id) => {
                let Some(item) = self.catalog.find_by_id(&id) else {
                    return Ok(CallbackReply::alert("Уже в избранном."));
                };
                if !self.favorites.add_favorite(user_id, item.clone()).await? {
                    return Ok(CallbackReply::alert("Уже в избранном."));
                }
                info!("User {user_id} added {} to favorites", item.name);
                CallbackReply::toast_and_edit(
                    "Добавлено в избранное.",
                    self.item_card(user_id, &item).await?,
                )
            }
            Callback::Remove(id) => {
                let Some(item) = self.catalog.find_by_id(&id) else {
                    return Ok(CallbackReply::alert("Нет в избранном."));
                };
                if !self.favorites.remove_favorite(user_id, &item.id).await? {
                    return Ok(CallbackReply::alert("Нет в избранном."));
                }
                info!("User {user_id} removed {} from favorites", item.name);
                CallbackReply::toast_and_edit(
                    "Удалено из избранного.",
                    self.item_card(user_id, &item).await?,
                )
            }
        };
        Ok(reply)
    }

    async fn profile_view(&self, user_id: &str) -> Result<Reply> {
        let profile = self.favorites.get_or_create_profile(user_id).await?;
        Ok(Reply::with_keyboard(
            format!(
                "👤 Профиль\n\n⭐ Избранных предметов: {}",
                profile.favorites.len()
            ),
            vec![
                vec![Button::new("Избранное", Callback::Favorites)],
                vec![Button::new("Назад", Callback::MainMenu)],
            ],
        ))
    }

    /// Favorites list for the `/favorites` command; long lists are sent as two messages.
    async fn favorites_message(&self, user_id: &str) -> Result<Vec<Reply>> {
        let view = self.favorites_view(user_id).await?;
        if view.text.chars().count() <= MAX_MESSAGE_CHARS {
            return Ok(vec![view]);
        }
        Ok(vec![
            Reply::text(truncate_chars(&view.text, MAX_MESSAGE_CHARS)),
            Reply::with_keyboard("Используйте кнопки для быстрого доступа.", view.keyboard),
        ])
    }

    async fn favorites_view(&self, user_id: &str) -> Result<Reply> {
        let favorites = self.favorites.list_favorites(user_id).await?;
        let back = vec![Button::new("Назад", Callback::Profile)];

        if favorites.is_empty() {
            return Ok(Reply::with_keyboard(
                "📭 У вас пока нет избранных предметов.\n\n\
                 Напишите название предмета и используйте /add, чтобы добавить его.",
                vec![back],
            ));
        }

        let mut text = String::from("⭐ Избранные предметы:\n\n");
        let mut keyboard = Vec::new();
        for (i, fav) in favorites.iter().take(LIST_LIMIT).enumerate() {
            text.push_str(&format!("{}. {}\n", i + 1, fav.name));
            keyboard.push(vec![
                Button::new(
                    format!("История: {}", truncate_chars(&fav.name, BUTTON_NAME_CHARS)),
                    Callback::History(fav.id.clone()),
                ),
                Button::new("Лоты", Callback::Lots(fav.id.clone())),
            ]);
        }
        if favorites.len() > LIST_LIMIT {
            text.push_str(&format!(
                "\n... и еще {} предметов",
                favorites.len() - LIST_LIMIT
            ));
        }
        keyboard.push(back);
        Ok(Reply::with_keyboard(text, keyboard))
    }

    /// Name and ID of a resolved item, with history/lots buttons and a favorite toggle.
    async fn item_card(&self, user_id: &str, item: &ItemRef) -> Result<Reply> {
        let is_favorite = self.favorites.is_favorite(user_id, &item.id).await?;
        let star = if is_favorite { " ⭐" } else { "" };
        let toggle = if is_favorite {
            Button::new("🗑️ Удалить из избранного", Callback::Remove(item.id.clone()))
        } else {
            Button::new("⭐ Добавить в избранное", Callback::Add(item.id.clone()))
        };
        Ok(Reply::with_keyboard(
            format!(
                "✅ Найден предмет.{star}\n\n📦 Название: {}\n🆔 ID: {}",
                item.name, item.id
            ),
            vec![
                vec![
                    Button::new("История цен", Callback::History(item.id.clone())),
                    Button::new("Лоты", Callback::Lots(item.id.clone())),
                ],
                vec![toggle],
            ],
        ))
    }

    async fn history_replies(&self, item: &ItemRef) -> Vec<Reply> {
        match self.auction.fetch_price_history(self.region, &item.id).await {
            Ok(history) => {
                let summaries = daily_summaries(&history);
                if summaries.is_empty() {
                    return vec![Reply::text("❌ История цен не найдена.")];
                }
                split_message(&history_message(&item.name, &summaries), MAX_MESSAGE_CHARS)
                    .into_iter()
                    .map(Reply::text)
                    .collect()
            }
            Err(e) => {
                warn!("History request for {} failed: {e}", item.id);
                vec![Reply::text(format!("Ошибка при получении истории: {e}"))]
            }
        }
    }

    async fn lots_reply(&self, item: &ItemRef) -> Reply {
        match self.auction.fetch_active_lots(&item.id, self.region).await {
            Ok(lots) if lots.is_empty() => Reply::text("📭 Активных лотов нет."),
            Ok(lots) => Reply::text(truncate_chars(
                &lots_message(&item.name, &lots),
                MAX_MESSAGE_CHARS,
            )),
            Err(e) => {
                warn!("Lots request for {} failed: {e}", item.id);
                Reply::text(format!("Ошибка при получении лотов: {e}"))
            }
        }
    }
}

fn not_found(query: &str) -> Reply {
    Reply::text(format!(
        "❌ Предмет '{}' не найден.",
        truncate_chars(query, QUERY_ECHO_CHARS)
    ))
}

fn missing_argument(cmd: ItemCommand) -> Reply {
    Reply::text(format!(
        "ℹ️ Нужно указать название предмета. Пример: /{} штрих",
        cmd.name()
    ))
}
