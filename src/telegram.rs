//! Minimal Telegram Bot API transport: long polling, sending and editing
//! messages, answering button presses.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::MAX_NOTICE_CHARS;
use crate::handler::{CallbackReply, Handler, Notice, Reply};
use crate::intent::{Callback, Intent};
use crate::reporter::truncate_chars;

/// Extra time on top of the long-poll timeout before the HTTP request gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Sent to the user when a handler fails with an internal error.
const INTERNAL_ERROR: &str = "⚠️ Что-то пошло не так. Попробуйте позже.";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
struct InlineButton {
    text: String,
    callback_data: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct InlineKeyboardMarkup {
    inline_keyboard: Vec<Vec<InlineButton>>,
}

fn reply_markup(reply: &Reply) -> Option<InlineKeyboardMarkup> {
    if reply.keyboard.is_empty() {
        return None;
    }
    Some(InlineKeyboardMarkup {
        inline_keyboard: reply
            .keyboard
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| InlineButton {
                        text: b.label.clone(),
                        callback_data: b.callback.encode(),
                    })
                    .collect()
            })
            .collect(),
    })
}

/// Add `text` and, when there are buttons, `reply_markup` to a request body.
fn message_body(mut body: serde_json::Value, reply: &Reply) -> Result<serde_json::Value> {
    body["text"] = json!(reply.text);
    if let Some(markup) = reply_markup(reply) {
        body["reply_markup"] = serde_json::to_value(markup)?;
    }
    Ok(body)
}

/// Bot API client bound to one bot token.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("{}/bot{token}", api_base.trim_end_matches('/')),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let mut req = self.http.post(format!("{}/{method}", self.base)).json(body);
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }
        let resp: ApiResponse<T> = req
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?
            .json()
            .await
            .with_context(|| format!("{method} returned invalid JSON"))?;
        if !resp.ok {
            bail!(
                "{method} failed: {}",
                resp.description.unwrap_or_else(|| "no description".into())
            );
        }
        resp.result
            .with_context(|| format!("{method} returned no result"))
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call(
            "getUpdates",
            &body,
            Some(Duration::from_secs(timeout_secs) + POLL_GRACE),
        )
        .await
    }

    pub async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<()> {
        let body = message_body(json!({ "chat_id": chat_id }), reply)?;
        self.call::<serde_json::Value>("sendMessage", &body, None)
            .await?;
        Ok(())
    }

    pub async fn edit_reply(&self, chat_id: i64, message_id: i64, reply: &Reply) -> Result<()> {
        let body = message_body(
            json!({ "chat_id": chat_id, "message_id": message_id }),
            reply,
        )?;
        self.call::<serde_json::Value>("editMessageText", &body, None)
            .await?;
        Ok(())
    }

    pub async fn answer_callback(&self, query_id: &str, notice: Option<&Notice>) -> Result<()> {
        let body = match notice {
            Some(n) => json!({
                "callback_query_id": query_id,
                "text": truncate_chars(&n.text, MAX_NOTICE_CHARS),
                "show_alert": n.alert,
            }),
            None => json!({ "callback_query_id": query_id }),
        };
        self.call::<bool>("answerCallbackQuery", &body, None).await?;
        Ok(())
    }
}

/// Route one update through the handler and deliver the result.
pub async fn process_update(client: &TelegramClient, handler: &Handler, update: Update) -> Result<()> {
    if let Some(query) = update.callback_query {
        return process_callback(client, handler, query).await;
    }
    let Some(message) = update.message else {
        return Ok(());
    };
    let (Some(user), Some(text)) = (message.from, message.text) else {
        return Ok(());
    };
    let Some(intent) = Intent::parse(&text) else {
        return Ok(());
    };

    let user_id = user.id.to_string();
    debug!("User {user_id}: {intent:?}");
    if let Some(pending) = handler.pending_reply(&intent) {
        client.send_reply(message.chat.id, &pending).await?;
    }
    let replies = match handler.handle_message(&user_id, intent).await {
        Ok(replies) => replies,
        Err(e) => {
            warn!("Handler error for user {user_id}: {e:#}");
            vec![Reply::text(INTERNAL_ERROR)]
        }
    };
    for reply in &replies {
        client.send_reply(message.chat.id, reply).await?;
    }
    Ok(())
}

async fn process_callback(
    client: &TelegramClient,
    handler: &Handler,
    query: CallbackQuery,
) -> Result<()> {
    let Some(callback) = query.data.as_deref().and_then(Callback::parse) else {
        warn!("Unrecognized callback data {:?}", query.data);
        return client.answer_callback(&query.id, None).await;
    };

    let user_id = query.from.id.to_string();
    debug!("User {user_id}: {callback:?}");
    let CallbackReply { notice, edit } = match handler.handle_callback(&user_id, callback).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Callback error for user {user_id}: {e:#}");
            CallbackReply {
                notice: Some(Notice::new(INTERNAL_ERROR, true)),
                edit: None,
            }
        }
    };

    client.answer_callback(&query.id, notice.as_ref()).await?;
    if let (Some(reply), Some(message)) = (edit, query.message) {
        client
            .edit_reply(message.chat.id, message.message_id, &reply)
            .await?;
    }
    Ok(())
}
