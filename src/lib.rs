pub mod auction;
pub mod catalog;
pub mod config;
pub mod favorites;
pub mod handler;
pub mod intent;
pub mod reporter;
pub mod store;
pub mod telegram;
pub mod types;

/// Stalcraft public API base URL (auction endpoints live under `/{region}/auction`)
pub const AUCTION_API_BASE: &str = "https://eapi.stalcraft.net";

/// EXBO OAuth token endpoint (client-credentials grant)
pub const OAUTH_TOKEN_URL: &str = "https://exbo.net/oauth/token";

/// Telegram Bot API base URL. The bot token is appended as `/bot<token>/<method>`.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram rejects messages longer than 4096 characters; keep some headroom.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Telegram rejects callback popup text longer than 200 characters.
pub const MAX_NOTICE_CHARS: usize = 200;

/// Favorites and lots listings are cut to this many entries.
pub const LIST_LIMIT: usize = 10;
