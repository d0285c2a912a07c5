use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auction::Credentials;
use crate::types::Region;
use crate::{AUCTION_API_BASE, OAUTH_TOKEN_URL};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Env files tried, in order, before reading secrets from the environment.
pub const ENV_FILES: [&str; 2] = ["keys.env", ".env"];

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub auction: AuctionConfig,
}

/// Chat-side settings and data file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub region: Region,
    #[serde(default = "default_armor_path")]
    pub armor_catalog: PathBuf,
    #[serde(default = "default_weapon_path")]
    pub weapon_catalog: PathBuf,
    #[serde(default = "default_profiles_path")]
    pub profiles_file: PathBuf,
    /// Long-poll timeout for `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

/// Auction API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_oauth_url")]
    pub oauth_url: String,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

fn default_armor_path() -> PathBuf {
    PathBuf::from("armor.json")
}

fn default_weapon_path() -> PathBuf {
    PathBuf::from("weapon.json")
}

fn default_profiles_path() -> PathBuf {
    PathBuf::from("user_profiles.json")
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_api_base() -> String {
    AUCTION_API_BASE.to_string()
}

fn default_oauth_url() -> String {
    OAUTH_TOKEN_URL.to_string()
}

fn default_http_timeout() -> u64 {
    20
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            region: Region::default(),
            armor_catalog: default_armor_path(),
            weapon_catalog: default_weapon_path(),
            profiles_file: default_profiles_path(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            oauth_url: default_oauth_url(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

/// Everything the bot needs from the environment.
#[derive(Clone)]
pub struct Secrets {
    pub bot_token: String,
    pub credentials: Credentials,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl Secrets {
    /// Load the first env file found in [`ENV_FILES`], then read the variables.
    pub fn from_env() -> Result<Self> {
        load_env_files();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            bot_token: require(&lookup, "BOT_TOKEN")?,
            credentials: credentials_from_lookup(&lookup)?,
        })
    }
}

/// Auction API credentials alone, for tools that never talk to Telegram.
pub fn credentials_from_env() -> Result<Credentials> {
    load_env_files();
    credentials_from_lookup(|key| std::env::var(key).ok())
}

fn credentials_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
    Ok(Credentials {
        client_id: require(&lookup, "CLIENT_ID")?,
        client_secret: require(&lookup, "CLIENT_SECRET")?,
    })
}

fn load_env_files() {
    for file in ENV_FILES {
        if dotenvy::from_filename(file).is_ok() {
            info!("Loaded environment from {file}");
            break;
        }
    }
}

fn require(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("{key} is not set"))
}
