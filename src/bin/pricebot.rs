use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use stalcraft_pricebot::TELEGRAM_API_BASE;
use stalcraft_pricebot::auction::AuctionClient;
use stalcraft_pricebot::catalog::ItemCatalog;
use stalcraft_pricebot::config::{AppConfig, CONFIG_PATH, Secrets};
use stalcraft_pricebot::favorites::FavoritesService;
use stalcraft_pricebot::handler::Handler;
use stalcraft_pricebot::store::ProfileStore;
use stalcraft_pricebot::telegram::{TelegramClient, process_update};
use stalcraft_pricebot::types::Region;

/// Pause after a failed `getUpdates` before polling again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "pricebot", about = "Stalcraft auction price Telegram bot")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Override the auction region from the config file
    #[arg(long)]
    region: Option<Region>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = AppConfig::load_or_default(&args.config)?;
    let secrets = Secrets::from_env()?;
    let region = args.region.unwrap_or(config.bot.region);

    let catalog = ItemCatalog::load(&config.bot.armor_catalog, &config.bot.weapon_catalog)?;
    if catalog.is_empty() {
        warn!("Item catalogs are empty; every search will come back not found");
    }

    let favorites = FavoritesService::spawn(ProfileStore::open(&config.bot.profiles_file));
    let auction = AuctionClient::new(
        &config.auction.api_base,
        &config.auction.oauth_url,
        secrets.credentials,
        Duration::from_secs(config.auction.http_timeout_secs),
    )?;
    let handler = Handler::new(Arc::new(catalog), favorites, Arc::new(auction), region);
    let telegram = TelegramClient::new(TELEGRAM_API_BASE, &secrets.bot_token);

    let poll_timeout = config.bot.poll_timeout_secs;
    info!("Starting pricebot (region={region}, poll timeout={poll_timeout}s). Press Ctrl+C to stop.");

    let mut offset: Option<i64> = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            updates = telegram.get_updates(offset, poll_timeout) => {
                let updates = match updates {
                    Ok(updates) => updates,
                    Err(e) => {
                        warn!("getUpdates failed: {e:#}");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };
                for update in updates {
                    offset = Some(update.update_id + 1);
                    let telegram = telegram.clone();
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = process_update(&telegram, &handler, update).await {
                            warn!("Failed to deliver reply: {e:#}");
                        }
                    });
                }
            }
        }
    }

    Ok(())
}
