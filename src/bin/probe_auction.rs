//! Probe: resolve an item name and hit the auction endpoints for it.
//!
//! Prints the resolved catalog entry, the per-day price summary and the first
//! active lots. Uses the bot's config file; only CLIENT_ID and CLIENT_SECRET
//! are needed from the environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;

use stalcraft_pricebot::auction::{AuctionApi, AuctionClient};
use stalcraft_pricebot::catalog::ItemCatalog;
use stalcraft_pricebot::config::{AppConfig, CONFIG_PATH, credentials_from_env};
use stalcraft_pricebot::reporter::{daily_summaries, history_message, lots_message};
use stalcraft_pricebot::types::{CatalogScope, Region};

#[derive(Parser)]
#[command(name = "probe_auction", about = "Resolve an item and print its auction data")]
struct Args {
    /// Item name (full or partial)
    #[arg(required = true)]
    name: Vec<String>,

    /// Catalog to search: armor, weapon or both
    #[arg(long, default_value = "both")]
    scope: CatalogScope,

    /// Auction region (defaults to the config file's)
    #[arg(long)]
    region: Option<Region>,

    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load_or_default(&args.config)?;
    let region = args.region.unwrap_or(config.bot.region);
    let query = args.name.join(" ");

    let catalog = ItemCatalog::load(&config.bot.armor_catalog, &config.bot.weapon_catalog)?;
    let Some(item) = catalog.resolve(&query, args.scope) else {
        bail!("no catalog entry matches {query:?}");
    };
    println!("=== {} ({}) [{region}] ===\n", item.name, item.id);

    let client = AuctionClient::new(
        &config.auction.api_base,
        &config.auction.oauth_url,
        credentials_from_env()?,
        Duration::from_secs(config.auction.http_timeout_secs),
    )?;

    match client.fetch_price_history(region, &item.id).await {
        Ok(history) => println!("{}", history_message(&item.name, &daily_summaries(&history))),
        Err(e) => println!("History request failed: {e}\n"),
    }
    match client.fetch_active_lots(&item.id, region).await {
        Ok(lots) => println!("{}", lots_message(&item.name, &lots)),
        Err(e) => println!("Lots request failed: {e}"),
    }

    Ok(())
}
