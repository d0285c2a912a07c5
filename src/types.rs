use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Resolved identity of a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub name: String,
    pub id: String,
}

impl ItemRef {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// One user's persisted state. Favorites never share an `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub favorites: Vec<ItemRef>,
}

impl UserProfile {
    pub fn contains(&self, item_id: &str) -> bool {
        self.favorites.iter().any(|f| f.id == item_id)
    }
}

/// Which catalog(s) a lookup searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CatalogScope {
    Armor,
    Weapon,
    #[default]
    Both,
}

impl CatalogScope {
    pub fn includes_armor(self) -> bool {
        matches!(self, Self::Armor | Self::Both)
    }

    pub fn includes_weapon(self) -> bool {
        matches!(self, Self::Weapon | Self::Both)
    }
}

impl FromStr for CatalogScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "armor" => Ok(Self::Armor),
            "weapon" => Ok(Self::Weapon),
            "both" => Ok(Self::Both),
            other => anyhow::bail!("unknown catalog scope: {other}"),
        }
    }
}

/// Game-server region, used as the first path segment of auction endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Ru,
    Eu,
    Na,
    Sea,
}

impl Region {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::Eu => "eu",
            Self::Na => "na",
            Self::Sea => "sea",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ru" => Ok(Self::Ru),
            "eu" => Ok(Self::Eu),
            "na" => Ok(Self::Na),
            "sea" => Ok(Self::Sea),
            other => anyhow::bail!("unknown region: {other}"),
        }
    }
}

/// An active auction listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    /// Current bid. Older payloads call it `price`, newer ones `currentPrice`.
    #[serde(default, alias = "currentPrice")]
    pub price: f64,
    #[serde(default)]
    pub buyout_price: Option<f64>,
    #[serde(default)]
    pub amount: u64,
}

/// Observed sale prices grouped by UTC calendar day, oldest first.
pub type PriceHistory = BTreeMap<NaiveDate, Vec<f64>>;
