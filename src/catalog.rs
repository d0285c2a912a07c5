use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::info;

use crate::types::{CatalogScope, ItemRef};

/// A single `(lowercased name, display name, id)` catalog row.
#[derive(Debug, Clone)]
struct Entry {
    key: String,
    name: String,
    id: String,
}

impl Entry {
    fn new(name: String, id: String) -> Self {
        Self {
            key: name.to_lowercase(),
            name,
            id,
        }
    }

    fn to_item(&self) -> ItemRef {
        ItemRef::new(self.name.clone(), self.id.clone())
    }
}

/// The static armor and weapon name→ID catalogs.
///
/// Entries keep the order of the source documents, which decides ties between
/// several substring matches. Built once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    armor: Vec<Entry>,
    weapon: Vec<Entry>,
}

impl ItemCatalog {
    /// Load both catalogs from JSON objects of the form `{"<name>": "<id>"}`.
    pub fn load(armor_path: &Path, weapon_path: &Path) -> Result<Self> {
        let armor = load_entries(armor_path)?;
        let weapon = load_entries(weapon_path)?;
        info!(
            "Loaded catalogs: {} armor, {} weapon entries",
            armor.len(),
            weapon.len()
        );
        Ok(Self { armor, weapon })
    }

    /// Build a catalog from in-memory `(name, id)` pairs, in the given order.
    pub fn from_entries<A, W, S1, S2, S3, S4>(armor: A, weapon: W) -> Self
    where
        A: IntoIterator<Item = (S1, S2)>,
        W: IntoIterator<Item = (S3, S4)>,
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
    {
        Self {
            armor: armor
                .into_iter()
                .map(|(n, id)| Entry::new(n.into(), id.into()))
                .collect(),
            weapon: weapon
                .into_iter()
                .map(|(n, id)| Entry::new(n.into(), id.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.armor.len() + self.weapon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armor.is_empty() && self.weapon.is_empty()
    }

    /// Resolve a free-text query to a catalog entry.
    ///
    /// Priority: exact armor, exact weapon, substring armor, substring weapon.
    /// Matching is case-insensitive; the first hit in catalog order wins.
    pub fn resolve(&self, query: &str, scope: CatalogScope) -> Option<ItemRef> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let exact = |e: &&Entry| e.key == needle;
        let partial = |e: &&Entry| e.key.contains(&needle);

        let found = scope
            .includes_armor()
            .then(|| self.armor.iter().find(exact))
            .flatten()
            .or_else(|| {
                scope
                    .includes_weapon()
                    .then(|| self.weapon.iter().find(exact))
                    .flatten()
            })
            .or_else(|| {
                scope
                    .includes_armor()
                    .then(|| self.armor.iter().find(partial))
                    .flatten()
            })
            .or_else(|| {
                scope
                    .includes_weapon()
                    .then(|| self.weapon.iter().find(partial))
                    .flatten()
            });

        found.map(Entry::to_item)
    }

    /// Look up an entry by item ID, armor first.
    pub fn find_by_id(&self, id: &str) -> Option<ItemRef> {
        self.armor
            .iter()
            .chain(self.weapon.iter())
            .find(|e| e.id == id)
            .map(Entry::to_item)
    }
}

fn load_entries(path: &Path) -> Result<Vec<Entry>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_entries(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

/// Parse a `{"<name>": "<id>"}` document, keeping key order.
fn parse_entries(contents: &str) -> Result<Vec<Entry>> {
    let map: Map<String, Value> = serde_json::from_str(contents)?;
    map.into_iter()
        .map(|(name, value)| match value {
            Value::String(id) => Ok(Entry::new(name, id)),
            other => anyhow::bail!("item {name:?} has non-string id {other}"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ItemCatalog {
        ItemCatalog::from_entries(
            [("Штрих-М", "id1"), ("Штрих-3", "id2"), ("Костюм Сева", "id3")],
            [("HK417", "w1"), ("Штрих", "w2"), ("АК-74М", "w3")],
        )
    }

    #[test]
    fn exact_match_case_insensitive() {
        let cat = sample();
        assert_eq!(
            cat.resolve("hk417", CatalogScope::Both),
            Some(ItemRef::new("HK417", "w1"))
        );
        assert_eq!(
            cat.resolve("  ШТРИХ-3 ", CatalogScope::Both),
            Some(ItemRef::new("Штрих-3", "id2"))
        );
    }

    #[test]
    fn exact_weapon_beats_substring_armor() {
        // "штрих" is a substring of two armor entries but an exact weapon name.
        let cat = sample();
        assert_eq!(
            cat.resolve("штрих", CatalogScope::Both),
            Some(ItemRef::new("Штрих", "w2"))
        );
    }

    #[test]
    fn substring_first_in_load_order() {
        let cat = ItemCatalog::from_entries(
            [("Штрих-М", "id1"), ("Штрих-3", "id2")],
            Vec::<(String, String)>::new(),
        );
        assert_eq!(
            cat.resolve("штрих", CatalogScope::Both),
            Some(ItemRef::new("Штрих-М", "id1"))
        );
    }

    #[test]
    fn substring_armor_before_weapon() {
        let cat = ItemCatalog::from_entries([("Броня Альфа", "a1")], [("Альфа-ствол", "w1")]);
        assert_eq!(
            cat.resolve("альфа", CatalogScope::Both),
            Some(ItemRef::new("Броня Альфа", "a1"))
        );
    }

    #[test]
    fn scope_restricts_search() {
        let cat = sample();
        assert_eq!(cat.resolve("hk417", CatalogScope::Armor), None);
        assert_eq!(
            cat.resolve("штрих", CatalogScope::Armor),
            Some(ItemRef::new("Штрих-М", "id1"))
        );
        assert_eq!(
            cat.resolve("сева", CatalogScope::Weapon),
            None,
        );
    }

    #[test]
    fn not_found_and_blank() {
        let cat = sample();
        assert_eq!(cat.resolve("несуществующий", CatalogScope::Both), None);
        assert_eq!(cat.resolve("   ", CatalogScope::Both), None);
    }

    #[test]
    fn find_by_id_searches_both() {
        let cat = sample();
        assert_eq!(cat.find_by_id("id3"), Some(ItemRef::new("Костюм Сева", "id3")));
        assert_eq!(cat.find_by_id("w3"), Some(ItemRef::new("АК-74М", "w3")));
        assert_eq!(cat.find_by_id("nope"), None);
    }

    #[test]
    fn parse_keeps_document_order() {
        let entries = parse_entries(r#"{"Штрих-М": "id1", "Альфа": "id0", "Штрих-3": "id2"}"#)
            .unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Штрих-М", "Альфа", "Штрих-3"]);
    }

    #[test]
    fn parse_rejects_non_string_ids() {
        assert!(parse_entries(r#"{"Штрих-М": 5}"#).is_err());
        assert!(parse_entries(r#"["Штрих-М"]"#).is_err());
    }

    #[test]
    fn load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let armor = dir.path().join("armor.json");
        let weapon = dir.path().join("weapon.json");
        std::fs::write(&armor, r#"{"Штрих-М": "id1"}"#).unwrap();
        std::fs::write(&weapon, r#"{"HK417": "w1"}"#).unwrap();

        let cat = ItemCatalog::load(&armor, &weapon).unwrap();
        assert_eq!(cat.len(), 2);
        assert_eq!(cat.find_by_id("w1"), Some(ItemRef::new("HK417", "w1")));
    }
}
