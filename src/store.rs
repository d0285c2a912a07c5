use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::types::{ItemRef, UserProfile};

/// Full `user_id → profile` mapping as stored on disk.
pub type Profiles = BTreeMap<String, UserProfile>;

/// JSON-file-backed favorites store.
///
/// Every operation reads the whole file, mutates it in memory, and rewrites it
/// wholesale. Callers needing concurrent access go through
/// [`crate::favorites::FavoritesHandle`], which serializes all calls.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every profile. A missing file is an empty store.
    pub fn load(&self) -> Result<Profiles> {
        if !self.path.exists() {
            return Ok(Profiles::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Profiles::new());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    /// Replace the file contents via write-to-temp then rename.
    pub fn save(&self, profiles: &Profiles) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(profiles).context("failed to serialize profiles")?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, contents)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        debug!("Saved {} profile(s) to {}", profiles.len(), self.path.display());
        Ok(())
    }

    /// Return the user's profile, creating and persisting an empty one if absent.
    pub fn get_or_create_profile(&self, user_id: &str) -> Result<UserProfile> {
        let mut profiles = self.load()?;
        if let Some(profile) = profiles.get(user_id) {
            return Ok(profile.clone());
        }
        let profile = UserProfile::default();
        profiles.insert(user_id.to_string(), profile.clone());
        self.save(&profiles)?;
        debug!("Created profile for user {user_id}");
        Ok(profile)
    }

    /// Append `item` unless an entry with the same id exists. Returns whether it was added.
    pub fn add_favorite(&self, user_id: &str, item: ItemRef) -> Result<bool> {
        let mut profiles = self.load()?;
        let profile = profiles.entry(user_id.to_string()).or_default();
        if profile.contains(&item.id) {
            return Ok(false);
        }
        profile.favorites.push(item);
        self.save(&profiles)?;
        Ok(true)
    }

    /// Remove the entry with `item_id`. Returns false when there was none.
    pub fn remove_favorite(&self, user_id: &str, item_id: &str) -> Result<bool> {
        let mut profiles = self.load()?;
        let Some(profile) = profiles.get_mut(user_id) else {
            return Ok(false);
        };
        let Some(idx) = profile.favorites.iter().position(|f| f.id == item_id) else {
            return Ok(false);
        };
        profile.favorites.remove(idx);
        self.save(&profiles)?;
        Ok(true)
    }

    /// Current favorites in insertion order. Never creates a profile.
    pub fn list_favorites(&self, user_id: &str) -> Result<Vec<ItemRef>> {
        Ok(self
            .load()?
            .remove(user_id)
            .map(|p| p.favorites)
            .unwrap_or_default())
    }

    pub fn is_favorite(&self, user_id: &str, item_id: &str) -> Result<bool> {
        Ok(self
            .load()?
            .get(user_id)
            .is_some_and(|p| p.contains(item_id)))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "profiles.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
