use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::error::{StoreError, StoreResult};

/// The persisted documents managed by the storage facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKey {
    Config,
    Gallery,
    PasswordHash,
}

impl DocumentKey {
    /// Key in the cloud key-value store.
    pub fn kv_key(self) -> &'static str {
        match self {
            DocumentKey::Config => "config",
            DocumentKey::Gallery => "gallery",
            DocumentKey::PasswordHash => "password_hash",
        }
    }

    /// File name inside the local data directory.
    pub fn file_name(self) -> &'static str {
        match self {
            DocumentKey::Config => "config.json",
            DocumentKey::Gallery => "gallery.json",
            DocumentKey::PasswordHash => "password.json",
        }
    }
}

/// Site-wide settings shown on the public pages.
///
/// Every field falls back to the stock value when missing from the stored
/// document; unknown keys are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteConfig {
    pub business_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub instagram: String,
    pub hero_image: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            business_name: "Beauty Studio".to_string(),
            email: "contact@beautystudio.com".to_string(),
            phone: "+1 (555) 123-4567".to_string(),
            location: "Your City, State".to_string(),
            instagram: "https://instagram.com/beautystudio".to_string(),
            hero_image: String::new(),
            extra: Map::new(),
        }
    }
}

impl SiteConfig {
    /// Overlay the fields of `patch` onto this config.
    pub fn merged_with(&self, patch: Map<String, Value>) -> StoreResult<SiteConfig> {
        let merged = overlay(serde_json::to_value(self)?, patch);
        serde_json::from_value(merged)
            .map_err(|e| StoreError::InvalidArgument(format!("invalid config: {e}")))
    }
}

/// One photo in the gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub id: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub order: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GalleryItem {
    /// Overlay the fields of `patch` onto this item. The id never changes.
    pub fn merged_with(&self, mut patch: Map<String, Value>) -> StoreResult<GalleryItem> {
        patch.remove("id");
        let merged = overlay(serde_json::to_value(self)?, patch);
        serde_json::from_value(merged)
            .map_err(|e| StoreError::InvalidArgument(format!("invalid gallery item: {e}")))
    }
}

/// Parse untyped caller input into a gallery sequence.
pub fn gallery_from_value(value: Value) -> StoreResult<Vec<GalleryItem>> {
    if !value.is_array() {
        return Err(StoreError::InvalidArgument(
            "gallery must be an array".to_string(),
        ));
    }
    serde_json::from_value(value)
        .map_err(|e| StoreError::InvalidArgument(format!("invalid gallery item: {e}")))
}

pub fn ensure_unique_ids(items: &[GalleryItem]) -> StoreResult<()> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id.as_str()) {
            return Err(StoreError::InvalidArgument(format!(
                "duplicate gallery id `{}`",
                item.id
            )));
        }
    }
    Ok(())
}

/// On-disk shape of `password.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordRecord {
    pub hash: String,
}

fn overlay(base: Value, patch: Map<String, Value>) -> Value {
    let mut base = match base {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    base.extend(patch);
    Value::Object(base)
}
