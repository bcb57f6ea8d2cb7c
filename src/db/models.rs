//! Records persisted by the catalog store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CatalogError;

/// An indexed picture, keyed by its absolute path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Picture {
    pub path: String,
    pub filename: String,
    pub size_bytes: u64,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
    pub thumbnail_path: Option<String>,
}

/// Partition of tags evaluated independently during search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    Person,
    Location,
    Event,
    Other,
}

impl TagCategory {
    pub const ALL: [TagCategory; 4] = [
        TagCategory::Person,
        TagCategory::Location,
        TagCategory::Event,
        TagCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagCategory::Person => "person",
            TagCategory::Location => "location",
            TagCategory::Event => "event",
            TagCategory::Other => "other",
        }
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagCategory {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "person" => Ok(TagCategory::Person),
            "location" => Ok(TagCategory::Location),
            "event" => Ok(TagCategory::Event),
            "other" => Ok(TagCategory::Other),
            _ => Err(CatalogError::invalid_input(format!("invalid tag category: {}", s))),
        }
    }
}

/// A user-defined tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    pub category: TagCategory,
    /// Hex colour for display, e.g. "#3B82F6"
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub picture_count: u64,
}

/// A directory registered for repeated indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedFolder {
    pub path: String,
    pub name: String,
    pub added_at: DateTime<Utc>,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub picture_count: u64,
    pub auto_reindex: bool,
}
