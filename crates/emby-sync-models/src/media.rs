use serde::{Deserialize, Serialize};
use std::fmt;

/// What a catalog entry claims to be. Books never get this far.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    /// The server-side item type used when searching for this kind.
    pub fn item_type(self) -> ItemType {
        match self {
            MediaKind::Movie => ItemType::Movie,
            MediaKind::Series => ItemType::Series,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Series => write!(f, "series"),
        }
    }
}

/// Item type as reported by the media server (`Type` field).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ItemType {
    Movie,
    Series,
    BoxSet,
    #[serde(other)]
    Other,
}

impl ItemType {
    /// Value for the `IncludeItemTypes` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            ItemType::Movie => "Movie",
            ItemType::Series => "Series",
            ItemType::BoxSet => "BoxSet",
            ItemType::Other => "",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryItem {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Type", default = "default_item_type")]
    pub kind: ItemType,
    #[serde(rename = "ProductionYear", default)]
    pub production_year: Option<u32>,
}

fn default_item_type() -> ItemType {
    ItemType::Other
}

impl LibraryItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ItemType, production_year: Option<u32>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            production_year,
        }
    }
}
