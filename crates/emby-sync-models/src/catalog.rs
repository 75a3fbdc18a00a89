use crate::media::MediaKind;
use serde::{Deserialize, Serialize};

/// One normalized line of an upstream catalog.
///
/// Titles are already cleaned: season markers stripped and aliases applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CatalogEntry {
    pub title: String,
    pub year: Option<u32>,
    pub kind: MediaKind,
}

impl CatalogEntry {
    pub fn new(title: impl Into<String>, year: Option<u32>, kind: MediaKind) -> Self {
        Self {
            title: title.into(),
            year,
            kind,
        }
    }
}

/// A fetched catalog: the collection it targets plus its entries in source order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Catalog {
    pub title: String,
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(title: impl Into<String>, entries: Vec<CatalogEntry>) -> Self {
        Self {
            title: title.into(),
            entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
