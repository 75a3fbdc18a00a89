use async_trait::async_trait;
use emby_sync_models::{ItemType, LibraryItem};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EmbyError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(rename = "ServerName", default)]
    pub server_name: String,
    #[serde(rename = "Version", default)]
    pub version: String,
    #[serde(rename = "Id", default)]
    pub id: String,
}

/// One page of an `/Items` listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPage {
    #[serde(rename = "Items", default)]
    pub items: Vec<LibraryItem>,
    #[serde(rename = "TotalRecordCount", default)]
    pub total_record_count: u32,
}

/// A top-level library from `/Library/VirtualFolders`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VirtualFolder {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "ItemId", default)]
    pub item_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ImageType {
    Primary,
    Backdrop,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Primary => "Primary",
            ImageType::Backdrop => "Backdrop",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of an `/Items` query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    pub search_term: Option<String>,
    pub include_types: Vec<ItemType>,
    pub years: Vec<u32>,
    pub parent_id: Option<String>,
    pub start_index: Option<u32>,
    pub limit: Option<u32>,
    pub recursive: bool,
    /// Scope to the configured user and hide played items.
    pub unplayed_only: bool,
}

impl ItemQuery {
    pub fn search(kind: ItemType, term: impl Into<String>) -> Self {
        Self {
            search_term: Some(term.into()),
            include_types: vec![kind],
            recursive: true,
            ..Self::default()
        }
    }

    pub fn listing(kind: ItemType, start_index: u32, limit: u32) -> Self {
        Self {
            include_types: vec![kind],
            start_index: Some(start_index),
            limit: Some(limit),
            recursive: true,
            ..Self::default()
        }
    }

    /// Direct children of a collection.
    pub fn children(parent_id: impl Into<String>, limit: u32) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            limit: Some(limit),
            recursive: false,
            ..Self::default()
        }
    }

    /// Every item of `kinds` anywhere below a library folder.
    pub fn library(parent_id: impl Into<String>, kinds: &[ItemType], start_index: u32, limit: u32) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            include_types: kinds.to_vec(),
            start_index: Some(start_index),
            limit: Some(limit),
            recursive: true,
            ..Self::default()
        }
    }

    pub fn with_years(mut self, years: Vec<u32>) -> Self {
        self.years = years;
        self
    }

    pub fn unplayed(mut self, unplayed_only: bool) -> Self {
        self.unplayed_only = unplayed_only;
        self
    }
}

/// The media-server operations the sync engine relies on.
///
/// Every implementation call is one logical request; retries happen below
/// this seam, so an `Err` here means the request is already exhausted.
#[async_trait]
pub trait EmbyApi: Send + Sync {
    async fn server_info(&self) -> Result<ServerInfo, EmbyError>;

    async fn query_items(&self, query: &ItemQuery) -> Result<ItemPage, EmbyError>;

    /// Creates a box-set seeded with one item and returns its id.
    async fn create_collection(&self, name: &str, seed_item_id: &str) -> Result<String, EmbyError>;

    /// `Ok(true)` only when the server answers 204.
    async fn add_to_collection(&self, collection_id: &str, item_ids: &[String]) -> Result<bool, EmbyError>;

    async fn remove_from_collection(&self, collection_id: &str, item_ids: &[String]) -> Result<bool, EmbyError>;

    async fn has_image(&self, item_id: &str, image: ImageType) -> Result<bool, EmbyError>;

    fn image_url(&self, item_id: &str, image: ImageType) -> String;

    async fn download(&self, url: &str) -> Result<Vec<u8>, EmbyError>;

    async fn upload_image(&self, item_id: &str, image: ImageType, bytes: &[u8]) -> Result<bool, EmbyError>;

    async fn virtual_folders(&self) -> Result<Vec<VirtualFolder>, EmbyError>;

    /// The full item document, in the shape the update endpoint takes back.
    async fn item_detail(&self, item_id: &str) -> Result<serde_json::Value, EmbyError>;

    async fn update_item(&self, item_id: &str, item: &serde_json::Value) -> Result<bool, EmbyError>;
}
