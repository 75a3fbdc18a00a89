//! Douban catalogs served through an RSSHub instance.

use async_trait::async_trait;
use emby_sync_models::{Catalog, CatalogEntry, MediaKind};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::http::fetch_bytes;
use crate::normalize::{
    chart_kind, clean_collection_title, doulist_kind, doulist_year, finish_title, first_token, first_year,
    is_blank_title, AliasTable,
};
use crate::rss::{parse_feed, Feed};
use crate::{CatalogSource, SourceError};

/// `/douban/movie/weekly/{id}` charts. The collection is named after the feed.
pub struct WeeklyChartSource {
    client: Client,
    rsshub_url: String,
    aliases: AliasTable,
}

impl WeeklyChartSource {
    pub fn new(client: Client, rsshub_url: &str, aliases: AliasTable) -> Self {
        Self {
            client,
            rsshub_url: rsshub_url.trim_end_matches('/').to_string(),
            aliases,
        }
    }

    pub fn feed_url(&self, chart_id: &str) -> String {
        format!("{}/douban/movie/weekly/{}", self.rsshub_url, chart_id)
    }
}

#[async_trait]
impl CatalogSource for WeeklyChartSource {
    fn source_name(&self) -> &str {
        "hotmovie"
    }

    async fn fetch(&self, source_id: &str) -> Result<Catalog, SourceError> {
        let url = self.feed_url(source_id);
        info!(source = "hotmovie", source_id, "Fetching Douban chart feed");
        let body = fetch_bytes(&self.client, &url)
            .await
            .map_err(|reason| SourceError::unavailable(source_id, reason))?;
        let feed = parse_feed(&body).map_err(|reason| SourceError::unavailable(source_id, reason))?;
        let catalog = chart_catalog(&feed, source_id, &self.aliases)?;
        info!(source = "hotmovie", source_id, entries = catalog.entries.len(), collection = %catalog.title, "Chart fetched");
        Ok(catalog)
    }
}

/// Builds the catalog of a weekly chart feed. Books are dropped.
pub fn chart_catalog(feed: &Feed, source_id: &str, aliases: &AliasTable) -> Result<Catalog, SourceError> {
    if feed.items.is_empty() {
        return Err(SourceError::unavailable(source_id, "feed has no entries"));
    }

    let mut entries = Vec::with_capacity(feed.items.len());
    for item in &feed.items {
        let raw = item.title().trim();
        if raw.is_empty() {
            continue;
        }
        let Some(kind) = chart_kind(item.get("type")) else {
            debug!(title = raw, "Skipping book entry");
            continue;
        };
        let year = item.get("year").and_then(first_year);
        entries.push(CatalogEntry::new(finish_title(raw, kind, aliases), year, kind));
    }

    let title = feed
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("豆瓣{}", source_id));
    Ok(Catalog::new(title, entries))
}

/// `/douban/doulist/{id}` user lists.
pub struct DoulistSource {
    client: Client,
    rsshub_url: String,
    aliases: AliasTable,
}

impl DoulistSource {
    pub fn new(client: Client, rsshub_url: &str, aliases: AliasTable) -> Self {
        Self {
            client,
            rsshub_url: rsshub_url.trim_end_matches('/').to_string(),
            aliases,
        }
    }

    pub fn feed_url(&self, doulist_id: &str) -> String {
        format!("{}/douban/doulist/{}", self.rsshub_url, doulist_id)
    }
}

#[async_trait]
impl CatalogSource for DoulistSource {
    fn source_name(&self) -> &str {
        "doulist"
    }

    async fn fetch(&self, source_id: &str) -> Result<Catalog, SourceError> {
        let url = self.feed_url(source_id);
        info!(source = "doulist", source_id, "Fetching doulist feed");
        let body = fetch_bytes(&self.client, &url)
            .await
            .map_err(|reason| SourceError::unavailable(source_id, reason))?;
        let feed = parse_feed(&body).map_err(|reason| SourceError::unavailable(source_id, reason))?;
        let catalog = doulist_catalog(&feed, source_id, &self.aliases)?;
        info!(source = "doulist", source_id, entries = catalog.entries.len(), collection = %catalog.title, "Doulist fetched");
        Ok(catalog)
    }
}

/// Builds the catalog of a doulist feed.
///
/// Item titles hold several names separated by spaces; only the first
/// (simplified Chinese) one is kept. Year and kind come from the description.
pub fn doulist_catalog(feed: &Feed, source_id: &str, aliases: &AliasTable) -> Result<Catalog, SourceError> {
    if feed.items.is_empty() {
        return Err(SourceError::unavailable(source_id, "feed has no entries"));
    }

    let mut entries = Vec::with_capacity(feed.items.len());
    for item in &feed.items {
        let raw = item.title();
        if is_blank_title(raw) {
            continue;
        }
        let description = item.description();
        let kind = doulist_kind(description);
        let name = first_token(raw);
        let entry = CatalogEntry::new(finish_title(name, kind, aliases), doulist_year(description), kind);
        if entry.kind == MediaKind::Series {
            debug!(title = %entry.title, "Doulist entry classified as series");
        }
        entries.push(entry);
    }

    let title = match feed.title.as_deref() {
        Some(t) if !t.trim().is_empty() => format!("✨{}", clean_collection_title(t)),
        _ => {
            warn!(source_id, "Doulist feed has no title");
            format!("✨豆列{}", source_id)
        }
    };
    Ok(Catalog::new(title, entries))
}
