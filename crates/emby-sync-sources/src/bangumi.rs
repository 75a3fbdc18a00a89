//! The bgm.tv airing calendar.

use async_trait::async_trait;
use emby_sync_models::{Catalog, CatalogEntry, MediaKind};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::http::fetch_bytes;
use crate::normalize::{finish_title, first_year, AliasTable};
use crate::{CatalogSource, SourceError};

#[derive(Debug, Deserialize)]
struct CalendarDay {
    #[serde(default)]
    items: Vec<CalendarItem>,
}

#[derive(Debug, Deserialize)]
struct CalendarItem {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    name_cn: Option<String>,
    #[serde(default)]
    air_date: Option<String>,
    #[serde(rename = "type", default)]
    subject_type: Option<u32>,
}

/// Subject type 2 is anime on bgm.tv.
const SUBJECT_TYPE_ANIME: u32 = 2;

/// Folds every weekday of the calendar into one collection.
pub struct BangumiSource {
    client: Client,
    api_url: String,
    collection_name: String,
    aliases: AliasTable,
}

impl BangumiSource {
    pub fn new(client: Client, api_url: &str, collection_name: &str, aliases: AliasTable) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
            collection_name: collection_name.to_string(),
            aliases,
        }
    }
}

#[async_trait]
impl CatalogSource for BangumiSource {
    fn source_name(&self) -> &str {
        "bangumi"
    }

    /// The calendar has a single feed, so `source_id` only labels errors.
    async fn fetch(&self, source_id: &str) -> Result<Catalog, SourceError> {
        info!(source = "bangumi", url = %self.api_url, "Fetching Bangumi calendar");
        let body = fetch_bytes(&self.client, &self.api_url)
            .await
            .map_err(|reason| SourceError::unavailable(source_id, reason))?;
        let catalog = calendar_catalog(&body, &self.collection_name, &self.aliases)
            .map_err(|reason| SourceError::unavailable(source_id, reason))?;
        info!(source = "bangumi", entries = catalog.entries.len(), "Calendar fetched");
        Ok(catalog)
    }
}

/// Parses the calendar JSON. Duplicate titles across weekdays are kept once.
pub fn calendar_catalog(body: &[u8], collection_name: &str, aliases: &AliasTable) -> Result<Catalog, String> {
    let days: Vec<CalendarDay> = serde_json::from_slice(body).map_err(|e| format!("invalid calendar JSON: {}", e))?;

    let mut entries: Vec<CatalogEntry> = Vec::new();
    for item in days.into_iter().flat_map(|d| d.items) {
        let name = item
            .name_cn
            .filter(|n| !n.trim().is_empty())
            .or(item.name)
            .unwrap_or_default();
        if name.trim().is_empty() {
            continue;
        }
        let kind = if item.subject_type == Some(SUBJECT_TYPE_ANIME) {
            MediaKind::Series
        } else {
            MediaKind::Movie
        };
        let year = item.air_date.as_deref().and_then(first_year);
        let entry = CatalogEntry::new(finish_title(&name, kind, aliases), year, kind);
        if !entries.iter().any(|e| e.title == entry.title && e.kind == entry.kind) {
            entries.push(entry);
        }
    }

    if entries.is_empty() {
        return Err("calendar has no entries".to_string());
    }
    Ok(Catalog::new(collection_name, entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_catalog() {
        let json = r#"[
            {"weekday": {"en": "Mon", "cn": "星期一"}, "items": [
                {"name": "Sousou no Frieren", "name_cn": "葬送的芙莉莲 第二季", "air_date": "2026-01-09", "type": 2},
                {"name": "Movie Thing", "name_cn": "", "air_date": "", "type": 6}
            ]},
            {"weekday": {"en": "Tue", "cn": "星期二"}, "items": [
                {"name": "Sousou no Frieren", "name_cn": "葬送的芙莉莲 第二季", "air_date": "2026-01-09", "type": 2}
            ]}
        ]"#;
        let catalog = calendar_catalog(json.as_bytes(), "✨当季新番", &AliasTable::default()).unwrap();

        assert_eq!(catalog.title, "✨当季新番");
        assert_eq!(
            catalog.entries,
            vec![
                CatalogEntry::new("葬送的芙莉莲", Some(2026), MediaKind::Series),
                CatalogEntry::new("Movie Thing", None, MediaKind::Movie),
            ]
        );
    }

    #[test]
    fn test_invalid_calendar() {
        assert!(calendar_catalog(b"{}", "x", &AliasTable::default()).is_err());
        assert!(calendar_catalog(b"[]", "x", &AliasTable::default()).is_err());
    }
}
