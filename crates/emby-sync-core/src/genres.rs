//! Replaces English genre tags with their localized names in selected libraries.

use emby_sync_models::{ItemType, LibraryItem};
use emby_sync_sources::{EmbyApi, EmbyError, ItemQuery};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cancel::CancelFlag;

const PAGE_SIZE: u32 = 1000;
const MAPPED_KINDS: [ItemType; 2] = [ItemType::Movie, ItemType::Series];

/// English genre -> localized genre.
#[derive(Debug, Clone, Default)]
pub struct GenreRules {
    to_local: HashMap<String, String>,
}

impl GenreRules {
    /// Builds the rules from the configured localized -> English table.
    ///
    /// When two localized names share an English genre, the later key wins.
    pub fn from_mapping(mapping: &BTreeMap<String, String>) -> Self {
        let to_local = mapping
            .iter()
            .map(|(local, english)| (english.clone(), local.clone()))
            .collect();
        Self { to_local }
    }

    pub fn is_empty(&self) -> bool {
        self.to_local.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_local.len()
    }

    /// Rewrites `Genres` and `GenreItems[].Name` of an item document in place.
    ///
    /// Returns the genre list before and after, or `None` when nothing matched.
    pub fn apply(&self, item: &mut Value) -> Option<(Vec<String>, Vec<String>)> {
        let before = genre_names(item);
        let mut changed = false;

        if let Some(Value::Array(genres)) = item.get_mut("Genres") {
            for genre in genres.iter_mut() {
                if let Some(local) = genre.as_str().and_then(|g| self.to_local.get(g)) {
                    *genre = Value::String(local.clone());
                    changed = true;
                }
            }
        }
        if let Some(Value::Array(genre_items)) = item.get_mut("GenreItems") {
            for name in genre_items.iter_mut().filter_map(|g| g.get_mut("Name")) {
                if let Some(local) = name.as_str().and_then(|n| self.to_local.get(n)) {
                    *name = Value::String(local.clone());
                    changed = true;
                }
            }
        }

        changed.then(|| (before, genre_names(item)))
    }
}

fn genre_names(item: &Value) -> Vec<String> {
    item.get("Genres")
        .and_then(Value::as_array)
        .map(|genres| genres.iter().filter_map(|g| g.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenreChange {
    pub item_id: String,
    pub name: String,
    pub before: Vec<String>,
    pub after: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LibraryGenreReport {
    pub library: String,
    pub scanned: usize,
    pub changed: Vec<GenreChange>,
    /// Items whose details could not be read or written.
    pub failed: Vec<String>,
    /// Set when the library listing itself failed.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenreSummary {
    pub libraries: Vec<LibraryGenreReport>,
    /// Configured names with no matching library on the server.
    pub missing_libraries: Vec<String>,
    pub dry_run: bool,
    pub cancelled: bool,
}

impl GenreSummary {
    pub fn changed(&self) -> usize {
        self.libraries.iter().map(|l| l.changed.len()).sum()
    }

    pub fn failed(&self) -> usize {
        self.libraries.iter().map(|l| l.failed.len()).sum()
    }
}

enum ItemOutcome {
    Unchanged,
    Changed(GenreChange),
    Failed,
}

pub struct GenreMapper {
    api: Arc<dyn EmbyApi>,
    rules: GenreRules,
    dry_run: bool,
    cancel: CancelFlag,
}

impl GenreMapper {
    pub fn new(api: Arc<dyn EmbyApi>, rules: GenreRules, dry_run: bool, cancel: CancelFlag) -> Self {
        Self {
            api,
            rules,
            dry_run,
            cancel,
        }
    }

    /// Maps genres of every movie and series in the named libraries.
    ///
    /// Only the library listing is fatal; per-item failures are collected.
    pub async fn run(&self, library_names: &[String]) -> Result<GenreSummary, EmbyError> {
        let mut summary = GenreSummary {
            dry_run: self.dry_run,
            ..GenreSummary::default()
        };
        if self.rules.is_empty() {
            warn!("No genre rules configured, nothing to do");
            return Ok(summary);
        }

        let folders = self.api.virtual_folders().await?;
        info!(rules = self.rules.len(), dry_run = self.dry_run, "Mapping genres");

        for name in library_names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let Some(folder) = folders.iter().find(|f| f.name == name) else {
                warn!(library = name, "Library not found on server");
                summary.missing_libraries.push(name.to_string());
                continue;
            };

            let report = self.map_library(name, &folder.item_id).await;
            summary.cancelled |= self.cancel.is_cancelled();
            summary.libraries.push(report);
        }

        info!(
            changed = summary.changed(),
            failed = summary.failed(),
            cancelled = summary.cancelled,
            "Genre mapping finished"
        );
        Ok(summary)
    }

    async fn map_library(&self, name: &str, library_id: &str) -> LibraryGenreReport {
        let mut report = LibraryGenreReport {
            library: name.to_string(),
            ..LibraryGenreReport::default()
        };
        let items = match self.library_items(library_id).await {
            Ok(items) => items,
            Err(e) => {
                warn!(library = name, error = %e, "Could not list library");
                report.error = Some(e.to_string());
                return report;
            }
        };
        info!(library = name, items = items.len(), "Scanning library");

        for item in &items {
            if self.cancel.is_cancelled() {
                warn!(library = name, "Cancelled, stopping before the next item");
                break;
            }
            report.scanned += 1;
            match self.map_item(item).await {
                ItemOutcome::Unchanged => {}
                ItemOutcome::Changed(change) => report.changed.push(change),
                ItemOutcome::Failed => report.failed.push(item.name.clone()),
            }
        }
        report
    }

    async fn library_items(&self, library_id: &str) -> Result<Vec<LibraryItem>, EmbyError> {
        let mut items = Vec::new();
        loop {
            let query = ItemQuery::library(library_id, &MAPPED_KINDS, items.len() as u32, PAGE_SIZE);
            let page = self.api.query_items(&query).await?;
            let returned = page.items.len();
            items.extend(page.items);
            if returned == 0 || items.len() >= page.total_record_count as usize {
                return Ok(items);
            }
        }
    }

    async fn map_item(&self, item: &LibraryItem) -> ItemOutcome {
        let mut detail = match self.api.item_detail(&item.id).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!(title = %item.name, error = %e, "Could not read item details");
                return ItemOutcome::Failed;
            }
        };
        let Some((before, after)) = self.rules.apply(&mut detail) else {
            debug!(title = %item.name, "Genres already mapped");
            return ItemOutcome::Unchanged;
        };

        let change = GenreChange {
            item_id: item.id.clone(),
            name: item.name.clone(),
            before,
            after,
        };
        if self.dry_run {
            info!(title = %item.name, before = ?change.before, after = ?change.after, "[dry-run] Would update genres");
            return ItemOutcome::Changed(change);
        }

        match self.api.update_item(&item.id, &detail).await {
            Ok(true) => {
                info!(title = %item.name, before = ?change.before, after = ?change.after, "Genres updated");
                ItemOutcome::Changed(change)
            }
            Ok(false) => {
                warn!(title = %item.name, "Server rejected genre update");
                ItemOutcome::Failed
            }
            Err(e) => {
                warn!(title = %item.name, error = %e, "Genre update failed");
                ItemOutcome::Failed
            }
        }
    }
}
