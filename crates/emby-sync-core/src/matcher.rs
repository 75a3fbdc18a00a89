use emby_sync_models::{CatalogEntry, LibraryItem, MediaKind};
use emby_sync_sources::EmbyError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::library_index::{LibraryIndex, YearWindow};

/// How lenient name acceptance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Only identical names.
    Exact,
    /// Identical names first, then case-insensitive containment either way.
    Loose,
}

impl MatchMode {
    pub fn from_substring_flag(substring_match: bool) -> Self {
        if substring_match {
            MatchMode::Loose
        } else {
            MatchMode::Exact
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(LibraryItem),
    /// The library was searched and has no acceptable item.
    NotFound,
    /// Neither the point query nor the bulk listing could be answered.
    Unavailable,
}

/// Resolves catalog entries to library items for one collection.
///
/// Misses are remembered by title, so a title repeated in the catalog is not
/// searched twice even when the repeats carry different years.
pub struct Matcher {
    index: Arc<LibraryIndex>,
    mode: MatchMode,
    not_found: HashSet<String>,
    resolved: HashMap<CatalogEntry, LibraryItem>,
}

/// Picks the candidate for `title`: exact name first, then containment in loose mode.
pub fn select_candidate<'a>(candidates: &'a [LibraryItem], title: &str, mode: MatchMode) -> Option<&'a LibraryItem> {
    if let Some(exact) = candidates.iter().find(|c| c.name == title) {
        return Some(exact);
    }
    if mode == MatchMode::Exact {
        return None;
    }
    let wanted = title.to_lowercase();
    candidates.iter().find(|c| {
        let name = c.name.to_lowercase();
        !name.is_empty() && (name.contains(&wanted) || wanted.contains(&name))
    })
}

impl Matcher {
    pub fn new(index: Arc<LibraryIndex>, mode: MatchMode) -> Self {
        Self {
            index,
            mode,
            not_found: HashSet::new(),
            resolved: HashMap::new(),
        }
    }

    pub fn is_known_missing(&self, entry: &CatalogEntry) -> bool {
        self.not_found.contains(&entry.title)
    }

    pub async fn resolve(&mut self, entry: &CatalogEntry) -> Resolution {
        if self.is_known_missing(entry) {
            debug!(title = %entry.title, "Known missing, skipping lookup");
            return Resolution::NotFound;
        }
        if let Some(item) = self.resolved.get(entry) {
            return Resolution::Found(item.clone());
        }

        let resolution = self.lookup(entry).await;
        match &resolution {
            Resolution::Found(item) => {
                self.resolved.insert(entry.clone(), item.clone());
            }
            Resolution::NotFound => {
                self.not_found.insert(entry.title.clone());
            }
            Resolution::Unavailable => {}
        }
        resolution
    }

    async fn lookup(&self, entry: &CatalogEntry) -> Resolution {
        // Series years on upstream lists are air years, not production years.
        let year = match entry.kind {
            MediaKind::Movie => entry.year,
            MediaKind::Series => None,
        };

        match self.point_lookup(entry, year, YearWindow::Exact).await {
            Ok(Some(item)) => return Resolution::Found(item),
            Ok(None) => {}
            Err(e) => return self.bulk_lookup(entry, &e).await,
        }

        if let Some(year) = year {
            debug!(title = %entry.title, year, "Widening year window");
            match self.point_lookup(entry, Some(year), YearWindow::Adjacent).await {
                Ok(Some(item)) => return Resolution::Found(item),
                Ok(None) => {}
                Err(e) => return self.bulk_lookup(entry, &e).await,
            }
        }

        info!(title = %entry.title, year = ?entry.year, kind = %entry.kind, "Not found in library");
        Resolution::NotFound
    }

    async fn point_lookup(
        &self,
        entry: &CatalogEntry,
        year: Option<u32>,
        window: YearWindow,
    ) -> Result<Option<LibraryItem>, EmbyError> {
        let candidates = self
            .index
            .search_by_name_and_year(entry.kind, &entry.title, year, window)
            .await?;
        Ok(select_candidate(&candidates, &entry.title, self.mode).cloned())
    }

    /// Linear scan of the cached listing: exact name, same year when both sides have one.
    async fn bulk_lookup(&self, entry: &CatalogEntry, cause: &EmbyError) -> Resolution {
        warn!(title = %entry.title, kind = %entry.kind, error = %cause, "Point query failed, falling back to full listing");
        let all = match self.index.fetch_all_of_kind(entry.kind.item_type()).await {
            Ok(all) => all,
            Err(e) => {
                warn!(title = %entry.title, kind = %entry.kind, error = %e, "Full listing unavailable");
                return Resolution::Unavailable;
            }
        };

        let found = all.iter().find(|item| {
            item.name == entry.title
                && match (entry.year, item.production_year) {
                    (Some(wanted), Some(actual)) => wanted == actual,
                    _ => true,
                }
        });

        match found {
            Some(item) => Resolution::Found(item.clone()),
            None => {
                info!(title = %entry.title, year = ?entry.year, kind = %entry.kind, "Not found in full listing");
                Resolution::NotFound
            }
        }
    }
}
