use emby_sync_sources::{CatalogSource, ConfiguredSource};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::cancel::CancelFlag;
use crate::library_index::LibraryIndex;
use crate::matcher::MatchMode;
use crate::reconciler::{CollectionReconciler, ReconcileOptions, ReconcileReport};
use crate::report::MissingReporter;

/// One collection that could not be reconciled.
#[derive(Debug, Clone, Serialize)]
pub struct FailedCollection {
    pub source_id: String,
    pub collection: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImporterSummary {
    pub importer: String,
    pub collections: Vec<ReconcileReport>,
    /// Source ids whose feed could not be fetched this run.
    pub skipped_sources: Vec<String>,
    pub failed: Vec<FailedCollection>,
    pub cancelled: bool,
    #[serde(skip)]
    pub duration: Duration,
}

impl ImporterSummary {
    pub fn added(&self) -> usize {
        self.collections.iter().map(|c| c.added.len()).sum()
    }

    pub fn missing(&self) -> usize {
        self.collections.iter().map(|c| c.missing.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.skipped_sources.is_empty() && self.failed.is_empty()
    }
}

/// A catalog source bound to its source ids and the shared library index.
pub struct Importer {
    name: String,
    source: Box<dyn CatalogSource>,
    source_ids: Vec<String>,
    match_mode: MatchMode,
}

impl Importer {
    pub fn new(configured: ConfiguredSource) -> Self {
        Self {
            name: configured.importer,
            source: configured.source,
            source_ids: configured.source_ids,
            match_mode: MatchMode::from_substring_flag(configured.substring_match),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetches each source id in turn and reconciles its collection.
    ///
    /// Upstream and per-collection failures are recorded in the summary; the
    /// remaining ids still run.
    pub async fn run(
        &self,
        index: Arc<LibraryIndex>,
        reporter: Arc<dyn MissingReporter>,
        dry_run: bool,
        cancel: CancelFlag,
    ) -> ImporterSummary {
        let started = Instant::now();
        let mut summary = ImporterSummary {
            importer: self.name.clone(),
            ..ImporterSummary::default()
        };
        let reconciler = CollectionReconciler::new(
            index,
            reporter,
            ReconcileOptions {
                importer: self.name.clone(),
                match_mode: self.match_mode,
                dry_run,
            },
            cancel.clone(),
        );

        info!(importer = %self.name, sources = self.source_ids.len(), dry_run, "Starting importer");

        for source_id in &self.source_ids {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let catalog = match self.source.fetch(source_id).await {
                Ok(catalog) => catalog,
                Err(e) => {
                    warn!(importer = %self.name, source_id = %source_id, error = %e, "Skipping source for this run");
                    summary.skipped_sources.push(source_id.clone());
                    continue;
                }
            };
            if catalog.is_empty() {
                warn!(importer = %self.name, source_id = %source_id, collection = %catalog.title, "Catalog has no entries, skipping");
                summary.skipped_sources.push(source_id.clone());
                continue;
            }

            match reconciler.reconcile(&catalog).await {
                Ok(report) => {
                    if report.cancelled {
                        summary.cancelled = true;
                    }
                    summary.collections.push(report);
                }
                Err(e) => {
                    error!(importer = %self.name, source_id = %source_id, collection = %catalog.title, error = %e, "Collection skipped");
                    summary.failed.push(FailedCollection {
                        source_id: source_id.clone(),
                        collection: Some(catalog.title.clone()),
                        error: e.to_string(),
                    });
                }
            }
            if summary.cancelled {
                break;
            }
        }

        summary.duration = started.elapsed();
        info!(
            importer = %self.name,
            collections = summary.collections.len(),
            added = summary.added(),
            missing = summary.missing(),
            skipped = summary.skipped_sources.len(),
            failed = summary.failed.len(),
            duration_ms = summary.duration.as_millis() as u64,
            "Importer finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::memory::MemoryReporter;
    use crate::testing::{FakeEmby, StaticSource};
    use emby_sync_models::{Catalog, CatalogEntry, MediaKind};
    use std::collections::HashMap;

    fn importer(catalogs: Vec<(&str, Catalog)>, ids: &[&str]) -> Importer {
        let catalogs: HashMap<String, Catalog> = catalogs.into_iter().map(|(id, c)| (id.to_string(), c)).collect();
        Importer::new(ConfiguredSource {
            importer: "hotmovie".to_string(),
            source: Box::new(StaticSource { catalogs }),
            source_ids: ids.iter().map(|s| s.to_string()).collect(),
            substring_match: false,
        })
    }

    #[tokio::test]
    async fn test_unavailable_source_is_skipped_others_run() {
        let fake = Arc::new(FakeEmby::new());
        fake.add_movie("Parasite", Some(2019));
        let index = Arc::new(LibraryIndex::new(fake.clone()));
        let reporter = Arc::new(MemoryReporter::default());

        let good = Catalog::new(
            "一周口碑电影榜",
            vec![CatalogEntry::new("Parasite", Some(2019), MediaKind::Movie)],
        );
        let imp = importer(vec![("movie_weekly_best", good)], &["down", "movie_weekly_best"]);

        let summary = imp.run(index, reporter, false, CancelFlag::new()).await;

        assert_eq!(summary.skipped_sources, vec!["down"]);
        assert_eq!(summary.collections.len(), 1);
        assert_eq!(summary.added(), 1);
        assert!(fake.collection_by_name("一周口碑电影榜").is_some());
    }

    #[tokio::test]
    async fn test_failed_collection_does_not_stop_importer() {
        let fake = Arc::new(FakeEmby::new());
        fake.add_movie("Parasite", Some(2019));
        let index = Arc::new(LibraryIndex::new(fake.clone()));
        let reporter = Arc::new(MemoryReporter::default());

        let nothing = Catalog::new("Empty Shelf", vec![CatalogEntry::new("Nope", None, MediaKind::Movie)]);
        let good = Catalog::new("Good", vec![CatalogEntry::new("Parasite", Some(2019), MediaKind::Movie)]);
        let imp = importer(vec![("a", nothing), ("b", good), ("c", Catalog::new("Blank", vec![]))], &["a", "b", "c"]);

        let summary = imp.run(index, reporter.clone(), false, CancelFlag::new()).await;

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].collection.as_deref(), Some("Empty Shelf"));
        assert_eq!(summary.collections.len(), 1);
        assert_eq!(summary.skipped_sources, vec!["c"]);
        assert_eq!(reporter.titles(), vec!["Nope"]);
        assert!(!summary.is_clean());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let fake = Arc::new(FakeEmby::new());
        let index = Arc::new(LibraryIndex::new(fake.clone()));
        let cancel = CancelFlag::new();
        cancel.cancel();

        let imp = importer(vec![], &["a"]);
        let summary = imp.run(index, Arc::new(MemoryReporter::default()), false, cancel).await;

        assert!(summary.cancelled);
        assert!(summary.skipped_sources.is_empty());
    }
}
