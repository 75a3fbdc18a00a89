use chrono::Utc;
use emby_sync_models::{Catalog, CatalogEntry, Collection, LibraryItem, MissReason, MissingRecord};
use emby_sync_sources::{EmbyError, ImageType};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::cancel::CancelFlag;
use crate::library_index::LibraryIndex;
use crate::matcher::{MatchMode, Matcher, Resolution};
use crate::report::MissingReporter;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Nothing in the catalog exists in the library, so there is nothing to create the collection with.
    #[error("no catalog entry of '{collection}' exists in the library ({missing} missing)")]
    NoSeedItem { collection: String, missing: usize },

    #[error("collection '{collection}' still has {remaining} members after clearing")]
    ClearNotVerified { collection: String, remaining: usize },

    #[error("failed to create collection '{collection}'")]
    CreateFailed {
        collection: String,
        #[source]
        source: EmbyError,
    },

    #[error("failed to look up collection '{collection}'")]
    Lookup {
        collection: String,
        #[source]
        source: EmbyError,
    },

    #[error("cancelled before collection '{collection}' was created")]
    Cancelled { collection: String },
}

/// Where the target collection stood before this run touched it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum InitialState {
    Absent,
    Created(Collection),
    Populated(Collection),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub collection: String,
    pub collection_id: Option<String>,
    pub created: bool,
    /// Members removed before repopulating.
    pub cleared: usize,
    pub added: Vec<String>,
    pub missing: Vec<MissingRecord>,
    pub cover_set: bool,
    pub cancelled: bool,
    pub dry_run: bool,
    /// Member names after the run, in insertion order.
    pub final_members: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub importer: String,
    pub match_mode: MatchMode,
    pub dry_run: bool,
}

/// Makes one collection mirror one catalog: create if absent, clear, then
/// rebuild in catalog order from whatever resolves.
pub struct CollectionReconciler {
    index: Arc<LibraryIndex>,
    reporter: Arc<dyn MissingReporter>,
    options: ReconcileOptions,
    cancel: CancelFlag,
}

/// Per-collection bookkeeping for one run.
struct Progress<'a> {
    catalog: &'a Catalog,
    report: ReconcileReport,
    reported: HashSet<String>,
    added_ids: HashSet<String>,
    collection: Collection,
    cover_pending: bool,
}

impl CollectionReconciler {
    pub fn new(
        index: Arc<LibraryIndex>,
        reporter: Arc<dyn MissingReporter>,
        options: ReconcileOptions,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            index,
            reporter,
            options,
            cancel,
        }
    }

    #[instrument(skip(self, catalog), fields(collection = %catalog.title, importer = %self.options.importer))]
    pub async fn reconcile(&self, catalog: &Catalog) -> Result<ReconcileReport, ReconcileError> {
        let name = catalog.title.clone();
        let mut matcher = Matcher::new(self.index.clone(), self.options.match_mode);
        let mut progress = Progress {
            catalog,
            report: ReconcileReport {
                collection: name.clone(),
                dry_run: self.options.dry_run,
                ..ReconcileReport::default()
            },
            reported: HashSet::new(),
            added_ids: HashSet::new(),
            collection: Collection::absent(&name),
            cover_pending: false,
        };

        let existing = self
            .index
            .find_collection_by_name(&name)
            .await
            .map_err(|source| ReconcileError::Lookup {
                collection: name.clone(),
                source,
            })?;
        let state = match existing {
            None => InitialState::Absent,
            Some(c) if c.member_names.is_empty() => InitialState::Created(c),
            Some(c) => InitialState::Populated(c),
        };
        info!(entries = catalog.entries.len(), state = state_label(&state), "Reconciling collection");

        match state {
            InitialState::Absent => self.create_with_seed(&mut matcher, &mut progress).await?,
            InitialState::Created(c) => {
                progress.collection = c;
                progress.cover_pending = true;
            }
            InitialState::Populated(c) => self.clear_and_verify(c, &mut progress).await?,
        }

        self.populate(&mut matcher, &mut progress).await;

        let mut report = progress.report;
        report.collection_id = progress.collection.id.clone();
        report.final_members = progress.collection.member_names;
        info!(
            added = report.added.len(),
            missing = report.missing.len(),
            members = report.final_members.len(),
            created = report.created,
            cleared = report.cleared,
            "Collection reconciled"
        );
        Ok(report)
    }

    /// Scans for the first entry that exists and creates the collection with it.
    async fn create_with_seed(&self, matcher: &mut Matcher, progress: &mut Progress<'_>) -> Result<(), ReconcileError> {
        let catalog = progress.catalog;
        let mut seed: Option<LibraryItem> = None;
        // Unreachable entries get another lookup during population.
        let mut unavailable: Vec<&CatalogEntry> = Vec::new();

        for entry in &catalog.entries {
            if self.cancel.is_cancelled() {
                return Err(ReconcileError::Cancelled {
                    collection: catalog.title.clone(),
                });
            }
            match matcher.resolve(entry).await {
                Resolution::Found(item) => {
                    seed = Some(item);
                    break;
                }
                Resolution::NotFound => self.report_miss(progress, entry, MissReason::NotFound),
                Resolution::Unavailable => unavailable.push(entry),
            }
        }

        let Some(seed) = seed else {
            for entry in unavailable {
                self.report_miss(progress, entry, MissReason::ServerUnavailable);
            }
            warn!(missing = progress.report.missing.len(), "No catalog entry exists in the library, not creating collection");
            return Err(ReconcileError::NoSeedItem {
                collection: catalog.title.clone(),
                missing: progress.report.missing.len(),
            });
        };

        if self.options.dry_run {
            info!(seed = %seed.name, "[dry-run] Would create collection");
        } else {
            let id = self
                .index
                .create_collection(&catalog.title, &seed.id)
                .await
                .map_err(|source| ReconcileError::CreateFailed {
                    collection: catalog.title.clone(),
                    source,
                })?;
            progress.collection.id = Some(id);
        }

        progress.report.created = true;
        progress.added_ids.insert(seed.id.clone());
        progress.collection.push_member(seed.name.clone());
        progress.report.added.push(seed.name.clone());
        self.apply_cover(progress, &seed).await;
        Ok(())
    }

    /// Empties an existing collection and confirms it with a fresh listing.
    async fn clear_and_verify(&self, existing: Collection, progress: &mut Progress<'_>) -> Result<(), ReconcileError> {
        let name = existing.name.clone();
        let count = existing.member_names.len();
        let Some(id) = existing.id.clone() else {
            return Err(ReconcileError::Lookup {
                collection: name,
                source: EmbyError::InvalidRequest("existing collection has no id".to_string()),
            });
        };

        if self.options.dry_run {
            info!(members = count, "[dry-run] Would clear collection");
        } else {
            if let Err(e) = self.index.clear_collection(&id).await {
                warn!(error = %e, "Clearing collection failed");
            }
            let remaining = self
                .index
                .list_collection_members(&id)
                .await
                .map_err(|source| ReconcileError::Lookup {
                    collection: name.clone(),
                    source,
                })?;
            if !remaining.is_empty() {
                error!(remaining = remaining.len(), "Collection not empty after clearing, skipping repopulation");
                return Err(ReconcileError::ClearNotVerified {
                    collection: name,
                    remaining: remaining.len(),
                });
            }
        }

        progress.report.cleared = count;
        progress.collection = Collection {
            id: Some(id),
            name,
            member_names: Vec::new(),
        };
        progress.cover_pending = true;
        Ok(())
    }

    async fn populate(&self, matcher: &mut Matcher, progress: &mut Progress<'_>) {
        let catalog = progress.catalog;
        for entry in &catalog.entries {
            if self.cancel.is_cancelled() {
                warn!("Cancelled, stopping before the next entry");
                progress.report.cancelled = true;
                break;
            }
            if progress.collection.contains(&entry.title) || matcher.is_known_missing(entry) {
                continue;
            }

            let item = match matcher.resolve(entry).await {
                Resolution::Found(item) => item,
                Resolution::NotFound => {
                    self.report_miss(progress, entry, MissReason::NotFound);
                    continue;
                }
                Resolution::Unavailable => {
                    self.report_miss(progress, entry, MissReason::ServerUnavailable);
                    continue;
                }
            };
            if progress.added_ids.contains(&item.id) || progress.collection.contains(&item.name) {
                debug!(title = %entry.title, item = %item.name, "Already a member");
                continue;
            }

            if !self.options.dry_run {
                let Some(collection_id) = progress.collection.id.clone() else {
                    continue;
                };
                if !self.index.add_item(&item.id, &collection_id).await {
                    self.report_miss(progress, entry, MissReason::AddFailed);
                    continue;
                }
            }

            debug!(title = %entry.title, item = %item.name, "Added to collection");
            progress.added_ids.insert(item.id.clone());
            progress.collection.push_member(item.name.clone());
            progress.report.added.push(item.name.clone());
            if progress.cover_pending {
                self.apply_cover(progress, &item).await;
            }
        }
    }

    async fn apply_cover(&self, progress: &mut Progress<'_>, from: &LibraryItem) {
        progress.cover_pending = false;
        if self.options.dry_run {
            info!(from = %from.name, "[dry-run] Would set collection cover");
            return;
        }
        let Some(collection_id) = progress.collection.id.as_deref() else {
            return;
        };
        let url = self.index.image_url(&from.id, ImageType::Primary);
        progress.report.cover_set = self.index.set_collection_cover(collection_id, &url).await;
    }

    /// Records a miss once per title per run.
    fn report_miss(&self, progress: &mut Progress<'_>, entry: &CatalogEntry, reason: MissReason) {
        if !progress.reported.insert(entry.title.clone()) {
            return;
        }
        info!(title = %entry.title, year = ?entry.year, kind = %entry.kind, %reason, "Missing from collection");
        let record = MissingRecord {
            collection: progress.catalog.title.clone(),
            title: entry.title.clone(),
            year: entry.year,
            reason,
            importer: self.options.importer.clone(),
            recorded_at: Utc::now(),
        };
        self.reporter.record(&record);
        progress.report.missing.push(record);
    }
}

fn state_label(state: &InitialState) -> &'static str {
    match state {
        InitialState::Absent => "absent",
        InitialState::Created(_) => "created",
        InitialState::Populated(_) => "populated",
    }
}
