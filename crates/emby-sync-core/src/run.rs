use emby_sync_config::{Config, PathManager};
use emby_sync_sources::{EmbyError, EmbyHttpClient, SourceFactoryRegistry};
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::cancel::CancelFlag;
use crate::importer::{Importer, ImporterSummary};
use crate::library_index::LibraryIndex;
use crate::lock::RunLock;
use crate::report::{CsvMissingReport, MissingReporter, NoopReporter};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Emby server is unreachable")]
    ServerUnreachable(#[source] EmbyError),

    #[error("failed to take the run lock")]
    Lock(#[source] std::io::Error),

    #[error("unknown importer '{0}'")]
    UnknownImporter(String),

    #[error(transparent)]
    Setup(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub importers: Vec<ImporterSummary>,
    pub dry_run: bool,
    pub cancelled: bool,
    #[serde(skip)]
    pub duration: Duration,
}

impl RunSummary {
    pub fn collections(&self) -> usize {
        self.importers.iter().map(|i| i.collections.len()).sum()
    }

    pub fn added(&self) -> usize {
        self.importers.iter().map(ImporterSummary::added).sum()
    }

    pub fn missing(&self) -> usize {
        self.importers.iter().map(ImporterSummary::missing).sum()
    }

    pub fn failed(&self) -> usize {
        self.importers.iter().map(|i| i.failed.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Another run holds the lock.
    Skipped { lock_path: PathBuf },
}

/// Single entry point for every sync trigger, one-shot or scheduled.
pub struct RunOrchestrator {
    config: Config,
    registry: SourceFactoryRegistry,
    index: Arc<LibraryIndex>,
    reporter: Arc<dyn MissingReporter>,
    lock_path: PathBuf,
    cancel: CancelFlag,
}

impl RunOrchestrator {
    pub fn new(config: Config, index: Arc<LibraryIndex>, reporter: Arc<dyn MissingReporter>, lock_path: PathBuf) -> Self {
        Self {
            config,
            registry: SourceFactoryRegistry::new(),
            index,
            reporter,
            lock_path,
            cancel: CancelFlag::new(),
        }
    }

    /// Wires the HTTP client, library index and report sink from configuration.
    pub fn from_config(config: Config, paths: &PathManager) -> anyhow::Result<Self> {
        let api = EmbyHttpClient::new(&config.server)?;
        let index = LibraryIndex::new(Arc::new(api)).unplayed_only(config.search_user_id().is_some());
        let reporter = missing_reporter(&config, paths);
        Ok(Self::new(config, Arc::new(index), reporter, paths.run_lock_file()))
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Runs the selected importers, or every enabled one when `selection` is empty.
    pub async fn run(&self, selection: &[String], dry_run: bool) -> Result<RunOutcome, RunError> {
        let Some(_lock) = RunLock::try_acquire(&self.lock_path).map_err(RunError::Lock)? else {
            warn!(lock = %self.lock_path.display(), "Another run is in progress, skipping this one");
            return Ok(RunOutcome::Skipped {
                lock_path: self.lock_path.clone(),
            });
        };

        if let Err(e) = self.index.check_server().await {
            error!(url = %self.config.server.url, error = %e, "Emby server unreachable, aborting run");
            return Err(RunError::ServerUnreachable(e));
        }

        let importers = self.build_importers(selection)?;
        let summary = self.run_importers(importers, dry_run || self.config.run.dry_run).await;
        log_summary(&summary);
        Ok(RunOutcome::Completed(summary))
    }

    pub fn build_importers(&self, selection: &[String]) -> Result<Vec<Importer>, RunError> {
        if selection.is_empty() {
            self.registry.validate_all_configs(&self.config)?;
            let sources = self.registry.create_enabled_sources(&self.config)?;
            if sources.is_empty() {
                warn!("No importers are enabled");
            }
            return Ok(sources.into_iter().map(Importer::new).collect());
        }

        let mut importers = Vec::with_capacity(selection.len());
        for name in selection {
            let source = self
                .registry
                .create_source_by_name(name, &self.config)?
                .ok_or_else(|| RunError::UnknownImporter(name.clone()))?;
            importers.push(Importer::new(source));
        }
        Ok(importers)
    }

    pub async fn run_importers(&self, importers: Vec<Importer>, dry_run: bool) -> RunSummary {
        let started = Instant::now();
        let names: Vec<&str> = importers.iter().map(Importer::name).collect();
        info!(importers = ?names, dry_run, concurrent = self.config.run.concurrent, "Starting run");

        let summaries = if self.config.run.concurrent {
            let futures = importers
                .iter()
                .map(|importer| importer.run(self.index.clone(), self.reporter.clone(), dry_run, self.cancel.clone()));
            join_all(futures).await
        } else {
            let mut summaries = Vec::with_capacity(importers.len());
            for importer in &importers {
                if self.cancel.is_cancelled() {
                    break;
                }
                summaries.push(
                    importer
                        .run(self.index.clone(), self.reporter.clone(), dry_run, self.cancel.clone())
                        .await,
                );
            }
            summaries
        };

        RunSummary {
            cancelled: self.cancel.is_cancelled() || summaries.iter().any(|s| s.cancelled),
            importers: summaries,
            dry_run,
            duration: started.elapsed(),
        }
    }
}

fn missing_reporter(config: &Config, paths: &PathManager) -> Arc<dyn MissingReporter> {
    if !config.output.csv_enabled {
        return Arc::new(NoopReporter);
    }
    let path = config.missing_report_path(paths);
    info!(path = %path.display(), "Recording missing items");
    Arc::new(CsvMissingReport::new(path))
}

fn log_summary(summary: &RunSummary) {
    for importer in &summary.importers {
        for failed in &importer.failed {
            warn!(
                importer = %importer.importer,
                source_id = %failed.source_id,
                collection = ?failed.collection,
                error = %failed.error,
                "Collection failed"
            );
        }
    }
    info!(
        importers = summary.importers.len(),
        collections = summary.collections(),
        added = summary.added(),
        missing = summary.missing(),
        failed = summary.failed(),
        cancelled = summary.cancelled,
        dry_run = summary.dry_run,
        duration_secs = summary.duration.as_secs_f64(),
        "Run finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::memory::MemoryReporter;
    use crate::testing::{FakeEmby, StaticSource};
    use emby_sync_models::{Catalog, CatalogEntry, MediaKind};
    use emby_sync_sources::ConfiguredSource;
    use std::collections::HashMap;

    fn orchestrator(fake: &Arc<FakeEmby>, lock_path: PathBuf, concurrent: bool) -> RunOrchestrator {
        let mut config = Config::with_server("http://emby.local:8096", "key");
        config.run.concurrent = concurrent;
        RunOrchestrator::new(
            config,
            Arc::new(LibraryIndex::new(fake.clone())),
            Arc::new(MemoryReporter::default()),
            lock_path,
        )
    }

    fn static_importer(name: &str, collection: &str, titles: &[&str]) -> Importer {
        let entries = titles
            .iter()
            .map(|t| CatalogEntry::new(*t, None, MediaKind::Movie))
            .collect();
        let mut catalogs = HashMap::new();
        catalogs.insert("list".to_string(), Catalog::new(collection, entries));
        Importer::new(ConfiguredSource {
            importer: name.to_string(),
            source: Box::new(StaticSource { catalogs }),
            source_ids: vec!["list".to_string()],
            substring_match: false,
        })
    }

    #[tokio::test]
    async fn test_importers_run_against_shared_index() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeEmby::new());
        fake.add_movie("Parasite", Some(2019));
        fake.add_movie("Alien", Some(1979));
        let orch = orchestrator(&fake, dir.path().join("run.lock"), true);

        let importers = vec![
            static_importer("hotmovie", "Weekly", &["Parasite", "Missing"]),
            static_importer("doulist", "✨Classics", &["Alien"]),
        ];
        let summary = orch.run_importers(importers, false).await;

        assert_eq!(summary.importers.len(), 2);
        assert_eq!(summary.collections(), 2);
        assert_eq!(summary.added(), 2);
        assert_eq!(summary.missing(), 1);
        assert_eq!(fake.collection_by_name("Weekly").unwrap().1, vec!["Parasite"]);
        assert_eq!(fake.collection_by_name("✨Classics").unwrap().1, vec!["Alien"]);
    }

    #[tokio::test]
    async fn test_sequential_run_stops_when_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeEmby::new());
        let cancel = CancelFlag::new();
        let orch = orchestrator(&fake, dir.path().join("run.lock"), false).with_cancel(cancel.clone());
        cancel.cancel();

        let summary = orch
            .run_importers(vec![static_importer("hotmovie", "Weekly", &["Parasite"])], false)
            .await;

        assert!(summary.cancelled);
        assert!(summary.importers.is_empty());
        assert_eq!(fake.collection_count(), 0);
    }

    #[tokio::test]
    async fn test_run_skipped_while_lock_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("run.lock");
        let fake = Arc::new(FakeEmby::new());
        let orch = orchestrator(&fake, lock_path.clone(), true);

        let _held = RunLock::try_acquire(&lock_path).unwrap().unwrap();
        let outcome = orch.run(&[], false).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeEmby::new());
        fake.set_offline(true);
        let orch = orchestrator(&fake, dir.path().join("run.lock"), true);

        let err = orch.run(&[], false).await.unwrap_err();
        assert!(matches!(err, RunError::ServerUnreachable(_)));
        // The lock is released with the failed run.
        assert!(RunLock::try_acquire(orch.lock_path()).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_importer_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeEmby::new());
        let orch = orchestrator(&fake, dir.path().join("run.lock"), true);

        let err = orch.run(&["letterboxd".to_string()], false).await.unwrap_err();
        assert!(matches!(err, RunError::UnknownImporter(name) if name == "letterboxd"));
    }

    #[test]
    fn test_csv_reporter_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::rooted_at(dir.path());
        let mut config = Config::with_server("http://emby.local:8096", "key");

        let orch = RunOrchestrator::from_config(config.clone(), &paths).unwrap();
        assert_eq!(orch.lock_path(), paths.run_lock_file());

        config.output.csv_enabled = true;
        config.output.csv_file = Some(dir.path().join("misses.csv").display().to_string());
        let reporter = missing_reporter(&config, &paths);
        reporter.record(&emby_sync_models::MissingRecord {
            collection: "Weekly".to_string(),
            title: "Parasite".to_string(),
            year: Some(2019),
            reason: emby_sync_models::MissReason::NotFound,
            importer: "hotmovie".to_string(),
            recorded_at: chrono::Utc::now(),
        });
        assert_eq!(CsvMissingReport::load(&dir.path().join("misses.csv")).unwrap().len(), 1);
    }
}
