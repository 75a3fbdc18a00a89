pub mod cache;
pub mod cancel;
pub mod covers;
pub mod genres;
pub mod importer;
pub mod library_index;
pub mod lock;
pub mod matcher;
pub mod reconciler;
pub mod report;
pub mod run;

#[cfg(test)]
pub mod testing;

pub use cancel::CancelFlag;
pub use covers::{CoverEvent, CoverFiller, CoverSummary, FillOutcome};
pub use genres::{GenreChange, GenreMapper, GenreRules, GenreSummary, LibraryGenreReport};
pub use importer::{Importer, ImporterSummary};
pub use library_index::LibraryIndex;
pub use lock::RunLock;
pub use matcher::{MatchMode, Matcher, Resolution};
pub use reconciler::{CollectionReconciler, ReconcileError, ReconcileOptions, ReconcileReport};
pub use report::{CsvMissingReport, MissingReporter, NoopReporter};
pub use run::{RunError, RunOrchestrator, RunOutcome, RunSummary};
