use async_trait::async_trait;
use emby_sync_models::Catalog;

use crate::SourceError;

/// An upstream list of titles that should become one collection.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Short provider name used in logs and reports.
    fn source_name(&self) -> &str;

    /// Fetch and normalize the catalog identified by `source_id`.
    ///
    /// Entries come back in upstream order with titles already cleaned.
    async fn fetch(&self, source_id: &str) -> Result<Catalog, SourceError>;
}
