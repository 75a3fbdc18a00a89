use emby_sync_models::{Collection, ItemType, LibraryItem, MediaKind};
use emby_sync_sources::{EmbyApi, EmbyError, ImageType, ItemQuery, ServerInfo};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{TtlCache, DEFAULT_TTL};

/// Page size for bulk listings.
pub const PAGE_SIZE: u32 = 1000;
/// Upper bound on members read back from one collection.
pub const CHILDREN_LIMIT: u32 = 999;

/// Which production years a point query accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearWindow {
    /// Only the catalog year.
    Exact,
    /// The years either side of the catalog year.
    Adjacent,
}

impl YearWindow {
    pub fn years(self, year: u32) -> Vec<u32> {
        match self {
            YearWindow::Exact => vec![year],
            YearWindow::Adjacent => vec![year.saturating_sub(1), year + 1],
        }
    }
}

/// Read and write access to the server library, with TTL-cached bulk listings.
///
/// Lookups return `Err` when the server could not be asked, so callers can
/// tell "not there" apart from "could not check". Mutations return plain
/// booleans and log their own failures.
pub struct LibraryIndex {
    api: Arc<dyn EmbyApi>,
    unplayed_only: bool,
    movies: TtlCache<Vec<LibraryItem>>,
    series: TtlCache<Vec<LibraryItem>>,
    collections: TtlCache<Vec<LibraryItem>>,
}

impl LibraryIndex {
    pub fn new(api: Arc<dyn EmbyApi>) -> Self {
        Self::with_ttl(api, DEFAULT_TTL)
    }

    pub fn with_ttl(api: Arc<dyn EmbyApi>, ttl: Duration) -> Self {
        Self {
            api,
            unplayed_only: false,
            movies: TtlCache::new("movies", ttl),
            series: TtlCache::new("series", ttl),
            collections: TtlCache::new("collections", ttl),
        }
    }

    /// Restrict movie and series lookups to items the configured user has not played.
    pub fn unplayed_only(mut self, unplayed_only: bool) -> Self {
        self.unplayed_only = unplayed_only;
        self
    }

    pub async fn check_server(&self) -> Result<ServerInfo, EmbyError> {
        let info = self.api.server_info().await?;
        info!(server = %info.server_name, version = %info.version, "Emby server is reachable");
        Ok(info)
    }

    /// Point query by name, optionally restricted to years around `year`.
    pub async fn search_by_name_and_year(
        &self,
        kind: MediaKind,
        name: &str,
        year: Option<u32>,
        window: YearWindow,
    ) -> Result<Vec<LibraryItem>, EmbyError> {
        let years = year.map(|y| window.years(y)).unwrap_or_default();
        let query = ItemQuery::search(kind.item_type(), name)
            .with_years(years)
            .unplayed(self.unplayed_only);
        let page = self.api.query_items(&query).await?;
        debug!(title = name, ?year, ?window, %kind, hits = page.items.len(), "Point query");
        Ok(page.items)
    }

    /// Every item of `kind` in the library. Served from cache within the TTL.
    pub async fn fetch_all_of_kind(&self, kind: ItemType) -> Result<Arc<Vec<LibraryItem>>, EmbyError> {
        let cache = match kind {
            ItemType::Movie => &self.movies,
            ItemType::Series => &self.series,
            ItemType::BoxSet => &self.collections,
            ItemType::Other => return Err(EmbyError::InvalidRequest("cannot list items of unknown type".to_string())),
        };
        let unplayed = self.unplayed_only && kind != ItemType::BoxSet;
        cache.get_or_try_refresh(|| self.list_all(kind, unplayed)).await
    }

    async fn list_all(&self, kind: ItemType, unplayed: bool) -> Result<Vec<LibraryItem>, EmbyError> {
        let mut items: Vec<LibraryItem> = Vec::new();
        loop {
            let query = ItemQuery::listing(kind, items.len() as u32, PAGE_SIZE).unplayed(unplayed);
            let page = self.api.query_items(&query).await?;
            let received = page.items.len();
            items.extend(page.items);
            if received == 0 || items.len() as u32 >= page.total_record_count {
                break;
            }
        }
        info!(kind = kind.as_query(), count = items.len(), "Fetched full library listing");
        Ok(items)
    }

    /// The box-set named exactly `name`, with its current member names.
    ///
    /// When the point query cannot be answered the cached box-set listing is
    /// scanned instead. `Ok(None)` always means the lookup succeeded and found nothing.
    pub async fn find_collection_by_name(&self, name: &str) -> Result<Option<Collection>, EmbyError> {
        let found = match self.api.query_items(&ItemQuery::search(ItemType::BoxSet, name)).await {
            Ok(page) => page.items.into_iter().find(|item| item.name == name),
            Err(e) if e.is_transient() => {
                warn!(collection = name, error = %e, "Collection search failed, scanning full box-set listing");
                let all = self.fetch_all_of_kind(ItemType::BoxSet).await?;
                all.iter().find(|item| item.name == name).cloned()
            }
            Err(e) => return Err(e),
        };

        let Some(item) = found else {
            debug!(collection = name, "Collection does not exist");
            return Ok(None);
        };

        let member_names = self.list_collection_members(&item.id).await?;
        debug!(collection = name, id = %item.id, members = member_names.len(), "Collection found");
        Ok(Some(Collection {
            id: Some(item.id),
            name: item.name,
            member_names,
        }))
    }

    pub async fn collection_children(&self, collection_id: &str) -> Result<Vec<LibraryItem>, EmbyError> {
        let page = self
            .api
            .query_items(&ItemQuery::children(collection_id, CHILDREN_LIMIT))
            .await?;
        Ok(page.items)
    }

    pub async fn list_collection_members(&self, collection_id: &str) -> Result<Vec<String>, EmbyError> {
        let children = self.collection_children(collection_id).await?;
        Ok(children.into_iter().map(|item| item.name).collect())
    }

    pub async fn create_collection(&self, name: &str, initial_item_id: &str) -> Result<String, EmbyError> {
        let id = self.api.create_collection(name, initial_item_id).await?;
        self.collections.invalidate().await;
        info!(collection = name, id = %id, "Created collection");
        Ok(id)
    }

    /// True only when the server confirmed the add.
    pub async fn add_item(&self, item_id: &str, collection_id: &str) -> bool {
        match self.api.add_to_collection(collection_id, &[item_id.to_string()]).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(item_id, collection_id, "Server did not confirm the add");
                false
            }
            Err(e) => {
                warn!(item_id, collection_id, error = %e, "Failed to add item to collection");
                false
            }
        }
    }

    /// Removes every member in one bulk call. Returns how many were asked to go.
    pub async fn clear_collection(&self, collection_id: &str) -> Result<usize, EmbyError> {
        let children = self.collection_children(collection_id).await?;
        if children.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = children.into_iter().map(|item| item.id).collect();
        if !self.api.remove_from_collection(collection_id, &ids).await? {
            warn!(collection_id, count = ids.len(), "Server rejected the bulk remove");
        }
        info!(collection_id, count = ids.len(), "Cleared collection");
        Ok(ids.len())
    }

    pub fn image_url(&self, item_id: &str, image: ImageType) -> String {
        self.api.image_url(item_id, image)
    }

    pub async fn has_image(&self, item_id: &str, image: ImageType) -> Result<bool, EmbyError> {
        self.api.has_image(item_id, image).await
    }

    /// Downloads `source_image_url` and uploads it as the collection's `image`.
    pub async fn set_collection_image(&self, collection_id: &str, image: ImageType, source_image_url: &str) -> bool {
        let bytes = match self.api.download(source_image_url).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                warn!(collection_id, url = source_image_url, "Source image is empty");
                return false;
            }
            Err(e) => {
                warn!(collection_id, url = source_image_url, error = %e, "Failed to download source image");
                return false;
            }
        };

        match self.api.upload_image(collection_id, image, &bytes).await {
            Ok(true) => {
                info!(collection_id, image = %image, "Collection image updated");
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(collection_id, image = %image, error = %e, "Failed to upload collection image");
                false
            }
        }
    }

    pub async fn set_collection_cover(&self, collection_id: &str, source_image_url: &str) -> bool {
        self.set_collection_image(collection_id, ImageType::Primary, source_image_url)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEmby;

    fn index(fake: &Arc<FakeEmby>) -> LibraryIndex {
        LibraryIndex::new(fake.clone())
    }

    #[tokio::test]
    async fn test_fetch_all_paginates_and_caches() {
        let fake = Arc::new(FakeEmby::new());
        for i in 0..2500 {
            fake.add_movie(&format!("Movie {i}"), Some(2000));
        }
        let index = index(&fake);

        let all = index.fetch_all_of_kind(ItemType::Movie).await.unwrap();
        assert_eq!(all.len(), 2500);
        assert_eq!(fake.listing_calls(), 3);

        index.fetch_all_of_kind(ItemType::Movie).await.unwrap();
        assert_eq!(fake.listing_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_refreshes_after_ttl() {
        let fake = Arc::new(FakeEmby::new());
        fake.add_movie("A", Some(2001));
        let index = index(&fake);

        index.fetch_all_of_kind(ItemType::Movie).await.unwrap();
        index.fetch_all_of_kind(ItemType::Movie).await.unwrap();
        assert_eq!(fake.listing_calls(), 1);

        fake.add_movie("B", Some(2002));
        tokio::time::advance(DEFAULT_TTL + Duration::from_secs(1)).await;
        let all = index.fetch_all_of_kind(ItemType::Movie).await.unwrap();
        assert_eq!(fake.listing_calls(), 2);
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_find_collection_exact_name_only() {
        let fake = Arc::new(FakeEmby::new());
        let a = fake.add_movie("A", None);
        fake.add_collection("Weekly Best (old)", &[&a]);
        let index = index(&fake);

        assert!(index.find_collection_by_name("Weekly Best").await.unwrap().is_none());

        fake.add_collection("Weekly Best", &[&a]);
        let found = index.find_collection_by_name("Weekly Best").await.unwrap().unwrap();
        assert_eq!(found.member_names, vec!["A"]);
    }

    #[tokio::test]
    async fn test_find_collection_falls_back_to_listing() {
        let fake = Arc::new(FakeEmby::new());
        let a = fake.add_movie("A", None);
        fake.add_collection("Weekly Best", &[&a]);
        fake.fail_point_queries(true);
        let index = index(&fake);

        let found = index.find_collection_by_name("Weekly Best").await.unwrap().unwrap();
        assert!(found.exists());
        assert_eq!(fake.listing_calls(), 1);

        fake.fail_listings(true);
        index.collections.invalidate().await;
        assert!(index.find_collection_by_name("Weekly Best").await.is_err());
    }

    #[tokio::test]
    async fn test_clear_collection() {
        let fake = Arc::new(FakeEmby::new());
        let a = fake.add_movie("A", None);
        let b = fake.add_movie("B", None);
        let id = fake.add_collection("C", &[&a, &b]);
        let index = index(&fake);

        assert_eq!(index.clear_collection(&id).await.unwrap(), 2);
        assert!(index.list_collection_members(&id).await.unwrap().is_empty());
        assert_eq!(index.clear_collection(&id).await.unwrap(), 0);
        assert_eq!(fake.remove_calls(), 1);
    }

    #[tokio::test]
    async fn test_set_cover_copies_primary() {
        let fake = Arc::new(FakeEmby::new());
        let a = fake.add_movie("A", None);
        let id = fake.add_collection("C", &[&a]);
        let index = index(&fake);

        let url = index.image_url(&a, ImageType::Primary);
        assert!(index.set_collection_cover(&id, &url).await);
        assert_eq!(fake.uploads(), vec![(id.clone(), ImageType::Primary, url.into_bytes())]);
        assert!(index.has_image(&id, ImageType::Primary).await.unwrap());
    }

    #[test]
    fn test_year_window() {
        assert_eq!(YearWindow::Exact.years(2020), vec![2020]);
        assert_eq!(YearWindow::Adjacent.years(2020), vec![2019, 2021]);
    }
}
