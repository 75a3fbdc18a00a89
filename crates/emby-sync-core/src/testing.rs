//! In-memory Emby server for engine tests.

use async_trait::async_trait;
use emby_sync_models::{Catalog, ItemType, LibraryItem};
use emby_sync_sources::{
    CatalogSource, EmbyApi, EmbyError, ImageType, ItemPage, ItemQuery, ServerInfo, SourceError, VirtualFolder,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    items: Vec<LibraryItem>,
    collections: Vec<(LibraryItem, Vec<String>)>,
    libraries: Vec<(VirtualFolder, Vec<String>)>,
    details: HashMap<String, Value>,
    images: HashSet<(String, ImageType)>,
    next_id: u32,

    point_calls: usize,
    listing_calls: usize,
    create_calls: usize,
    add_calls: usize,
    remove_calls: usize,
    uploads: Vec<(String, ImageType, Vec<u8>)>,
    updates: Vec<(String, Value)>,

    fail_point_queries: bool,
    fail_listings: bool,
    fail_removals: bool,
    /// Remaining scripted failures per search term.
    failing_searches: HashMap<String, usize>,
    failing_details: HashSet<String>,
    reject_adds: HashSet<String>,
    offline: bool,
}

pub struct FakeEmby {
    state: Mutex<State>,
}

fn transient(url: &str) -> EmbyError {
    EmbyError::Transient {
        url: url.to_string(),
        attempts: 3,
        storage_fault: true,
        last_error: "HTTP 500: SQLitePCL.pretty.SQLiteException".to_string(),
    }
}

impl FakeEmby {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn add_item(&self, name: &str, kind: ItemType, year: Option<u32>) -> String {
        let mut s = self.state.lock().unwrap();
        s.next_id += 1;
        let id = format!("i{}", s.next_id);
        s.items.push(LibraryItem::new(id.clone(), name, kind, year));
        s.images.insert((id.clone(), ImageType::Primary));
        id
    }

    pub fn add_movie(&self, name: &str, year: Option<u32>) -> String {
        self.add_item(name, ItemType::Movie, year)
    }

    pub fn add_series(&self, name: &str, year: Option<u32>) -> String {
        self.add_item(name, ItemType::Series, year)
    }

    pub fn add_collection(&self, name: &str, member_ids: &[&str]) -> String {
        let mut s = self.state.lock().unwrap();
        s.next_id += 1;
        let id = format!("c{}", s.next_id);
        let members = member_ids.iter().map(|m| m.to_string()).collect();
        s.collections
            .push((LibraryItem::new(id.clone(), name, ItemType::BoxSet, None), members));
        id
    }

    /// A top-level library holding `item_ids`.
    pub fn add_library(&self, name: &str, item_ids: &[&str]) -> String {
        let mut s = self.state.lock().unwrap();
        s.next_id += 1;
        let id = format!("l{}", s.next_id);
        let folder = VirtualFolder {
            name: name.to_string(),
            item_id: id.clone(),
        };
        s.libraries.push((folder, item_ids.iter().map(|i| i.to_string()).collect()));
        id
    }

    pub fn set_genres(&self, item_id: &str, genres: &[&str]) {
        let mut s = self.state.lock().unwrap();
        let name = s.items.iter().find(|i| i.id == item_id).map(|i| i.name.clone()).unwrap_or_default();
        let genre_items: Vec<Value> = genres
            .iter()
            .enumerate()
            .map(|(n, g)| json!({ "Name": g, "Id": n }))
            .collect();
        s.details.insert(
            item_id.to_string(),
            json!({ "Id": item_id, "Name": name, "Genres": genres, "GenreItems": genre_items }),
        );
    }

    pub fn item_genres(&self, item_id: &str) -> Vec<String> {
        let s = self.state.lock().unwrap();
        s.details
            .get(item_id)
            .and_then(|d| d["Genres"].as_array())
            .map(|g| g.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    pub fn fail_detail(&self, item_id: &str) {
        self.state.lock().unwrap().failing_details.insert(item_id.to_string());
    }

    /// The next `times` searches for exactly `term` fail as exhausted requests.
    pub fn fail_search(&self, term: &str, times: usize) {
        self.state.lock().unwrap().failing_searches.insert(term.to_string(), times);
    }

    pub fn set_image(&self, item_id: &str, image: ImageType, present: bool) {
        let mut s = self.state.lock().unwrap();
        if present {
            s.images.insert((item_id.to_string(), image));
        } else {
            s.images.remove(&(item_id.to_string(), image));
        }
    }

    pub fn fail_point_queries(&self, fail: bool) {
        self.state.lock().unwrap().fail_point_queries = fail;
    }

    pub fn fail_listings(&self, fail: bool) {
        self.state.lock().unwrap().fail_listings = fail;
    }

    pub fn fail_removals(&self, fail: bool) {
        self.state.lock().unwrap().fail_removals = fail;
    }

    pub fn reject_add(&self, item_id: &str) {
        self.state.lock().unwrap().reject_adds.insert(item_id.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    pub fn collection_by_name(&self, name: &str) -> Option<(String, Vec<String>)> {
        let s = self.state.lock().unwrap();
        s.collections.iter().find(|(c, _)| c.name == name).map(|(c, members)| {
            let names = members
                .iter()
                .filter_map(|id| s.items.iter().find(|i| &i.id == id).map(|i| i.name.clone()))
                .collect();
            (c.id.clone(), names)
        })
    }

    pub fn collection_count(&self) -> usize {
        self.state.lock().unwrap().collections.len()
    }

    pub fn point_calls(&self) -> usize {
        self.state.lock().unwrap().point_calls
    }

    pub fn listing_calls(&self) -> usize {
        self.state.lock().unwrap().listing_calls
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn add_calls(&self) -> usize {
        self.state.lock().unwrap().add_calls
    }

    pub fn remove_calls(&self) -> usize {
        self.state.lock().unwrap().remove_calls
    }

    pub fn uploads(&self) -> Vec<(String, ImageType, Vec<u8>)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn updates(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().updates.clone()
    }
}

/// Emby's search is a case-insensitive containment match.
fn search_hit(name: &str, term: &str) -> bool {
    name.to_lowercase().contains(&term.to_lowercase())
}

fn paginate(items: Vec<LibraryItem>, query: &ItemQuery) -> ItemPage {
    let total = items.len() as u32;
    let start = query.start_index.unwrap_or(0) as usize;
    let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
    ItemPage {
        items: items.into_iter().skip(start).take(limit).collect(),
        total_record_count: total,
    }
}

#[async_trait]
impl EmbyApi for FakeEmby {
    async fn server_info(&self) -> Result<ServerInfo, EmbyError> {
        if self.state.lock().unwrap().offline {
            return Err(transient("fake://System/Info"));
        }
        Ok(ServerInfo {
            server_name: "fake".to_string(),
            version: "4.8".to_string(),
            id: "srv".to_string(),
        })
    }

    async fn query_items(&self, query: &ItemQuery) -> Result<ItemPage, EmbyError> {
        let mut s = self.state.lock().unwrap();

        if let Some(parent_id) = &query.parent_id {
            if let Some((_, ids)) = s.libraries.iter().find(|(l, _)| &l.item_id == parent_id) {
                let items = ids
                    .iter()
                    .filter_map(|id| s.items.iter().find(|i| &i.id == id).cloned())
                    .filter(|i| query.include_types.is_empty() || query.include_types.contains(&i.kind))
                    .collect();
                return Ok(paginate(items, query));
            }
            let members = s
                .collections
                .iter()
                .find(|(c, _)| &c.id == parent_id)
                .map(|(_, m)| m.clone())
                .unwrap_or_default();
            let items = members
                .iter()
                .filter_map(|id| s.items.iter().find(|i| &i.id == id).cloned())
                .collect();
            return Ok(paginate(items, query));
        }

        match &query.search_term {
            Some(term) => {
                s.point_calls += 1;
                let scripted = match s.failing_searches.get_mut(term) {
                    Some(left) if *left > 0 => {
                        *left -= 1;
                        true
                    }
                    _ => false,
                };
                if s.fail_point_queries || scripted {
                    return Err(transient("fake://Items?SearchTerm"));
                }
            }
            None => {
                s.listing_calls += 1;
                if s.fail_listings {
                    return Err(transient("fake://Items?StartIndex"));
                }
            }
        }

        let candidates: Vec<LibraryItem> = if query.include_types.contains(&ItemType::BoxSet) {
            s.collections.iter().map(|(c, _)| c.clone()).collect()
        } else {
            s.items
                .iter()
                .filter(|i| query.include_types.contains(&i.kind))
                .cloned()
                .collect()
        };

        let items = candidates
            .into_iter()
            .filter(|i| query.search_term.as_deref().map_or(true, |t| search_hit(&i.name, t)))
            .filter(|i| {
                query.years.is_empty() || i.production_year.map_or(false, |y| query.years.contains(&y))
            })
            .collect();
        Ok(paginate(items, query))
    }

    async fn create_collection(&self, name: &str, seed_item_id: &str) -> Result<String, EmbyError> {
        let mut s = self.state.lock().unwrap();
        s.create_calls += 1;
        s.next_id += 1;
        let id = format!("c{}", s.next_id);
        s.collections.push((
            LibraryItem::new(id.clone(), name, ItemType::BoxSet, None),
            vec![seed_item_id.to_string()],
        ));
        Ok(id)
    }

    async fn add_to_collection(&self, collection_id: &str, item_ids: &[String]) -> Result<bool, EmbyError> {
        let mut s = self.state.lock().unwrap();
        s.add_calls += 1;
        if item_ids.iter().any(|id| s.reject_adds.contains(id)) {
            return Ok(false);
        }
        let Some((_, members)) = s.collections.iter_mut().find(|(c, _)| c.id == collection_id) else {
            return Ok(false);
        };
        for id in item_ids {
            if !members.contains(id) {
                members.push(id.clone());
            }
        }
        Ok(true)
    }

    async fn remove_from_collection(&self, collection_id: &str, item_ids: &[String]) -> Result<bool, EmbyError> {
        let mut s = self.state.lock().unwrap();
        s.remove_calls += 1;
        if s.fail_removals {
            return Ok(false);
        }
        if let Some((_, members)) = s.collections.iter_mut().find(|(c, _)| c.id == collection_id) {
            members.retain(|m| !item_ids.contains(m));
        }
        Ok(true)
    }

    async fn has_image(&self, item_id: &str, image: ImageType) -> Result<bool, EmbyError> {
        Ok(self.state.lock().unwrap().images.contains(&(item_id.to_string(), image)))
    }

    fn image_url(&self, item_id: &str, image: ImageType) -> String {
        format!("fake://Items/{}/Images/{}", item_id, image)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, EmbyError> {
        Ok(url.as_bytes().to_vec())
    }

    async fn upload_image(&self, item_id: &str, image: ImageType, bytes: &[u8]) -> Result<bool, EmbyError> {
        let mut s = self.state.lock().unwrap();
        s.uploads.push((item_id.to_string(), image, bytes.to_vec()));
        s.images.insert((item_id.to_string(), image));
        Ok(true)
    }

    async fn virtual_folders(&self) -> Result<Vec<VirtualFolder>, EmbyError> {
        let s = self.state.lock().unwrap();
        if s.offline {
            return Err(transient("fake://Library/VirtualFolders"));
        }
        Ok(s.libraries.iter().map(|(l, _)| l.clone()).collect())
    }

    async fn item_detail(&self, item_id: &str) -> Result<Value, EmbyError> {
        let s = self.state.lock().unwrap();
        if s.failing_details.contains(item_id) {
            return Err(transient(&format!("fake://Users/u/Items/{}", item_id)));
        }
        Ok(s.details.get(item_id).cloned().unwrap_or_else(|| json!({ "Id": item_id })))
    }

    async fn update_item(&self, item_id: &str, item: &Value) -> Result<bool, EmbyError> {
        let mut s = self.state.lock().unwrap();
        s.updates.push((item_id.to_string(), item.clone()));
        s.details.insert(item_id.to_string(), item.clone());
        Ok(true)
    }
}

/// Catalog source serving fixed catalogs by id; unknown ids are unavailable.
pub struct StaticSource {
    pub catalogs: HashMap<String, Catalog>,
}

#[async_trait]
impl CatalogSource for StaticSource {
    fn source_name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, source_id: &str) -> Result<Catalog, SourceError> {
        self.catalogs
            .get(source_id)
            .cloned()
            .ok_or_else(|| SourceError::unavailable(source_id, "HTTP 503"))
    }
}
