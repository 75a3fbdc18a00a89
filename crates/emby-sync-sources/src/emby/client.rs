use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use emby_sync_config::ServerConfig;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::api::{EmbyApi, ImageType, ItemPage, ItemQuery, ServerInfo, VirtualFolder};
use super::requester::{RequestBody, RetryPolicy, RetryableRequester};
use crate::EmbyError;

#[derive(Debug, Deserialize)]
struct CreatedCollection {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct ImageInfo {
    #[serde(rename = "ImageType", default)]
    image_type: String,
}

pub struct EmbyHttpClient {
    requester: RetryableRequester,
    base_url: String,
    user_id: Option<String>,
}

impl EmbyHttpClient {
    pub fn new(server: &ServerConfig) -> Result<Self> {
        Self::with_policy(server, RetryPolicy::default())
    }

    pub fn with_policy(server: &ServerConfig, policy: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::ACCEPT,
                    reqwest::header::HeaderValue::from_static("application/json"),
                );
                headers.insert(
                    reqwest::header::HeaderName::from_static("x-emby-token"),
                    reqwest::header::HeaderValue::from_str(&server.api_key).context("Invalid api key format")?,
                );
                headers
            })
            .user_agent(crate::http::USER_AGENT)
            .timeout(Duration::from_secs(server.timeout_secs))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            requester: RetryableRequester::new(client, policy),
            base_url: server.url.trim_end_matches('/').to_string(),
            user_id: server.user_id.clone().filter(|u| !u.is_empty()),
        })
    }

    /// Full `/Items` URL for `query`, user-scoped when hiding played items.
    pub fn items_url(&self, query: &ItemQuery) -> String {
        let mut path = format!("{}/emby/", self.base_url);
        let user_scoped = match (&self.user_id, query.unplayed_only) {
            (Some(user_id), true) => {
                path.push_str(&format!("Users/{}/", user_id));
                true
            }
            _ => false,
        };
        path.push_str("Items");

        let mut params: Vec<String> = vec![format!("Recursive={}", query.recursive)];
        let types: Vec<&str> = query.include_types.iter().map(|t| t.as_query()).filter(|t| !t.is_empty()).collect();
        if !types.is_empty() {
            params.push(format!("IncludeItemTypes={}", types.join(",")));
        }
        if let Some(term) = &query.search_term {
            params.push(format!("SearchTerm={}", urlencoding::encode(term)));
        }
        if !query.years.is_empty() {
            let years: Vec<String> = query.years.iter().map(u32::to_string).collect();
            params.push(format!("Years={}", years.join(",")));
        }
        if let Some(parent_id) = &query.parent_id {
            params.push(format!("ParentId={}", urlencoding::encode(parent_id)));
        }
        if let Some(start) = query.start_index {
            params.push(format!("StartIndex={}", start));
        }
        if let Some(limit) = query.limit {
            params.push(format!("Limit={}", limit));
        }
        if user_scoped {
            params.push("Filters=IsUnplayed".to_string());
        }
        params.push("Fields=ProductionYear".to_string());

        format!("{}?{}", path, params.join("&"))
    }

    /// Item details are only served user-scoped.
    fn item_detail_url(&self, item_id: &str) -> Result<String, EmbyError> {
        let user_id = self
            .user_id
            .as_deref()
            .ok_or_else(|| EmbyError::InvalidRequest("item details need server.user_id".to_string()))?;
        Ok(format!("{}/emby/Users/{}/Items/{}", self.base_url, user_id, item_id))
    }

    fn collection_items_url(&self, collection_id: &str, item_ids: &[String], delete: bool) -> String {
        let suffix = if delete { "Items/Delete" } else { "Items" };
        format!(
            "{}/emby/Collections/{}/{}?Ids={}",
            self.base_url,
            collection_id,
            suffix,
            urlencoding::encode(&item_ids.join(","))
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, EmbyError> {
        let response = self.requester.execute(Method::GET, url, None).await?;
        response.json::<T>().await.map_err(|e| EmbyError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl EmbyApi for EmbyHttpClient {
    async fn server_info(&self) -> Result<ServerInfo, EmbyError> {
        let url = format!("{}/emby/System/Info", self.base_url);
        self.get_json(&url).await
    }

    async fn query_items(&self, query: &ItemQuery) -> Result<ItemPage, EmbyError> {
        let url = self.items_url(query);
        let page: ItemPage = self.get_json(&url).await?;
        debug!(url = %url, returned = page.items.len(), total = page.total_record_count, "Items query");
        Ok(page)
    }

    async fn create_collection(&self, name: &str, seed_item_id: &str) -> Result<String, EmbyError> {
        let url = format!(
            "{}/emby/Collections?IsLocked=false&Name={}&Ids={}",
            self.base_url,
            urlencoding::encode(name),
            urlencoding::encode(seed_item_id)
        );
        let response = self.requester.execute(Method::POST, &url, None).await?;
        let created: CreatedCollection = response.json().await.map_err(|e| EmbyError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;
        Ok(created.id)
    }

    async fn add_to_collection(&self, collection_id: &str, item_ids: &[String]) -> Result<bool, EmbyError> {
        if item_ids.is_empty() {
            return Err(EmbyError::InvalidRequest("no items to add".to_string()));
        }
        let url = self.collection_items_url(collection_id, item_ids, false);
        let response = self.requester.execute(Method::POST, &url, None).await?;
        Ok(response.status() == StatusCode::NO_CONTENT)
    }

    async fn remove_from_collection(&self, collection_id: &str, item_ids: &[String]) -> Result<bool, EmbyError> {
        if item_ids.is_empty() {
            return Ok(true);
        }
        let url = self.collection_items_url(collection_id, item_ids, true);
        let response = self.requester.execute(Method::POST, &url, None).await?;
        Ok(response.status().is_success())
    }

    async fn has_image(&self, item_id: &str, image: ImageType) -> Result<bool, EmbyError> {
        let url = format!("{}/emby/Items/{}/Images", self.base_url, item_id);
        let images: Vec<ImageInfo> = self.get_json(&url).await?;
        Ok(images.iter().any(|i| i.image_type.eq_ignore_ascii_case(image.as_str())))
    }

    fn image_url(&self, item_id: &str, image: ImageType) -> String {
        format!("{}/emby/Items/{}/Images/{}", self.base_url, item_id, image)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, EmbyError> {
        let response = self.requester.execute(Method::GET, url, None).await?;
        let bytes = response.bytes().await.map_err(|e| EmbyError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    /// Emby expects the image base64 encoded in the request body.
    async fn upload_image(&self, item_id: &str, image: ImageType, bytes: &[u8]) -> Result<bool, EmbyError> {
        let url = self.image_url(item_id, image);
        let body = RequestBody::Raw {
            content_type: "image/jpeg",
            bytes: STANDARD.encode(bytes).into_bytes(),
        };
        let response = self.requester.execute(Method::POST, &url, Some(&body)).await?;
        Ok(response.status().is_success())
    }

    async fn virtual_folders(&self) -> Result<Vec<VirtualFolder>, EmbyError> {
        let url = format!("{}/emby/Library/VirtualFolders", self.base_url);
        self.get_json(&url).await
    }

    async fn item_detail(&self, item_id: &str) -> Result<serde_json::Value, EmbyError> {
        let url = self.item_detail_url(item_id)?;
        self.get_json(&url).await
    }

    async fn update_item(&self, item_id: &str, item: &serde_json::Value) -> Result<bool, EmbyError> {
        let url = format!("{}/emby/Items/{}?reqformat=json", self.base_url, item_id);
        let body = RequestBody::Json(item.clone());
        let response = self.requester.execute(Method::POST, &url, Some(&body)).await?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emby_sync_models::ItemType;

    fn client(user_id: Option<&str>) -> EmbyHttpClient {
        let server = ServerConfig {
            url: "http://emby.local:8096/".to_string(),
            api_key: "key".to_string(),
            user_id: user_id.map(str::to_string),
            ignore_played: user_id.is_some(),
            timeout_secs: 30,
        };
        EmbyHttpClient::new(&server).unwrap()
    }

    #[test]
    fn test_search_url() {
        let query = ItemQuery::search(ItemType::Movie, "寄生虫 & co").with_years(vec![2019]);
        assert_eq!(
            client(None).items_url(&query),
            "http://emby.local:8096/emby/Items?Recursive=true&IncludeItemTypes=Movie\
             &SearchTerm=%E5%AF%84%E7%94%9F%E8%99%AB%20%26%20co&Years=2019&Fields=ProductionYear"
        );
    }

    #[test]
    fn test_unplayed_search_is_user_scoped() {
        let query = ItemQuery::search(ItemType::Series, "x").unplayed(true);
        let url = client(Some("u1")).items_url(&query);
        assert!(url.starts_with("http://emby.local:8096/emby/Users/u1/Items?"));
        assert!(url.contains("Filters=IsUnplayed"));

        // Without a user the filter cannot apply.
        let url = client(None).items_url(&query);
        assert!(url.starts_with("http://emby.local:8096/emby/Items?"));
        assert!(!url.contains("Filters"));
    }

    #[test]
    fn test_children_and_listing_urls() {
        let c = client(None);
        assert_eq!(
            c.items_url(&ItemQuery::children("99", 999)),
            "http://emby.local:8096/emby/Items?Recursive=false&ParentId=99&Limit=999&Fields=ProductionYear"
        );
        let url = c.items_url(&ItemQuery::listing(ItemType::BoxSet, 1000, 1000));
        assert!(url.contains("IncludeItemTypes=BoxSet&StartIndex=1000&Limit=1000"));
    }

    #[test]
    fn test_collection_urls() {
        let c = client(None);
        let ids = vec!["1".to_string(), "2".to_string()];
        assert_eq!(
            c.collection_items_url("7", &ids, true),
            "http://emby.local:8096/emby/Collections/7/Items/Delete?Ids=1%2C2"
        );
        assert_eq!(c.image_url("7", ImageType::Primary), "http://emby.local:8096/emby/Items/7/Images/Primary");
    }

    #[test]
    fn test_library_and_detail_urls() {
        let url = client(None).items_url(&ItemQuery::library("lib1", &[ItemType::Movie, ItemType::Series], 0, 1000));
        assert_eq!(
            url,
            "http://emby.local:8096/emby/Items?Recursive=true&IncludeItemTypes=Movie,Series\
             &ParentId=lib1&StartIndex=0&Limit=1000&Fields=ProductionYear"
        );

        assert_eq!(
            client(Some("u1")).item_detail_url("42").unwrap(),
            "http://emby.local:8096/emby/Users/u1/Items/42"
        );
        assert!(matches!(client(None).item_detail_url("42"), Err(EmbyError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_update_item_posts_json_document() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // Read until the JSON body has arrived.
            while !request.ends_with(b"}") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            String::from_utf8(request).unwrap()
        });

        let server_config = ServerConfig {
            url: format!("http://{}", addr),
            api_key: "key".to_string(),
            user_id: None,
            ignore_played: false,
            timeout_secs: 5,
        };
        let item = serde_json::json!({ "Id": "42", "Genres": ["剧情"] });
        let updated = EmbyHttpClient::new(&server_config)
            .unwrap()
            .update_item("42", &item)
            .await
            .unwrap();

        assert!(updated);
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /emby/Items/42?reqformat=json HTTP/1.1"));
        assert!(request.to_lowercase().contains("content-type: application/json"));
        assert!(request.contains(r#""Genres":["剧情"]"#));
    }
}
