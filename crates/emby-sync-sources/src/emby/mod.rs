//! Emby server access: the API seam, its HTTP implementation and the retry layer.

pub mod api;
pub mod client;
pub mod requester;

pub use api::{EmbyApi, ImageType, ItemPage, ItemQuery, ServerInfo, VirtualFolder};
pub use client::EmbyHttpClient;
pub use requester::{RequestBody, RetryPolicy, RetryableRequester};
