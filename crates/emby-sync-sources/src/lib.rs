pub mod bangumi;
pub mod douban;
pub mod emby;
pub mod error;
pub mod factory;
pub mod http;
pub mod normalize;
pub mod rss;
pub mod traits;

pub use emby::{
    EmbyApi, EmbyHttpClient, ImageType, ItemPage, ItemQuery, RetryPolicy, RetryableRequester, ServerInfo, VirtualFolder,
};
pub use error::{EmbyError, SourceError};
pub use factory::{ConfiguredSource, ImporterInfo, SourceFactory, SourceFactoryRegistry};
pub use normalize::AliasTable;
pub use traits::CatalogSource;
