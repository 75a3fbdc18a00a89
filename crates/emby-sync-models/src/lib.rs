pub mod catalog;
pub mod collection;
pub mod media;
pub mod missing;

pub use catalog::{Catalog, CatalogEntry};
pub use collection::Collection;
pub use media::{ItemType, LibraryItem, MediaKind};
pub use missing::{MissReason, MissingRecord};
