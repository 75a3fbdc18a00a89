//! Fills in collection artwork that Emby left blank.
//!
//! Each collection lacking an image borrows it from its first member that has
//! one. Passes repeat until every collection is covered or a pass changes nothing.

use emby_sync_models::{ItemType, LibraryItem};
use emby_sync_sources::{EmbyError, ImageType};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cancel::CancelFlag;
use crate::library_index::LibraryIndex;

/// Image types filled, in order.
pub const COVER_IMAGE_TYPES: [ImageType; 2] = [ImageType::Primary, ImageType::Backdrop];
const MAX_PASSES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillOutcome {
    Filled,
    NoChildren,
    /// No member has an image of the requested type.
    NoSourceImage,
    Failed,
}

#[derive(Debug, Clone)]
pub enum CoverEvent<'a> {
    PassStarted { image: ImageType, pass: usize, missing: usize },
    Collection { image: ImageType, collection: &'a LibraryItem, outcome: FillOutcome },
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverPass {
    pub image: ImageType,
    pub pass: usize,
    pub missing: usize,
    pub filled: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CoverSummary {
    pub passes: Vec<CoverPass>,
    /// Collections still lacking an image after the last pass, per image type.
    pub remaining: Vec<(ImageType, Vec<String>)>,
    pub cancelled: bool,
}

impl CoverSummary {
    pub fn filled(&self) -> usize {
        self.passes.iter().map(|p| p.filled).sum()
    }
}

pub struct CoverFiller {
    index: Arc<LibraryIndex>,
    cancel: CancelFlag,
}

impl CoverFiller {
    pub fn new(index: Arc<LibraryIndex>, cancel: CancelFlag) -> Self {
        Self { index, cancel }
    }

    /// Collections without an image of type `image`.
    ///
    /// A collection whose image state cannot be read is left out of this pass.
    pub async fn collections_missing(&self, image: ImageType) -> Result<Vec<LibraryItem>, EmbyError> {
        let collections = self.index.fetch_all_of_kind(ItemType::BoxSet).await?;
        let mut missing = Vec::new();
        for collection in collections.iter() {
            match self.index.has_image(&collection.id, image).await {
                Ok(true) => {}
                Ok(false) => missing.push(collection.clone()),
                Err(e) => warn!(collection = %collection.name, image = %image, error = %e, "Could not read collection images"),
            }
        }
        debug!(image = %image, total = collections.len(), missing = missing.len(), "Scanned collection images");
        Ok(missing)
    }

    /// Copies the first member image of type `image` onto `collection`.
    pub async fn fill_one(&self, collection: &LibraryItem, image: ImageType) -> FillOutcome {
        let children = match self.index.collection_children(&collection.id).await {
            Ok(children) => children,
            Err(e) => {
                warn!(collection = %collection.name, error = %e, "Failed to list collection members");
                return FillOutcome::Failed;
            }
        };
        if children.is_empty() {
            return FillOutcome::NoChildren;
        }

        for child in &children {
            match self.index.has_image(&child.id, image).await {
                Ok(true) => {
                    let url = self.index.image_url(&child.id, image);
                    return if self.index.set_collection_image(&collection.id, image, &url).await {
                        debug!(collection = %collection.name, from = %child.name, image = %image, "Collection image copied");
                        FillOutcome::Filled
                    } else {
                        FillOutcome::Failed
                    };
                }
                Ok(false) => {}
                Err(e) => debug!(item = %child.name, error = %e, "Skipping member with unreadable images"),
            }
        }
        FillOutcome::NoSourceImage
    }

    pub async fn fill_all<F>(&self, mut on_event: F) -> Result<CoverSummary, EmbyError>
    where
        F: FnMut(CoverEvent<'_>),
    {
        let mut summary = CoverSummary::default();

        'images: for image in COVER_IMAGE_TYPES {
            let mut remaining = Vec::new();
            for pass in 1..=MAX_PASSES {
                let missing = self.collections_missing(image).await?;
                remaining = missing.iter().map(|c| c.name.clone()).collect();
                if missing.is_empty() {
                    break;
                }

                info!(image = %image, pass, missing = missing.len(), "Filling collection images");
                on_event(CoverEvent::PassStarted {
                    image,
                    pass,
                    missing: missing.len(),
                });

                let mut filled = 0;
                for collection in &missing {
                    if self.cancel.is_cancelled() {
                        summary.cancelled = true;
                        summary.passes.push(CoverPass {
                            image,
                            pass,
                            missing: missing.len(),
                            filled,
                        });
                        summary.remaining.push((image, remaining));
                        break 'images;
                    }
                    let outcome = self.fill_one(collection, image).await;
                    if outcome == FillOutcome::Filled {
                        filled += 1;
                    }
                    on_event(CoverEvent::Collection {
                        image,
                        collection,
                        outcome,
                    });
                }

                summary.passes.push(CoverPass {
                    image,
                    pass,
                    missing: missing.len(),
                    filled,
                });
                if filled == 0 {
                    break;
                }
                if filled == missing.len() {
                    remaining.clear();
                    break;
                }
            }
            if !remaining.is_empty() {
                warn!(image = %image, remaining = remaining.len(), "Some collections still lack an image");
            }
            summary.remaining.push((image, remaining));
        }

        info!(filled = summary.filled(), passes = summary.passes.len(), "Cover completion finished");
        Ok(summary)
    }
}
