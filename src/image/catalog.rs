//! Image catalog: filename to pixel source resolution.
//!
//! The `fileload` message names an image; the catalog opens it. Real
//! deployments plug format loaders in here; the built-in catalog serves
//! pre-registered in-memory images.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::source::PixelSource;
use crate::error::SourceError;

/// Opens images by filename.
#[async_trait]
pub trait ImageCatalog: Send + Sync {
    /// Resolve a filename to an open pixel source.
    async fn open(&self, filename: &str) -> Result<Arc<dyn PixelSource>, SourceError>;
}

/// Catalog of pre-registered in-memory images.
#[derive(Default)]
pub struct MemoryCatalog {
    images: HashMap<String, Arc<dyn PixelSource>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image under a filename.
    pub fn insert(&mut self, filename: impl Into<String>, source: Arc<dyn PixelSource>) {
        self.images.insert(filename.into(), source);
    }
}

#[async_trait]
impl ImageCatalog for MemoryCatalog {
    async fn open(&self, filename: &str) -> Result<Arc<dyn PixelSource>, SourceError> {
        self.images
            .get(filename)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(filename.to_string()))
    }
}
