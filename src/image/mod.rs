//! Image access layer.
//!
//! [`PixelSource`] is the boundary to the external file-format loaders;
//! [`ImageCatalog`] resolves `fileload` filenames to open sources.

mod catalog;
mod source;

pub use catalog::{ImageCatalog, MemoryCatalog};
pub use source::{ArraySource, PixelSource};
