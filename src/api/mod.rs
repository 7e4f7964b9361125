//! Purpose: Define the stable public API boundary for Galerie.
//! Exports: Store implementations, gallery operations, fetcher types, errors.
//! Role: Public, additive-only surface; internal modules stay private.
//! Invariants: This module is the only public path to store implementations.

mod cache;
mod gallery;
mod memory;
mod remote;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::fetch::{FetchState, FetchTicket, PagedFetcher};
pub use crate::core::record::{Cursor, Page, Record};
pub use crate::core::store::{MediaStore, RecordStore};
pub use cache::PageCache;
pub use gallery::{
    ExhibitionKind, ExhibitionsByKind, GalleryClient, MediaUpload, NewProject, NewWork,
    collections,
};
pub use memory::MemoryStore;
pub use remote::HttpStore;
