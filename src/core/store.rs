//! Purpose: Define the store traits the fetcher and gallery client depend on.
//! Exports: `RecordStore`, `MediaStore`.
//! Role: Injection seam; any ordered document store with opaque continuation
//! markers satisfies `RecordStore`, any blob host returning URLs satisfies
//! `MediaStore`.
//! Invariants: `query` returns records in the collection's natural order,
//! starting strictly after `after` when one is given.

use crate::core::error::Error;
use crate::core::record::{Cursor, Page};
use serde_json::{Map, Value};

pub trait RecordStore {
    /// Fetch up to `page_size` records in collection order, starting
    /// strictly after `after` when set. Non-empty pages carry the cursor of
    /// their last record.
    fn query(&self, collection: &str, page_size: usize, after: Option<&Cursor>)
    -> Result<Page, Error>;

    /// Insert a record and return its store-assigned id.
    fn insert(&self, collection: &str, fields: Map<String, Value>) -> Result<String, Error>;

    /// Remove a record by id. Missing records surface as `NotFound`.
    fn remove(&self, collection: &str, id: &str) -> Result<(), Error>;
}

pub trait MediaStore {
    /// Upload a blob and return the URL it is retrievable at.
    fn upload(&self, bytes: &[u8], name: &str) -> Result<String, Error>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn query(
        &self,
        collection: &str,
        page_size: usize,
        after: Option<&Cursor>,
    ) -> Result<Page, Error> {
        (**self).query(collection, page_size, after)
    }

    fn insert(&self, collection: &str, fields: Map<String, Value>) -> Result<String, Error> {
        (**self).insert(collection, fields)
    }

    fn remove(&self, collection: &str, id: &str) -> Result<(), Error> {
        (**self).remove(collection, id)
    }
}

impl<S: MediaStore + ?Sized> MediaStore for &S {
    fn upload(&self, bytes: &[u8], name: &str) -> Result<String, Error> {
        (**self).upload(bytes, name)
    }
}
