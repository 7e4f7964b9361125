//! Purpose: In-process store implementing the record and media traits.
//! Exports: `MemoryStore`.
//! Role: Substitute store for tests and offline workflows; the local
//! counterpart of `HttpStore`.
//! Invariants: Records keep insertion order; cursors are sequence tokens
//! and only this store interprets them.

use crate::core::error::{Error, ErrorKind};
use crate::core::record::{Cursor, Page, Record};
use crate::core::store::{MediaStore, RecordStore};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<String, Vec<Stored>>,
    media: HashMap<String, Vec<u8>>,
    next_seq: u64,
    next_id: u64,
}

#[derive(Debug)]
struct Stored {
    seq: u64,
    record: Record,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held in a collection.
    pub fn len(&self, collection: &str) -> usize {
        let inner = self.inner.lock().expect("store lock");
        inner
            .collections
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Bytes previously uploaded under `name`, if any.
    pub fn media(&self, name: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock().expect("store lock");
        inner.media.get(name).cloned()
    }
}

impl RecordStore for MemoryStore {
    fn query(
        &self,
        collection: &str,
        page_size: usize,
        after: Option<&Cursor>,
    ) -> Result<Page, Error> {
        let after_seq = match after {
            Some(cursor) => Some(parse_seq_token(cursor).map_err(|err| {
                err.with_collection(collection)
            })?),
            None => None,
        };

        let inner = self.inner.lock().expect("store lock");
        let Some(stored) = inner.collections.get(collection) else {
            return Ok(Page::empty());
        };

        let mut records = Vec::new();
        let mut last_seq = None;
        for entry in stored {
            if let Some(after_seq) = after_seq
                && entry.seq <= after_seq
            {
                continue;
            }
            if records.len() == page_size {
                break;
            }
            records.push(entry.record.clone());
            last_seq = Some(entry.seq);
        }

        Ok(Page {
            records,
            cursor: last_seq.map(|seq| Cursor::new(format!("seq:{seq}"))),
        })
    }

    fn insert(&self, collection: &str, fields: Map<String, Value>) -> Result<String, Error> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.next_seq += 1;
        inner.next_id += 1;
        let seq = inner.next_seq;
        let id = format!("rec-{:06}", inner.next_id);
        let record = Record::new(id.clone(), fields);
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(Stored { seq, record });
        Ok(id)
    }

    fn remove(&self, collection: &str, id: &str) -> Result<(), Error> {
        let mut inner = self.inner.lock().expect("store lock");
        let Some(stored) = inner.collections.get_mut(collection) else {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message("no such record")
                .with_collection(collection)
                .with_record_id(id));
        };
        let before = stored.len();
        stored.retain(|entry| entry.record.id != id);
        if stored.len() == before {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message("no such record")
                .with_collection(collection)
                .with_record_id(id));
        }
        Ok(())
    }
}

impl MediaStore for MemoryStore {
    fn upload(&self, bytes: &[u8], name: &str) -> Result<String, Error> {
        if name.is_empty() {
            return Err(Error::new(ErrorKind::UploadFailed).with_message("media name is empty"));
        }
        let mut inner = self.inner.lock().expect("store lock");
        inner.media.insert(name.to_string(), bytes.to_vec());
        Ok(format!("memory://media/{name}"))
    }
}

fn parse_seq_token(cursor: &Cursor) -> Result<u64, Error> {
    let token = cursor.token();
    token
        .strip_prefix("seq:")
        .and_then(|rest| rest.parse().ok())
        .ok_or_else(|| {
            Error::new(ErrorKind::InvalidArgument).with_message("unrecognized cursor token")
        })
}
