//! Purpose: Best-effort on-disk cache of the most recent first page.
//! Exports: `PageCache`.
//! Role: Avoids an empty initial render; never authoritative.
//! Invariants: Every IO or parse failure degrades to a cache miss.
//! Invariants: Any successful write to a collection invalidates its entry.

use crate::core::record::Record;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Clone, Debug)]
pub struct PageCache {
    dir: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    stored_at: String,
    records: Vec<Record>,
}

pub(crate) fn default_cache_dir() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".galerie").join("cache")
}

impl PageCache {
    pub fn new() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Most recently stored first page for a collection, or `None` on any
    /// kind of miss.
    pub fn load(&self, collection: &str) -> Option<Vec<Record>> {
        let path = self.entry_path(collection)?;
        let body = match std::fs::read_to_string(&path) {
            Ok(body) => body,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(collection, error = %err, "cache read failed");
                }
                return None;
            }
        };
        match serde_json::from_str::<CacheEntry>(&body) {
            Ok(entry) => Some(entry.records),
            Err(err) => {
                tracing::debug!(collection, error = %err, "cache entry unreadable");
                None
            }
        }
    }

    /// Remember a first page. Failures are logged and swallowed.
    pub fn store(&self, collection: &str, records: &[Record]) {
        let Some(path) = self.entry_path(collection) else {
            return;
        };
        let entry = CacheEntry {
            stored_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            records: records.to_vec(),
        };
        let body = match serde_json::to_string(&entry) {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!(collection, error = %err, "cache encode failed");
                return;
            }
        };
        if let Err(err) = std::fs::create_dir_all(&self.dir) {
            tracing::debug!(collection, error = %err, "cache dir unavailable");
            return;
        }
        if let Err(err) = std::fs::write(&path, body) {
            tracing::debug!(collection, error = %err, "cache write failed");
        }
    }

    /// Drop the entry for a collection, if present.
    pub fn invalidate(&self, collection: &str) {
        let Some(path) = self.entry_path(collection) else {
            return;
        };
        if let Err(err) = std::fs::remove_file(&path)
            && err.kind() != std::io::ErrorKind::NotFound
        {
            tracing::debug!(collection, error = %err, "cache invalidation failed");
        }
    }

    // Collection names with path separators are simply uncacheable.
    fn entry_path(&self, collection: &str) -> Option<PathBuf> {
        if collection.is_empty() || collection.contains('/') || collection.contains('\\') {
            return None;
        }
        Some(self.dir.join(format!("{collection}.json")))
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new()
    }
}
