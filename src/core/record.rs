//! Purpose: Define the record, cursor, and page value types shared by stores.
//! Exports: `Record`, `Cursor`, `Page`.
//! Role: Stable envelope between stores, the fetcher, and CLI JSON output.
//! Invariants: Record identity is the id; field contents are never validated here.
//! Invariants: Cursor tokens are opaque to everything except the issuing store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One document from a remote collection: a store-assigned id plus an
/// opaque field map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Opaque token marking the position of a record in its collection's order.
/// Only the store that issued a cursor can interpret it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

/// One bounded batch of records returned by a single query, with the
/// position marker of its last record when the batch is non-empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub records: Vec<Record>,
    pub cursor: Option<Cursor>,
}

impl Page {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            cursor: None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Cursor, Page, Record};
    use serde_json::json;

    fn record(id: &str, title: &str) -> Record {
        let mut fields = serde_json::Map::new();
        fields.insert("title".to_string(), json!(title));
        fields.insert("year".to_string(), json!(2021));
        Record::new(id, fields)
    }

    #[test]
    fn field_accessors() {
        let rec = record("r1", "Low Tide");
        assert_eq!(rec.field_str("title"), Some("Low Tide"));
        assert_eq!(rec.field("year"), Some(&json!(2021)));
        assert_eq!(rec.field_str("year"), None);
        assert_eq!(rec.field("missing"), None);
    }

    #[test]
    fn record_round_trips_as_json() {
        let rec = record("r2", "Harbor");
        let text = serde_json::to_string(&rec).expect("encode");
        let back: Record = serde_json::from_str(&text).expect("decode");
        assert_eq!(back, rec);
    }

    #[test]
    fn cursor_serializes_as_bare_token() {
        let cursor = Cursor::new("seq:42");
        let text = serde_json::to_string(&cursor).expect("encode");
        assert_eq!(text, "\"seq:42\"");
    }

    #[test]
    fn empty_page_has_no_cursor() {
        let page = Page::empty();
        assert!(page.is_empty());
        assert_eq!(page.len(), 0);
        assert!(page.cursor.is_none());
    }
}
