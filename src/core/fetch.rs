//! Purpose: Cursor-paginated collection fetching with explicit client state.
//! Exports: `FetchState`, `FetchTicket`, `PagedFetcher`.
//! Role: The one pagination implementation every list surface reuses.
//! Invariants: `items` is append-only across successful fetches; a failed
//! fetch never touches `items`, `cursor`, or `exhausted`.
//! Invariants: At most one fetch is logically in flight per fetcher; the
//! `loading` flag is the concurrency control.
//! Invariants: A response issued before the most recent `reset` is discarded.
//! Invariants: Records are never deduplicated by id; if the remote order
//! shifts between pages, duplicates or gaps pass through uncorrected.

use crate::core::error::{Error, ErrorKind};
use crate::core::record::{Cursor, Page, Record};
use crate::core::store::RecordStore;

/// Aggregate client-visible state of one observed collection.
///
/// Transitions are plain methods on the value so an adapter can wire them to
/// whatever reactivity mechanism its environment provides; `PagedFetcher`
/// below is the default driver.
#[derive(Debug, Default)]
pub struct FetchState {
    items: Vec<Record>,
    cursor: Option<Cursor>,
    exhausted: bool,
    loading: bool,
    last_error: Option<Error>,
}

impl FetchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Record] {
        &self.items
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Take ownership of the recorded failure, leaving the state clean.
    /// Callers that treat a failed page as fatal use this to propagate it.
    pub fn take_last_error(&mut self) -> Option<Error> {
        self.last_error.take()
    }

    /// Apply a successful page fetched with `page_size`.
    ///
    /// Appends in arrival order, advances the cursor when the page is
    /// non-empty, and marks exhaustion when the store returned fewer records
    /// than requested. A full final page is deliberately not treated as
    /// exhaustion; the following empty fetch is.
    pub fn apply_success(&mut self, page: Page, page_size: usize) {
        let returned = page.records.len();
        if returned > 0 {
            match page.cursor {
                Some(cursor) => self.cursor = Some(cursor),
                // Store broke its contract; keep paginating from the old
                // position rather than dropping the records.
                None => tracing::warn!(returned, "non-empty page carried no cursor"),
            }
        }
        self.items.extend(page.records);
        if returned < page_size {
            self.exhausted = true;
        }
        self.last_error = None;
        self.loading = false;
        tracing::debug!(
            returned,
            total = self.items.len(),
            exhausted = self.exhausted,
            "page applied"
        );
    }

    /// Apply a failed fetch: only `last_error` and `loading` change.
    pub fn apply_failure(&mut self, err: Error) {
        tracing::debug!(error = %err, "fetch failed");
        self.last_error = Some(err);
        self.loading = false;
    }

    /// Clear accumulated items, cursor, exhaustion, and the last error.
    /// `loading` is left alone: an in-flight fetch keeps its slot until its
    /// response arrives (and is then discarded by the epoch check).
    pub fn apply_reset(&mut self) {
        self.items.clear();
        self.cursor = None;
        self.exhausted = false;
        self.last_error = None;
    }
}

/// Receipt for a fetch begun via [`PagedFetcher::begin`]. Carries the epoch
/// the request was issued under so a later `reset` can supersede it.
#[derive(Clone, Debug)]
pub struct FetchTicket {
    epoch: u64,
    page_size: usize,
    after: Option<Cursor>,
}

impl FetchTicket {
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn after(&self) -> Option<&Cursor> {
        self.after.as_ref()
    }
}

/// Fetches successive pages of one ordered remote collection.
///
/// The store is an explicit dependency so tests and offline tools can
/// substitute their own. `fetch_next` is the synchronous convenience; the
/// `begin`/`complete` pair is the same protocol split for callers that hold
/// a fetch logically in flight across an event loop turn.
#[derive(Debug)]
pub struct PagedFetcher<S> {
    store: S,
    collection: String,
    state: FetchState,
    epoch: u64,
}

impl<S: RecordStore> PagedFetcher<S> {
    pub fn new(store: S, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            state: FetchState::new(),
            epoch: 0,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn take_last_error(&mut self) -> Option<Error> {
        self.state.take_last_error()
    }

    /// Start a fetch. Returns `Ok(None)` without touching anything when a
    /// fetch is already in flight or the collection is exhausted; rejects a
    /// zero page size before any query is issued.
    pub fn begin(&mut self, page_size: usize) -> Result<Option<FetchTicket>, Error> {
        if page_size == 0 {
            return Err(Error::new(ErrorKind::InvalidArgument)
                .with_message("page size must be at least 1")
                .with_collection(self.collection.clone()));
        }
        if self.state.loading || self.state.exhausted {
            tracing::debug!(
                collection = %self.collection,
                loading = self.state.loading,
                exhausted = self.state.exhausted,
                "fetch request ignored"
            );
            return Ok(None);
        }
        self.state.loading = true;
        Ok(Some(FetchTicket {
            epoch: self.epoch,
            page_size,
            after: self.state.cursor.clone(),
        }))
    }

    /// Deliver the response for a ticket. Responses issued before the most
    /// recent `reset` release the in-flight slot but mutate nothing else;
    /// a completion with no fetch in flight was already redeemed and is
    /// dropped outright.
    pub fn complete(&mut self, ticket: FetchTicket, result: Result<Page, Error>) {
        if !self.state.loading {
            tracing::debug!(
                collection = %self.collection,
                "dropping completion with no fetch in flight"
            );
            return;
        }
        if ticket.epoch != self.epoch {
            tracing::debug!(collection = %self.collection, "discarding superseded page response");
            self.state.loading = false;
            return;
        }
        match result {
            Ok(page) => self.state.apply_success(page, ticket.page_size),
            Err(err) => self.state.apply_failure(err),
        }
    }

    /// Fetch the next page and fold it into the state. Store failures are
    /// recorded in `last_error`, never returned; the only `Err` here is a
    /// rejected page size.
    pub fn fetch_next(&mut self, page_size: usize) -> Result<&FetchState, Error> {
        let Some(ticket) = self.begin(page_size)? else {
            return Ok(&self.state);
        };
        let result = self
            .store
            .query(&self.collection, ticket.page_size, ticket.after.as_ref());
        self.complete(ticket, result);
        Ok(&self.state)
    }

    /// Forget everything fetched so far and start over from the head of the
    /// collection. An in-flight fetch keeps running; its response loses.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.state.apply_reset();
    }
}

#[cfg(test)]
mod tests {
    use super::{FetchState, PagedFetcher};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::record::{Cursor, Page, Record};
    use crate::core::store::RecordStore;
    use serde_json::{Map, Value, json};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Store that serves a scripted sequence of responses and counts queries.
    struct ScriptStore {
        responses: RefCell<VecDeque<Result<Page, Error>>>,
        queries: RefCell<usize>,
    }

    impl ScriptStore {
        fn new(responses: Vec<Result<Page, Error>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                queries: RefCell::new(0),
            }
        }

        fn query_count(&self) -> usize {
            *self.queries.borrow()
        }
    }

    impl RecordStore for ScriptStore {
        fn query(
            &self,
            _collection: &str,
            _page_size: usize,
            _after: Option<&Cursor>,
        ) -> Result<Page, Error> {
            *self.queries.borrow_mut() += 1;
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(Page::empty()))
        }

        fn insert(&self, _collection: &str, _fields: Map<String, Value>) -> Result<String, Error> {
            unreachable!("not used by fetcher tests")
        }

        fn remove(&self, _collection: &str, _id: &str) -> Result<(), Error> {
            unreachable!("not used by fetcher tests")
        }
    }

    fn record(id: &str) -> Record {
        let mut fields = Map::new();
        fields.insert("title".to_string(), json!(id));
        Record::new(id, fields)
    }

    fn page(ids: &[&str]) -> Page {
        Page {
            records: ids.iter().map(|id| record(id)).collect(),
            cursor: ids.last().map(|id| Cursor::new(*id)),
        }
    }

    fn ids(state: &FetchState) -> Vec<&str> {
        state.items().iter().map(|rec| rec.id.as_str()).collect()
    }

    #[test]
    fn three_records_page_size_two() {
        // Collection [A, B, C]: the full first page must not mark
        // exhaustion, the short second page must.
        let store = ScriptStore::new(vec![Ok(page(&["A", "B"])), Ok(page(&["C"]))]);
        let mut fetcher = PagedFetcher::new(&store, "exhibitions");

        let state = fetcher.fetch_next(2).expect("fetch");
        assert_eq!(ids(state), ["A", "B"]);
        assert_eq!(state.cursor().map(Cursor::token), Some("B"));
        assert!(!state.exhausted());

        let state = fetcher.fetch_next(2).expect("fetch");
        assert_eq!(ids(state), ["A", "B", "C"]);
        assert_eq!(state.cursor().map(Cursor::token), Some("C"));
        assert!(state.exhausted());

        // Third call is a no-op that never reaches the store.
        let state = fetcher.fetch_next(2).expect("fetch");
        assert_eq!(ids(state), ["A", "B", "C"]);
        assert_eq!(store.query_count(), 2);
    }

    #[test]
    fn items_grow_by_prefix_extension() {
        let store = ScriptStore::new(vec![
            Ok(page(&["A", "B"])),
            Ok(page(&["C", "D"])),
            Ok(page(&["E"])),
        ]);
        let mut fetcher = PagedFetcher::new(&store, "exhibitions");

        let mut previous: Vec<String> = Vec::new();
        for _ in 0..3 {
            let state = fetcher.fetch_next(2).expect("fetch");
            let current: Vec<String> =
                state.items().iter().map(|rec| rec.id.clone()).collect();
            assert!(current.len() >= previous.len());
            assert_eq!(&current[..previous.len()], previous.as_slice());
            previous = current;
        }
        assert_eq!(previous, ["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn begin_while_loading_is_a_no_op() {
        let store = ScriptStore::new(vec![Ok(page(&["A"]))]);
        let mut fetcher = PagedFetcher::new(&store, "exhibitions");

        let ticket = fetcher.begin(2).expect("begin").expect("ticket");
        assert!(fetcher.state().loading());

        // Re-entrant call while in flight: no ticket, no query, no change.
        assert!(fetcher.begin(2).expect("begin").is_none());
        assert!(fetcher.state().items().is_empty());
        assert_eq!(store.query_count(), 0);

        let result = store.query("exhibitions", ticket.page_size(), ticket.after());
        fetcher.complete(ticket, result);
        assert_eq!(ids(fetcher.state()), ["A"]);
        assert!(!fetcher.state().loading());
    }

    #[test]
    fn exhaustion_persists_until_reset() {
        let store = ScriptStore::new(vec![Ok(page(&["A"])), Ok(page(&["A"]))]);
        let mut fetcher = PagedFetcher::new(&store, "exhibitions");

        fetcher.fetch_next(5).expect("fetch");
        assert!(fetcher.state().exhausted());

        fetcher.fetch_next(5).expect("fetch");
        fetcher.fetch_next(5).expect("fetch");
        assert_eq!(store.query_count(), 1);

        fetcher.reset();
        assert!(!fetcher.state().exhausted());
        fetcher.fetch_next(5).expect("fetch");
        assert_eq!(store.query_count(), 2);
        assert_eq!(ids(fetcher.state()), ["A"]);
    }

    #[test]
    fn cursor_advances_only_on_non_empty_success() {
        let store = ScriptStore::new(vec![
            Ok(page(&["A", "B"])),
            Err(Error::new(ErrorKind::Timeout).with_message("store timed out")),
            Ok(Page {
                records: Vec::new(),
                cursor: None,
            }),
        ]);
        let mut fetcher = PagedFetcher::new(&store, "exhibitions");

        fetcher.fetch_next(2).expect("fetch");
        assert_eq!(fetcher.state().cursor().map(Cursor::token), Some("B"));

        // Failure leaves the cursor alone.
        fetcher.fetch_next(2).expect("fetch");
        assert_eq!(fetcher.state().cursor().map(Cursor::token), Some("B"));

        // Empty page leaves the cursor alone too.
        fetcher.fetch_next(2).expect("fetch");
        assert_eq!(fetcher.state().cursor().map(Cursor::token), Some("B"));
    }

    #[test]
    fn reset_clears_exactly_and_leaves_in_flight_loading() {
        let store = ScriptStore::new(vec![Ok(page(&["A", "B"]))]);
        let mut fetcher = PagedFetcher::new(&store, "exhibitions");
        fetcher.fetch_next(2).expect("fetch");

        let ticket = fetcher.begin(2).expect("begin").expect("ticket");
        fetcher.reset();

        let state = fetcher.state();
        assert!(state.items().is_empty());
        assert!(state.cursor().is_none());
        assert!(!state.exhausted());
        assert!(state.last_error().is_none());
        assert!(state.loading(), "in-flight fetch keeps its slot");
        drop(ticket);
    }

    #[test]
    fn stale_response_is_discarded_after_reset() {
        let store = ScriptStore::new(vec![]);
        let mut fetcher = PagedFetcher::new(&store, "exhibitions");

        let ticket = fetcher.begin(2).expect("begin").expect("ticket");
        fetcher.reset();
        fetcher.complete(ticket, Ok(page(&["A", "B"])));

        let state = fetcher.state();
        assert!(state.items().is_empty());
        assert!(state.cursor().is_none());
        assert!(state.last_error().is_none());
        assert!(!state.loading(), "stale completion releases the slot");

        // The fetcher is usable again afterwards.
        let ticket = fetcher.begin(2).expect("begin").expect("ticket");
        fetcher.complete(ticket, Ok(page(&["C"])));
        assert_eq!(ids(fetcher.state()), ["C"]);
    }

    #[test]
    fn redelivered_completion_does_not_double_append() {
        let store = ScriptStore::new(vec![]);
        let mut fetcher = PagedFetcher::new(&store, "exhibitions");

        let ticket = fetcher.begin(2).expect("begin").expect("ticket");
        let duplicate = ticket.clone();
        fetcher.complete(ticket, Ok(page(&["A", "B"])));
        assert_eq!(ids(fetcher.state()), ["A", "B"]);

        // A cloned ticket redeemed a second time finds no fetch in flight
        // and must leave the accumulation alone.
        fetcher.complete(duplicate, Ok(page(&["A", "B"])));
        assert_eq!(ids(fetcher.state()), ["A", "B"]);
        assert_eq!(fetcher.state().cursor().map(Cursor::token), Some("B"));
        assert!(!fetcher.state().loading());
    }

    #[test]
    fn failure_isolation_and_retry() {
        // Timeout first, identical retry succeeds.
        let store = ScriptStore::new(vec![
            Err(Error::new(ErrorKind::Timeout).with_message("store timed out")),
            Ok(page(&["A", "B"])),
            Ok(Page {
                records: Vec::new(),
                cursor: None,
            }),
        ]);
        let mut fetcher = PagedFetcher::new(&store, "exhibitions");

        let state = fetcher.fetch_next(2).expect("fetch");
        assert!(state.items().is_empty());
        assert!(state.cursor().is_none());
        assert!(!state.exhausted());
        assert!(!state.loading());
        assert_eq!(state.last_error().map(Error::kind), Some(ErrorKind::Timeout));

        let state = fetcher.fetch_next(2).expect("fetch");
        assert_eq!(ids(state), ["A", "B"]);
        assert!(state.last_error().is_none(), "success clears the error");
        assert!(!state.exhausted());

        let state = fetcher.fetch_next(2).expect("fetch");
        assert!(state.exhausted());
    }

    #[test]
    fn zero_page_size_is_rejected_before_querying() {
        let store = ScriptStore::new(vec![Ok(page(&["A"]))]);
        let mut fetcher = PagedFetcher::new(&store, "exhibitions");

        let err = fetcher.fetch_next(0).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(store.query_count(), 0);
        assert!(!fetcher.state().loading());
    }

    #[test]
    fn missing_cursor_on_non_empty_page_keeps_previous() {
        let store = ScriptStore::new(vec![
            Ok(page(&["A", "B"])),
            Ok(Page {
                records: vec![record("C"), record("D")],
                cursor: None,
            }),
        ]);
        let mut fetcher = PagedFetcher::new(&store, "exhibitions");

        fetcher.fetch_next(2).expect("fetch");
        fetcher.fetch_next(2).expect("fetch");

        let state = fetcher.state();
        assert_eq!(ids(state), ["A", "B", "C", "D"]);
        assert_eq!(state.cursor().map(Cursor::token), Some("B"));
    }
}
