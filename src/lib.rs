//! Purpose: Client library for the gallery site's remote collections and media.
//! Exports: `core` (records, cursors, fetch state machine, errors) and `api`
//! (store implementations, gallery operations, first-page cache).
//! Role: Shared library backing the `galerie` CLI and any embedding UI.
//! Invariants: The remote store is authoritative; local caching is strictly
//! best-effort and invalidated on every successful write.
pub mod api;
pub mod core;
