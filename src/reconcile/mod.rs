//! Reconciliation of fresh snapshots against persisted records.
//!
//! Two pure functions over in-memory data:
//!
//! - [`filter_new`] picks the flats of a snapshot that a record has never
//!   seen. This is what gets announced.
//! - [`merge`] folds a snapshot into a record, keeping each flat's first
//!   `created` time and refreshing `updated`. This is what gets persisted.
//!
//! Neither touches disk; the caller decides when (and whether) the merged
//! record is saved.

mod filter;
mod merge;

pub use filter::{dedup_by_id, filter_new};
pub use merge::{legacy_created_sentinel, merge, merge_at};
