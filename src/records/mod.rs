//! Durable per-scope flat records.
//!
//! Each scope key maps to one JSON file in the data directory. The scope
//! resolver decides which file backs a complex, preferring the
//! environment-wide form over the older per-chat form.

mod scope;
mod store;

pub use scope::{Resolution, Scope, ScopeKey, ScopeProbe, ScopeResolver};
pub use store::{RecordStore, StoreConfig};
pub(crate) use store::write_atomic;
