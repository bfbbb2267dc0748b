//! # Flatwatch
//!
//! Tracks newly listed flats per real-estate complex and announces only the
//! ones nobody has been told about yet.
//!
//! ## Core Concepts
//!
//! - **Flats**: listed units with a stable upstream ID and opaque attributes
//! - **Records**: one JSON file per complex and scope, holding every flat
//!   seen so far with its first-seen and last-seen times
//! - **Reconciliation**: pure diff and merge of a fresh snapshot against a
//!   record
//! - **Scopes**: environment-wide records, with lazy migration from older
//!   per-chat records
//!
//! ## Example
//!
//! ```ignore
//! use flatwatch::{
//!     BlockCatalog, DeltaOutcome, RecordStore, StoreConfig, SubscriptionRegistry, Tracker,
//!     TrackerConfig,
//! };
//!
//! let store = RecordStore::open(StoreConfig::default())?;
//! let registry = Arc::new(SubscriptionRegistry::load("./data/channels.json", EnvType::Prod)?);
//! let catalog = Arc::new(BlockCatalog::load("./data/blocks.json")?);
//! let tracker = Tracker::new(TrackerConfig::default(), store, registry, catalog);
//!
//! if let DeltaOutcome::Pending(pending) = tracker.compute_delta("2ngt", snapshot, None)? {
//!     let sent = notify(pending.delta()).is_ok();
//!     tracker.commit_if_dispatched(pending, sent)?;
//! }
//! ```

pub mod catalog;
pub mod daemon;
pub mod error;
pub mod reconcile;
pub mod records;
pub mod subscriptions;
pub mod tracker;
pub mod types;

// Re-exports
pub use catalog::BlockCatalog;
pub use daemon::{Daemon, DaemonConfig};
pub use error::{Result, TrackerError};
pub use reconcile::{dedup_by_id, filter_new, legacy_created_sentinel, merge, merge_at};
pub use records::{RecordStore, Resolution, Scope, ScopeKey, ScopeProbe, ScopeResolver, StoreConfig};
pub use subscriptions::{ChannelInfo, ChannelsFile, SubscriptionRegistry};
pub use tracker::{
    CommitOutcome, CycleReport, DeltaOutcome, Dispatcher, FlatSource, PassReport, PendingUpdate,
    Tracker, TrackerConfig,
};
pub use types::*;
