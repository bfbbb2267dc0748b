//! Registry of which chats follow which complexes.
//!
//! The registry is an owned object: construct it once per process, share
//! it by reference (or `Arc`) with the tasks that read or mutate it. It is
//! keyed by environment so one channels file can serve dev, test and prod
//! deployments; each registry instance reads and writes only its own
//! environment's list.
//!
//! # Example
//!
//! ```ignore
//! let registry = SubscriptionRegistry::load("./data/channels.json", EnvType::Prod)?;
//! registry.subscribe(DestinationId(-1001451631453), "2ngt")?;
//!
//! for (slug, chats) in registry.destinations_by_slug() {
//!     println!("{slug}: {} subscribers", chats.len());
//! }
//! ```

mod registry;
mod types;

pub use registry::SubscriptionRegistry;
pub use types::{ChannelInfo, ChannelsFile};
