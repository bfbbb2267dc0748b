//! Catalog of complexes ("blocks") known to the listing source.
//!
//! The catalog is refreshed periodically from upstream; complexes seen
//! for the first time are returned from [`BlockCatalog::merge`] so they can
//! be announced.

mod blocks;

pub use blocks::BlockCatalog;
