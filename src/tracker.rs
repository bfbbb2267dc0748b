//! End-to-end update flow: fetch, diff, notify, then persist.
//!
//! A pass is split into two explicit phases so the ordering contract is
//! visible in the API:
//!
//! 1. [`Tracker::compute_delta`] resolves the record, loads it and picks the
//!    flats that were never seen. Nothing is written.
//! 2. [`Tracker::commit_if_dispatched`] merges and saves, but only when the
//!    caller reports that the delta was delivered.
//!
//! A failed delivery therefore leaves the record untouched and the same
//! delta is offered again on the next cycle (at-least-once delivery).

use crate::catalog::BlockCatalog;
use crate::error::{Result, TrackerError};
use crate::reconcile::{filter_new, merge};
use crate::records::{RecordStore, Resolution, ScopeResolver};
use crate::subscriptions::SubscriptionRegistry;
use crate::types::{normalize_slug, BlockInfo, DestinationId, EnvType, Flat, FlatRecord, Snapshot};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Supplies listings from upstream. Owns HTTP, pagination and timeouts.
pub trait FlatSource: Send + Sync {
    /// All flats of a complex, aggregated across pages.
    fn fetch_flats(&self, block: &BlockInfo) -> Result<Snapshot>;

    /// Every complex the listing source knows about.
    fn fetch_blocks(&self) -> Result<Vec<BlockInfo>>;
}

/// Delivers notifications. Owns rendering, chunking and transport.
pub trait Dispatcher: Send + Sync {
    /// Announce newly listed flats of `block`.
    fn dispatch_flats(&self, destination: DestinationId, block: &BlockInfo, flats: &[Flat]) -> Result<()>;

    /// Announce complexes that appeared in the catalog.
    fn announce_blocks(&self, destination: DestinationId, blocks: &[BlockInfo]) -> Result<()>;
}

/// Tracker configuration.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Environment whose subscriptions and records are served.
    pub env: EnvType,

    /// Records older than this are refreshed before being shown.
    pub max_record_age: Duration,

    /// Flats not seen within this window are left out of listings.
    pub recent_window: chrono::Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            env: EnvType::Dev,
            max_record_age: Duration::from_secs(10 * 60),
            recent_window: chrono::Duration::hours(1),
        }
    }
}

/// Result of the first phase of a pass.
#[derive(Debug)]
pub enum DeltaOutcome {
    /// Every fetched flat was already known.
    NothingNew { filtered: usize },
    /// New flats to announce before committing.
    Pending(PendingUpdate),
}

/// A computed delta waiting for its dispatch outcome.
#[derive(Debug)]
pub struct PendingUpdate {
    slug: String,
    resolution: Resolution,
    old: FlatRecord,
    snapshot: Snapshot,
    delta: Vec<Flat>,
}

impl PendingUpdate {
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Flats never seen before, deduplicated.
    pub fn delta(&self) -> &[Flat] {
        &self.delta
    }

    /// How many fetched flats were suppressed as already known.
    pub fn filtered(&self) -> usize {
        self.snapshot.flats.len() - self.delta.len()
    }

    /// Which record backs this pass.
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }
}

/// Result of the second phase of a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Merged record written.
    Saved { new: usize, total: usize },
    /// Dispatch failed; the record was left as it was.
    Skipped,
}

/// Outcome of a full pass for one complex.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassReport {
    /// Nobody follows the complex; nothing was fetched.
    NoSubscribers,
    /// Nothing new; nothing sent or saved.
    NothingNew { filtered: usize },
    /// New flats delivered and saved.
    Notified {
        new: usize,
        filtered: usize,
        destinations: usize,
    },
}

/// Results of one cycle over every followed complex.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub passes: Vec<(String, PassReport)>,
    pub failures: Vec<(String, TrackerError)>,
}

/// Runs reconciliation passes against the record store.
pub struct Tracker {
    config: TrackerConfig,

    store: RecordStore,

    resolver: ScopeResolver,

    registry: Arc<SubscriptionRegistry>,

    catalog: Arc<BlockCatalog>,

    /// One lock per complex; passes for the same slug never overlap.
    /// Entries are never removed; the map holds one unit mutex per slug
    /// ever passed to `run_pass`, which in practice is the subscribed
    /// slugs of the catalog.
    pass_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Tracker {
    pub fn new(
        config: TrackerConfig,
        store: RecordStore,
        registry: Arc<SubscriptionRegistry>,
        catalog: Arc<BlockCatalog>,
    ) -> Self {
        let resolver = ScopeResolver::new(config.env);
        Self {
            config,
            store,
            resolver,
            registry,
            catalog,
            pass_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &BlockCatalog {
        &self.catalog
    }

    /// Resolve the record backing `slug`.
    pub fn resolve(&self, slug: &str, fallback: Option<DestinationId>) -> Resolution {
        self.resolver.resolve(&self.store, slug, fallback)
    }

    // --- Two-phase pass ---

    /// Phase one: find the flats of `snapshot` not yet recorded for `slug`.
    ///
    /// `fallback` is the destination whose legacy record may still back the
    /// complex. Callers must not run two passes for the same slug at once.
    pub fn compute_delta(
        &self,
        slug: &str,
        snapshot: Snapshot,
        fallback: Option<DestinationId>,
    ) -> Result<DeltaOutcome> {
        let slug = normalize_slug(slug);
        if snapshot.is_empty() {
            return Err(TrackerError::EmptySnapshot(slug));
        }

        let resolution = self.resolve(&slug, fallback);
        if resolution.is_legacy() {
            debug!(slug = %slug, scope = %resolution.load_key(), "reading legacy record");
        }

        let old = self.store.load(resolution.load_key())?;
        let delta = filter_new(&old, &snapshot.flats);

        if delta.is_empty() {
            let filtered = snapshot.flats.len();
            info!(slug = %slug, env = %self.config.env, filtered, "no new flats");
            return Ok(DeltaOutcome::NothingNew { filtered });
        }

        Ok(DeltaOutcome::Pending(PendingUpdate {
            slug,
            resolution,
            old,
            snapshot,
            delta,
        }))
    }

    /// Phase two: persist the merged record if the delta was delivered.
    pub fn commit_if_dispatched(&self, pending: PendingUpdate, dispatched: bool) -> Result<CommitOutcome> {
        if !dispatched {
            warn!(slug = %pending.slug, new = pending.delta.len(), "dispatch failed, record left unchanged");
            return Ok(CommitOutcome::Skipped);
        }

        let new = pending.delta.len();
        let merged = merge(pending.old, pending.snapshot.flats);
        let total = merged.len();
        self.store.save(pending.resolution.save_key(), &merged)?;

        if pending.resolution.is_legacy() {
            info!(
                slug = %pending.slug,
                from = %pending.resolution.load_key(),
                to = %pending.resolution.save_key(),
                "migrated legacy record"
            );
        }

        Ok(CommitOutcome::Saved { new, total })
    }

    // --- Full passes ---

    /// Fetch, diff, notify every subscriber of `slug`, then commit.
    ///
    /// The record is saved only if every subscriber received the delta.
    pub fn run_pass(&self, slug: &str, source: &dyn FlatSource, dispatcher: &dyn Dispatcher) -> Result<PassReport> {
        let slug = normalize_slug(slug);
        let lock = self.pass_lock(&slug);
        let _guard = lock.lock();

        let destinations = self.registry.destinations_for(&slug);
        if destinations.is_empty() {
            return Ok(PassReport::NoSubscribers);
        }

        let block = self.catalog.require(&slug)?;
        let snapshot = source.fetch_flats(&block)?;
        debug!(slug = %slug, flats = snapshot.flats.len(), pages = snapshot.last_page, "fetched snapshot");

        let pending = match self.compute_delta(&slug, snapshot, destinations.first().copied())? {
            DeltaOutcome::NothingNew { filtered } => return Ok(PassReport::NothingNew { filtered }),
            DeltaOutcome::Pending(pending) => pending,
        };

        let mut failure = None;
        for &destination in &destinations {
            if let Err(e) = dispatcher.dispatch_flats(destination, &block, pending.delta()) {
                warn!(slug = %slug, chat = %destination, error = %e, "failed to send new flats");
                failure = Some(e);
                break;
            }
        }

        let new = pending.delta().len();
        let filtered = pending.filtered();
        self.commit_if_dispatched(pending, failure.is_none())?;

        if let Some(e) = failure {
            return Err(e);
        }

        info!(slug = %slug, env = %self.config.env, new, filtered, "sent new flats");
        Ok(PassReport::Notified {
            new,
            filtered,
            destinations: destinations.len(),
        })
    }

    /// Run a pass for every complex with subscribers.
    ///
    /// A failing complex is logged and recorded; the others still run.
    pub fn run_cycle(&self, source: &dyn FlatSource, dispatcher: &dyn Dispatcher) -> CycleReport {
        let mut report = CycleReport::default();

        for slug in self.registry.destinations_by_slug().into_keys() {
            match self.run_pass(&slug, source, dispatcher) {
                Ok(pass) => report.passes.push((slug, pass)),
                Err(e) => {
                    warn!(slug = %slug, error = %e, "pass failed");
                    report.failures.push((slug, e));
                }
            }
        }

        report
    }

    /// Refresh the catalog from upstream and announce new complexes to
    /// every known chat. Returns the new complexes.
    pub fn refresh_catalog(&self, source: &dyn FlatSource, dispatcher: &dyn Dispatcher) -> Result<Vec<BlockInfo>> {
        let blocks = source.fetch_blocks()?;
        let added = self.catalog.merge(blocks);
        self.catalog.save()?;

        if added.is_empty() {
            return Ok(added);
        }

        for destination in self.registry.all_destinations() {
            dispatcher.announce_blocks(destination, &added)?;
        }

        Ok(added)
    }

    // --- Views ---

    /// Recently seen flats of `slug`.
    ///
    /// A stale record is refreshed from `source` and merged in memory only,
    /// so the flats it adds are still announced by the next pass.
    pub fn listing(&self, slug: &str, source: &dyn FlatSource) -> Result<Vec<Flat>> {
        let block = self.catalog.require(slug)?;
        let fallback = self.registry.destinations_for(&block.slug).first().copied();
        let resolution = self.resolve(&block.slug, fallback);

        let old = self.store.load(resolution.load_key())?;
        let record = if self.store.is_stale(resolution.load_key(), self.config.max_record_age) {
            let snapshot = source.fetch_flats(&block)?;
            if snapshot.is_empty() {
                return Err(TrackerError::EmptySnapshot(block.slug));
            }
            merge(old, snapshot.flats)
        } else {
            old
        };

        let now = Utc::now();
        Ok(record
            .flats
            .into_iter()
            .filter(|f| f.recently_updated(now, self.config.recent_window))
            .collect())
    }

    // --- Subscriptions ---

    /// Subscribe `chat_id` to a complex from the catalog.
    pub fn subscribe(&self, chat_id: DestinationId, slug: &str) -> Result<()> {
        let block = self.catalog.require(slug)?;
        self.registry.subscribe(chat_id, &block.slug)
    }

    /// Unsubscribe `chat_id` from a complex.
    pub fn unsubscribe(&self, chat_id: DestinationId, slug: &str) -> Result<()> {
        self.registry.unsubscribe(chat_id, slug)
    }

    fn pass_lock(&self, slug: &str) -> Arc<Mutex<()>> {
        self.pass_locks.lock().entry(slug.to_string()).or_default().clone()
    }
}
