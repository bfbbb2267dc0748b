//! Shared fixtures for integration tests.

#![allow(dead_code)]

use flatwatch::{
    BlockCatalog, BlockInfo, DestinationId, Dispatcher, EnvType, Flat, FlatId, FlatSource,
    RecordStore, Result, Snapshot, StoreConfig, SubscriptionRegistry, Tracker, TrackerConfig,
    TrackerError,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const ENV: EnvType = EnvType::Test;

/// Upstream stand-in with per-slug listings.
#[derive(Default)]
pub struct FakeSource {
    flats: Mutex<HashMap<String, Vec<Flat>>>,
    blocks: Mutex<Vec<BlockInfo>>,
    failing: Mutex<HashSet<String>>,
    fetches: AtomicUsize,
}

impl FakeSource {
    pub fn set_flats(&self, slug: &str, ids: &[i64]) {
        let flats = ids
            .iter()
            .map(|&id| Flat::new(id).with_attribute("price", id * 1000))
            .collect();
        self.flats.lock().insert(slug.to_string(), flats);
    }

    pub fn set_blocks(&self, blocks: Vec<BlockInfo>) {
        *self.blocks.lock() = blocks;
    }

    pub fn fail(&self, slug: &str) {
        self.failing.lock().insert(slug.to_string());
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl FlatSource for FakeSource {
    fn fetch_flats(&self, block: &BlockInfo) -> Result<Snapshot> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(&block.slug) {
            return Err(TrackerError::Fetch(format!("upstream down for {}", block.slug)));
        }
        let flats = self.flats.lock().get(&block.slug).cloned().unwrap_or_default();
        Ok(Snapshot::new(flats).with_last_page(1))
    }

    fn fetch_blocks(&self) -> Result<Vec<BlockInfo>> {
        Ok(self.blocks.lock().clone())
    }
}

/// Dispatcher that records what it was asked to send.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub sent: Mutex<Vec<(DestinationId, String, Vec<FlatId>)>>,
    pub announced: Mutex<Vec<(DestinationId, Vec<String>)>>,
    failing: Mutex<HashSet<DestinationId>>,
}

impl RecordingDispatcher {
    pub fn fail_for(&self, destination: DestinationId) {
        self.failing.lock().insert(destination);
    }

    pub fn recover(&self) {
        self.failing.lock().clear();
    }

    pub fn sent_ids(&self) -> Vec<Vec<i64>> {
        self.sent
            .lock()
            .iter()
            .map(|(_, _, ids)| ids.iter().map(|id| id.0).collect())
            .collect()
    }
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch_flats(&self, destination: DestinationId, block: &BlockInfo, flats: &[Flat]) -> Result<()> {
        if self.failing.lock().contains(&destination) {
            return Err(TrackerError::Dispatch {
                destination,
                reason: "chat unreachable".to_string(),
            });
        }
        self.sent.lock().push((
            destination,
            block.slug.clone(),
            flats.iter().map(|f| f.id).collect(),
        ));
        Ok(())
    }

    fn announce_blocks(&self, destination: DestinationId, blocks: &[BlockInfo]) -> Result<()> {
        self.announced
            .lock()
            .push((destination, blocks.iter().map(|b| b.slug.clone()).collect()));
        Ok(())
    }
}

/// Route library logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn data_dir(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("data")
}

/// Tracker over a fresh data directory with `2ngt`, `sp` and `hp` in the
/// catalog.
pub fn test_tracker(dir: &TempDir) -> Tracker {
    init_tracing();
    let store = RecordStore::open(StoreConfig {
        data_dir: data_dir(dir),
        record_cache_size: 16,
        create_if_missing: true,
    })
    .unwrap();

    let registry = Arc::new(SubscriptionRegistry::new(data_dir(dir).join("channels.json"), ENV));
    let catalog = Arc::new(BlockCatalog::new(data_dir(dir).join("blocks.json")));
    catalog.merge(vec![
        BlockInfo::new(1, "Second NGT", "2ngt"),
        BlockInfo::new(2, "Sp", "sp"),
        BlockInfo::new(3, "Hp", "hp"),
    ]);

    Tracker::new(
        TrackerConfig {
            env: ENV,
            ..Default::default()
        },
        store,
        registry,
        catalog,
    )
}
