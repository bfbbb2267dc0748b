//! File-backed record store.

use super::scope::{ScopeKey, ScopeProbe};
use crate::error::{Result, TrackerError};
use crate::types::FlatRecord;
use fs2::FileExt;
use lru::LruCache;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Record store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory holding one JSON file per scope key.
    pub data_dir: PathBuf,

    /// Number of parsed records kept in memory.
    pub record_cache_size: usize,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            record_cache_size: 64,
            create_if_missing: true,
        }
    }
}

/// Owns the on-disk flat records.
///
/// The data directory is locked for the lifetime of the store, which makes
/// this the only writer and lets loaded records be cached. Passes for
/// different keys may run concurrently; passes for the same key must be
/// serialized by the caller.
pub struct RecordStore {
    config: StoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Recently loaded or saved records.
    cache: Mutex<LruCache<ScopeKey, FlatRecord>>,
}

impl RecordStore {
    /// Open the store, creating the data directory if configured to.
    pub fn open(config: StoreConfig) -> Result<Self> {
        if !config.data_dir.exists() {
            if !config.create_if_missing {
                return Err(TrackerError::NotInitialized(config.data_dir));
            }
            fs::create_dir_all(&config.data_dir)?;
        }

        let lock_file = Self::acquire_lock(&config.data_dir)?;
        let cache_size = NonZeroUsize::new(config.record_cache_size).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            config,
            _lock_file: lock_file,
            cache: Mutex::new(LruCache::new(cache_size)),
        })
    }

    /// Get the data directory.
    pub fn path(&self) -> &Path {
        &self.config.data_dir
    }

    /// Full path of the file backing `key`.
    pub fn record_path(&self, key: &ScopeKey) -> PathBuf {
        self.config.data_dir.join(key.file_name())
    }

    /// Whether a record file exists for `key`.
    pub fn exists(&self, key: &ScopeKey) -> bool {
        self.cache.lock().contains(key) || self.record_path(key).exists()
    }

    /// Load the record for `key`.
    ///
    /// A missing file is an empty record, not an error. Unparsable content
    /// is reported as [`TrackerError::MalformedRecord`].
    pub fn load(&self, key: &ScopeKey) -> Result<FlatRecord> {
        if let Some(cached) = self.cache.lock().get(key).cloned() {
            return Ok(cached);
        }

        let path = self.record_path(key);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(scope = %key, "no record yet");
                return Ok(FlatRecord::default());
            }
            Err(e) => return Err(e.into()),
        };

        let record: FlatRecord =
            serde_json::from_slice(&content).map_err(|e| TrackerError::MalformedRecord {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        debug!(scope = %key, flats = record.len(), "loaded record");
        self.cache.lock().put(key.clone(), record.clone());

        Ok(record)
    }

    /// Persist `record` under `key`, replacing any previous content.
    ///
    /// The new content is written next to the target and renamed over it,
    /// so readers see either the old record or the new one.
    pub fn save(&self, key: &ScopeKey, record: &FlatRecord) -> Result<()> {
        let path = self.record_path(key);
        let content = serde_json::to_vec(record)?;
        write_atomic(&path, &content)?;

        debug!(scope = %key, flats = record.len(), path = %path.display(), "saved record");
        self.cache.lock().put(key.clone(), record.clone());

        Ok(())
    }

    /// When the record for `key` was last saved, if ever.
    pub fn last_saved(&self, key: &ScopeKey) -> Result<Option<SystemTime>> {
        match fs::metadata(self.record_path(key)) {
            Ok(meta) => Ok(Some(meta.modified()?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// True if no save for `key` happened within `max_age` of now.
    ///
    /// Unreadable metadata counts as stale.
    pub fn is_stale(&self, key: &ScopeKey, max_age: Duration) -> bool {
        match self.last_saved(key) {
            Ok(Some(saved)) => match SystemTime::now().duration_since(saved) {
                Ok(age) => age > max_age,
                // Saved "in the future": clock moved backwards.
                Err(_) => false,
            },
            _ => true,
        }
    }

    /// Drop all cached records.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    // --- Private Helpers ---

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.join("LOCK");
        let lock_file = File::create(lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| TrackerError::Locked)?;

        Ok(lock_file)
    }
}

impl ScopeProbe for RecordStore {
    fn has_record(&self, key: &ScopeKey) -> bool {
        self.exists(key)
    }
}

/// Write `content` to `path` through a temporary sibling and a rename.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp_path, path));

    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_file(&tmp_path) {
            if cleanup.kind() != ErrorKind::NotFound {
                warn!(path = %tmp_path.display(), error = %cleanup, "failed to remove temporary record file");
            }
        }
        return Err(e.into());
    }
    Ok(())
}
