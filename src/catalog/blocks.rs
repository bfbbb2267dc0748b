//! Block catalog backed by a JSON file.

use crate::error::{Result, TrackerError};
use crate::records::write_atomic;
use crate::types::{normalize_slug, BlockInfo};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Known complexes by slug.
pub struct BlockCatalog {
    /// Path to the blocks file.
    path: PathBuf,

    /// In-memory catalog.
    blocks: RwLock<HashMap<String, BlockInfo>>,
}

impl BlockCatalog {
    /// Create an empty catalog that persists to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            blocks: RwLock::new(HashMap::new()),
        }
    }

    /// Load the catalog from `path`. A missing file yields an empty catalog.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let catalog = Self::new(path);

        match fs::read(&catalog.path) {
            Ok(content) => {
                let blocks: Vec<BlockInfo> = serde_json::from_slice(&content).map_err(|e| {
                    TrackerError::MalformedRecord {
                        path: catalog.path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                catalog.merge(blocks);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %catalog.path.display(), "no blocks file, starting empty");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(catalog)
    }

    /// Insert or overwrite `blocks`, returning the ones not known before,
    /// sorted by slug.
    pub fn merge(&self, blocks: Vec<BlockInfo>) -> Vec<BlockInfo> {
        let mut known = self.blocks.write();
        let mut added = Vec::new();

        for mut block in blocks {
            block.slug = normalize_slug(&block.slug);
            if block.slug.is_empty() {
                continue;
            }
            if !known.contains_key(&block.slug) {
                added.push(block.clone());
            }
            known.insert(block.slug.clone(), block);
        }

        added.sort_by(|a, b| a.slug.cmp(&b.slug));
        if !added.is_empty() {
            info!(count = added.len(), "new complexes in catalog");
        }
        added
    }

    /// Look up a complex by slug.
    pub fn lookup(&self, slug: &str) -> Option<BlockInfo> {
        self.blocks.read().get(&normalize_slug(slug)).cloned()
    }

    /// Like [`lookup`](Self::lookup), but an unknown slug is an error.
    pub fn require(&self, slug: &str) -> Result<BlockInfo> {
        self.lookup(slug)
            .ok_or_else(|| TrackerError::UnknownComplex(normalize_slug(slug)))
    }

    /// All known slugs, sorted.
    pub fn slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.blocks.read().keys().cloned().collect();
        slugs.sort();
        slugs
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    /// Write the catalog to its file as an array sorted by slug.
    pub fn save(&self) -> Result<()> {
        let mut blocks: Vec<BlockInfo> = self.blocks.read().values().cloned().collect();
        blocks.sort_by(|a, b| a.slug.cmp(&b.slug));

        let content = serde_json::to_vec(&blocks)?;
        write_atomic(&self.path, &content)
    }
}
