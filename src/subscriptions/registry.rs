//! Subscription registry backed by a JSON file.

use super::types::{ChannelInfo, ChannelsFile};
use crate::error::{Result, TrackerError};
use crate::records::write_atomic;
use crate::types::{normalize_slug, DestinationId, EnvType};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Owned map of environment to subscriptions.
///
/// Every mutation holds the write lock until the file is rewritten, so
/// mutations are serialized and a failed write is rolled back before any
/// reader can observe it.
pub struct SubscriptionRegistry {
    /// Path to the channels file.
    path: PathBuf,

    /// Environment this registry serves.
    env: EnvType,

    /// Subscriptions for every environment found in the file.
    channels: RwLock<ChannelsFile>,
}

impl SubscriptionRegistry {
    /// Create an empty registry that persists to `path`.
    pub fn new(path: impl AsRef<Path>, env: EnvType) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            env,
            channels: RwLock::new(ChannelsFile::new()),
        }
    }

    /// Load a registry from `path`. A missing file yields an empty registry.
    pub fn load(path: impl AsRef<Path>, env: EnvType) -> Result<Self> {
        let registry = Self::new(path, env);

        match fs::read(&registry.path) {
            Ok(content) => {
                let file: ChannelsFile = serde_json::from_slice(&content).map_err(|e| {
                    TrackerError::MalformedRecord {
                        path: registry.path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                registry.merge(file);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %registry.path.display(), "no channels file, starting empty");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(registry)
    }

    /// Environment this registry serves.
    pub fn env(&self) -> EnvType {
        self.env
    }

    /// Fold `file` into the registry, dropping repeated (slug, chat) pairs.
    pub fn merge(&self, file: ChannelsFile) {
        let mut channels = self.channels.write();
        for (env, incoming) in file {
            let list = channels.entry(env).or_default();
            list.extend(incoming.into_iter().map(|c| {
                ChannelInfo::new(c.chat_id, normalize_slug(&c.block_slug))
            }));

            let mut seen = HashSet::new();
            list.retain(|c| seen.insert((c.block_slug.clone(), c.chat_id)));
        }
    }

    /// Subscribe `chat_id` to `slug` and persist.
    pub fn subscribe(&self, chat_id: DestinationId, slug: &str) -> Result<()> {
        let slug = normalize_slug(slug);
        let mut channels = self.channels.write();

        let list = channels.entry(self.env).or_default();
        if list.iter().any(|c| c.chat_id == chat_id && c.block_slug == slug) {
            return Err(TrackerError::AlreadySubscribed { chat_id, slug });
        }
        list.push(ChannelInfo::new(chat_id, slug.clone()));

        if let Err(e) = self.persist(&channels) {
            if let Some(list) = channels.get_mut(&self.env) {
                list.pop();
            }
            return Err(e);
        }

        info!(chat = %chat_id, slug = %slug, "subscribed");
        Ok(())
    }

    /// Remove the subscription of `chat_id` to `slug` and persist.
    pub fn unsubscribe(&self, chat_id: DestinationId, slug: &str) -> Result<()> {
        let slug = normalize_slug(slug);
        let mut channels = self.channels.write();

        let list = channels.entry(self.env).or_default();
        let position = list
            .iter()
            .position(|c| c.chat_id == chat_id && c.block_slug == slug)
            .ok_or_else(|| TrackerError::NotSubscribed {
                chat_id,
                slug: slug.clone(),
            })?;
        let removed = list.remove(position);

        if let Err(e) = self.persist(&channels) {
            if let Some(list) = channels.get_mut(&self.env) {
                list.insert(position, removed);
            }
            return Err(e);
        }

        info!(chat = %chat_id, slug = %slug, "unsubscribed");
        Ok(())
    }

    /// Whether `chat_id` follows `slug`.
    pub fn is_subscribed(&self, chat_id: DestinationId, slug: &str) -> bool {
        let slug = normalize_slug(slug);
        self.channels
            .read()
            .get(&self.env)
            .map(|list| list.iter().any(|c| c.chat_id == chat_id && c.block_slug == slug))
            .unwrap_or(false)
    }

    /// Slugs `chat_id` follows.
    pub fn subscriptions_for_chat(&self, chat_id: DestinationId) -> BTreeSet<String> {
        self.channels
            .read()
            .get(&self.env)
            .map(|list| {
                list.iter()
                    .filter(|c| c.chat_id == chat_id)
                    .map(|c| c.block_slug.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Subscribers of every followed complex, in subscription order.
    pub fn destinations_by_slug(&self) -> BTreeMap<String, Vec<DestinationId>> {
        let mut by_slug: BTreeMap<String, Vec<DestinationId>> = BTreeMap::new();
        if let Some(list) = self.channels.read().get(&self.env) {
            for channel in list {
                let chats = by_slug.entry(channel.block_slug.clone()).or_default();
                if !chats.contains(&channel.chat_id) {
                    chats.push(channel.chat_id);
                }
            }
        }
        by_slug
    }

    /// Subscribers of `slug`, in subscription order.
    pub fn destinations_for(&self, slug: &str) -> Vec<DestinationId> {
        let slug = normalize_slug(slug);
        self.destinations_by_slug().remove(&slug).unwrap_or_default()
    }

    /// Every chat with at least one subscription, without repeats.
    pub fn all_destinations(&self) -> Vec<DestinationId> {
        let mut seen = HashSet::new();
        self.channels
            .read()
            .get(&self.env)
            .map(|list| {
                list.iter()
                    .map(|c| c.chat_id)
                    .filter(|id| seen.insert(*id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Write the registry to its file.
    pub fn save(&self) -> Result<()> {
        self.persist(&self.channels.read())
    }

    fn persist(&self, channels: &ChannelsFile) -> Result<()> {
        let content = serde_json::to_vec(channels)?;
        write_atomic(&self.path, &content)
    }
}
