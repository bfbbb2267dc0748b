//! Subscription types.

use crate::types::{DestinationId, EnvType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One chat following one complex.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub chat_id: DestinationId,
    /// Complex slug, e.g. `2ngt`.
    pub block_slug: String,
}

impl ChannelInfo {
    pub fn new(chat_id: DestinationId, block_slug: impl Into<String>) -> Self {
        Self {
            chat_id,
            block_slug: block_slug.into(),
        }
    }
}

/// On-disk layout of the channels file.
pub type ChannelsFile = HashMap<EnvType, Vec<ChannelInfo>>;
