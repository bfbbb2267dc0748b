//! Core types for the flat tracker.

use crate::error::TrackerError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Upstream identifier of a flat. Stable across snapshots.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlatId(pub i64);

impl fmt::Debug for FlatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlatId({})", self.0)
    }
}

impl fmt::Display for FlatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a notification destination (a chat).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DestinationId(pub i64);

impl fmt::Debug for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DestinationId({})", self.0)
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deployment environment. Scopes both the subscription registry and the
/// modern record file names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvType {
    #[default]
    Dev,
    Test,
    Prod,
}

impl EnvType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvType::Dev => "dev",
            EnvType::Test => "test",
            EnvType::Prod => "prod",
        }
    }
}

impl fmt::Display for EnvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvType {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dev" => Ok(EnvType::Dev),
            "test" => Ok(EnvType::Test),
            "prod" => Ok(EnvType::Prod),
            other => Err(TrackerError::UnknownEnvType(other.to_string())),
        }
    }
}

/// A single listed flat.
///
/// Only `id`, `created` and `updated` are interpreted. Every other field
/// the upstream sends (price, area, floor, ...) is kept in `attributes`
/// and written back unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flat {
    #[serde(alias = "ID")]
    pub id: FlatId,

    /// First time this flat was observed. Set once, never changed.
    #[serde(
        default,
        alias = "Created",
        with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created: Option<DateTime<Utc>>,

    /// Last time this flat appeared in a snapshot.
    #[serde(
        default,
        alias = "Updated",
        with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Flat {
    /// Create a flat with no timestamps and no attributes.
    pub fn new(id: i64) -> Self {
        Self {
            id: FlatId(id),
            created: None,
            updated: None,
            attributes: serde_json::Map::new(),
        }
    }

    /// Add a descriptive attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the creation timestamp.
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    /// Whether the flat was seen in a snapshot within `window` before `now`.
    pub fn recently_updated(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.updated {
            Some(updated) => now.signed_duration_since(updated) <= window,
            None => false,
        }
    }
}

/// Persisted collection of flats for one scope key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    #[serde(default, alias = "Flats")]
    pub flats: Vec<Flat>,
}

impl FlatRecord {
    pub fn new(flats: Vec<Flat>) -> Self {
        Self { flats }
    }

    pub fn is_empty(&self) -> bool {
        self.flats.is_empty()
    }

    pub fn len(&self) -> usize {
        self.flats.len()
    }

    /// Set of flat IDs held by the record.
    pub fn ids(&self) -> HashSet<FlatId> {
        self.flats.iter().map(|f| f.id).collect()
    }

    /// Find a flat by ID.
    pub fn get(&self, id: FlatId) -> Option<&Flat> {
        self.flats.iter().find(|f| f.id == id)
    }
}

/// Flats freshly fetched from upstream, aggregated across pages.
///
/// May contain the same ID more than once when pages shift between
/// requests.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub flats: Vec<Flat>,

    /// Total number of upstream pages the snapshot was assembled from.
    pub last_page: u32,
}

impl Snapshot {
    pub fn new(flats: Vec<Flat>) -> Self {
        Self { flats, last_page: 1 }
    }

    pub fn with_last_page(mut self, last_page: u32) -> Self {
        self.last_page = last_page;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.flats.is_empty()
    }
}

/// A real-estate complex known to the listing source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl BlockInfo {
    pub fn new(id: i64, name: impl Into<String>, slug: &str) -> Self {
        Self {
            id,
            name: name.into(),
            slug: normalize_slug(slug),
        }
    }
}

/// Strip surrounding whitespace and leading slashes from a complex slug.
pub fn normalize_slug(slug: &str) -> String {
    slug.trim().trim_start_matches('/').to_string()
}

/// RFC 3339 timestamps that tolerate the empty strings older records
/// carry in place of a missing value.
mod lenient_timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => DateTime::parse_from_rfc3339(s)
                .map(|ts| Some(ts.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}
