//! Scope keys and the modern/legacy resolution order.

use crate::types::{DestinationId, EnvType};
use std::fmt;

/// Storage scope of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Shared by every destination in one environment.
    Env(EnvType),
    /// Owned by a single destination (pre-migration layout).
    Destination(DestinationId),
}

/// Key of one record: complex slug plus storage scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub slug: String,
    pub scope: Scope,
}

impl ScopeKey {
    pub fn env(slug: impl Into<String>, env: EnvType) -> Self {
        Self {
            slug: slug.into(),
            scope: Scope::Env(env),
        }
    }

    pub fn destination(slug: impl Into<String>, destination: DestinationId) -> Self {
        Self {
            slug: slug.into(),
            scope: Scope::Destination(destination),
        }
    }

    /// File name of the record inside the data directory.
    ///
    /// `%` and `/` in the slug are percent-escaped, so every record sits
    /// directly in the data directory and distinct slugs never share a file.
    /// Scope tags never contain `_`, so the last `_` still splits slug and
    /// scope.
    pub fn file_name(&self) -> String {
        let tag = match self.scope {
            Scope::Env(env) => env.to_string(),
            Scope::Destination(id) => id.to_string(),
        };
        format!("{}_{}.json", escape_slug(&self.slug), tag)
    }
}

fn escape_slug(slug: &str) -> String {
    let mut escaped = String::with_capacity(slug.len());
    for c in slug.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '/' => escaped.push_str("%2F"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Scope::Env(env) => write!(f, "{}_{}", self.slug, env),
            Scope::Destination(id) => write!(f, "{}_{}", self.slug, id),
        }
    }
}

/// Answers whether a record already exists for a key.
pub trait ScopeProbe {
    fn has_record(&self, key: &ScopeKey) -> bool;
}

/// Which of the two candidate keys backs a complex.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Environment-scoped record (existing or to be created).
    Modern(ScopeKey),
    /// Destination-scoped record left over from before the migration.
    /// Carries the modern key that the next save will write to.
    Legacy { legacy: ScopeKey, modern: ScopeKey },
}

impl Resolution {
    /// Key to read the current record from.
    pub fn load_key(&self) -> &ScopeKey {
        match self {
            Resolution::Modern(key) => key,
            Resolution::Legacy { legacy, .. } => legacy,
        }
    }

    /// Key the merged record is written to. Always the modern form, so a
    /// legacy scope migrates on its first save.
    pub fn save_key(&self) -> &ScopeKey {
        match self {
            Resolution::Modern(key) => key,
            Resolution::Legacy { modern, .. } => modern,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Resolution::Legacy { .. })
    }
}

/// Picks the record key for a complex in one environment.
#[derive(Clone, Copy, Debug)]
pub struct ScopeResolver {
    env: EnvType,
}

impl ScopeResolver {
    pub fn new(env: EnvType) -> Self {
        Self { env }
    }

    pub fn env(&self) -> EnvType {
        self.env
    }

    /// Environment-scoped key for a complex.
    pub fn modern_key(&self, slug: &str) -> ScopeKey {
        ScopeKey::env(slug, self.env)
    }

    /// Resolve the key for `slug`.
    ///
    /// Order: an existing modern record, then an existing legacy record of
    /// `fallback`, then the modern key for a record not yet written.
    pub fn resolve(
        &self,
        probe: &impl ScopeProbe,
        slug: &str,
        fallback: Option<DestinationId>,
    ) -> Resolution {
        let modern = self.modern_key(slug);
        if probe.has_record(&modern) {
            return Resolution::Modern(modern);
        }

        if let Some(destination) = fallback {
            let legacy = ScopeKey::destination(slug, destination);
            if probe.has_record(&legacy) {
                return Resolution::Legacy { legacy, modern };
            }
        }

        Resolution::Modern(modern)
    }
}
