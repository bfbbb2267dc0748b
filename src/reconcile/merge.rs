//! Timestamp- and identity-aware merge of a snapshot into a record.

use super::filter::dedup_by_id;
use crate::types::{Flat, FlatId, FlatRecord};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::collections::{HashMap, HashSet};

/// How far before `now` flats with no recorded creation time are placed.
const LEGACY_CREATED_AGE_DAYS: i64 = 10 * 365;

/// Creation time assigned to stored flats that predate timestamp tracking.
pub fn legacy_created_sentinel(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(LEGACY_CREATED_AGE_DAYS)
}

/// Merge `fresh` into `old` using the current time, truncated to seconds.
pub fn merge(old: FlatRecord, fresh: Vec<Flat>) -> FlatRecord {
    merge_at(old, fresh, Utc::now().trunc_subsecs(0))
}

/// Merge `fresh` into `old` as of `now`.
///
/// Flats present in both are re-homed: the fresh copy replaces the old one
/// wholesale (attributes included), but inherits the old `created`. Every
/// fresh flat gets `updated = now`; flats seen for the first time also get
/// `created = now`. Old flats absent from `fresh` are kept, with missing
/// timestamps backfilled.
///
/// The result holds the surviving old flats first, then the fresh flats in
/// their deduplicated order. No two flats in the result share an ID.
pub fn merge_at(old: FlatRecord, fresh: Vec<Flat>, now: DateTime<Utc>) -> FlatRecord {
    let fresh = dedup_by_id(fresh);
    let fresh_ids: HashSet<FlatId> = fresh.iter().map(|f| f.id).collect();
    let sentinel = legacy_created_sentinel(now);

    let mut inherited_created: HashMap<FlatId, DateTime<Utc>> = HashMap::new();
    let mut flats = Vec::with_capacity(old.flats.len() + fresh.len());

    for mut flat in dedup_by_id(old.flats) {
        let created = *flat.created.get_or_insert(sentinel);
        if flat.updated.is_none() {
            flat.updated = Some(created);
        }

        if fresh_ids.contains(&flat.id) {
            inherited_created.insert(flat.id, created);
        } else {
            flats.push(flat);
        }
    }

    for mut flat in fresh {
        flat.created = Some(inherited_created.get(&flat.id).copied().unwrap_or(now));
        flat.updated = Some(now);
        flats.push(flat);
    }

    FlatRecord { flats }
}
