//! Delta selection.

use crate::types::{Flat, FlatId, FlatRecord};
use std::collections::HashSet;

/// Remove repeated IDs, keeping the first occurrence of each.
pub fn dedup_by_id(flats: Vec<Flat>) -> Vec<Flat> {
    let mut seen: HashSet<FlatId> = HashSet::with_capacity(flats.len());
    flats.into_iter().filter(|f| seen.insert(f.id)).collect()
}

/// Flats of `snapshot` whose IDs are absent from `old`, deduplicated by ID.
///
/// An empty `old` means every flat in the snapshot is new.
pub fn filter_new(old: &FlatRecord, snapshot: &[Flat]) -> Vec<Flat> {
    let known = old.ids();
    let unseen = snapshot
        .iter()
        .filter(|f| !known.contains(&f.id))
        .cloned()
        .collect();
    dedup_by_id(unseen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ids(flats: &[Flat]) -> Vec<i64> {
        flats.iter().map(|f| f.id.0).collect()
    }

    #[test]
    fn test_dedup_keeps_first() {
        let flats = vec![
            Flat::new(2).with_attribute("price", 100),
            Flat::new(1),
            Flat::new(2).with_attribute("price", 200),
        ];

        let deduped = dedup_by_id(flats);
        assert_eq!(ids(&deduped), vec![2, 1]);
        assert_eq!(deduped[0].attributes["price"], 100);
    }

    #[test]
    fn test_filter_suppresses_known() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let old = FlatRecord::new(vec![Flat::new(1).with_created(created)]);
        let fresh = vec![Flat::new(1), Flat::new(2), Flat::new(2)];

        let delta = filter_new(&old, &fresh);
        assert_eq!(ids(&delta), vec![2]);
    }

    #[test]
    fn test_filter_empty_old_is_dedup() {
        let fresh = vec![Flat::new(5), Flat::new(3), Flat::new(5), Flat::new(4)];
        let delta = filter_new(&FlatRecord::default(), &fresh);
        assert_eq!(ids(&delta), vec![5, 3, 4]);
    }

    #[test]
    fn test_filter_all_known() {
        let old = FlatRecord::new(vec![Flat::new(1), Flat::new(2)]);
        let delta = filter_new(&old, &[Flat::new(2), Flat::new(1)]);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_filter_does_not_touch_timestamps() {
        let fresh = vec![Flat::new(9)];
        let delta = filter_new(&FlatRecord::default(), &fresh);
        assert!(delta[0].created.is_none());
        assert!(delta[0].updated.is_none());
    }
}
