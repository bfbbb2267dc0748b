//! Property tests for filter and merge.

use chrono::{DateTime, Duration, TimeZone, Utc};
use flatwatch::{dedup_by_id, filter_new, merge_at, Flat, FlatId, FlatRecord};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

fn flat_strategy() -> impl Strategy<Value = Flat> {
    (0i64..40, 0u32..5, proptest::option::of(0i64..1000)).prop_map(|(id, price, created)| {
        let mut flat = Flat::new(id).with_attribute("price", price);
        flat.created = created.map(|h| base() - Duration::hours(h));
        flat
    })
}

fn record_strategy() -> impl Strategy<Value = FlatRecord> {
    proptest::collection::vec(flat_strategy(), 0..30)
        .prop_map(|flats| FlatRecord::new(dedup_by_id(flats)))
}

fn snapshot_strategy() -> impl Strategy<Value = Vec<Flat>> {
    proptest::collection::vec(flat_strategy(), 0..30)
}

fn created_by_id(record: &FlatRecord) -> HashMap<FlatId, Option<DateTime<Utc>>> {
    record.flats.iter().map(|f| (f.id, f.created)).collect()
}

proptest! {
    #[test]
    fn merge_is_idempotent(old in record_strategy(), fresh in snapshot_strategy()) {
        let once = merge_at(old, fresh.clone(), base());
        let twice = merge_at(once.clone(), fresh, base() + Duration::minutes(5));

        prop_assert_eq!(once.ids(), twice.ids());
        prop_assert_eq!(created_by_id(&once), created_by_id(&twice));
    }

    #[test]
    fn merge_never_duplicates(old in record_strategy(), fresh in snapshot_strategy()) {
        let merged = merge_at(old, fresh, base());
        prop_assert_eq!(merged.ids().len(), merged.len());
    }

    #[test]
    fn merge_keeps_known_created(old in record_strategy(), fresh in snapshot_strategy()) {
        let known: HashMap<FlatId, Option<DateTime<Utc>>> = created_by_id(&old);
        let fresh_ids: HashSet<FlatId> = fresh.iter().map(|f| f.id).collect();
        let now = base() + Duration::hours(1);

        let merged = merge_at(old, fresh, now);

        for flat in &merged.flats {
            match known.get(&flat.id) {
                Some(Some(created)) => prop_assert_eq!(flat.created, Some(*created)),
                Some(None) => prop_assert!(flat.created.unwrap() < now),
                None => prop_assert_eq!(flat.created, Some(now)),
            }
            if fresh_ids.contains(&flat.id) {
                prop_assert_eq!(flat.updated, Some(now));
            } else {
                prop_assert!(flat.updated.is_some());
            }
        }
    }

    #[test]
    fn merge_covers_both_inputs(old in record_strategy(), fresh in snapshot_strategy()) {
        let mut expected = old.ids();
        expected.extend(fresh.iter().map(|f| f.id));

        let merged = merge_at(old, fresh, base());
        prop_assert_eq!(merged.ids(), expected);
    }

    #[test]
    fn filter_excludes_known(old in record_strategy(), fresh in snapshot_strategy()) {
        let known = old.ids();
        let delta = filter_new(&old, &fresh);

        for flat in &delta {
            prop_assert!(!known.contains(&flat.id));
        }
        let unique: HashSet<FlatId> = delta.iter().map(|f| f.id).collect();
        prop_assert_eq!(unique.len(), delta.len());
    }

    #[test]
    fn filter_on_empty_record_is_dedup(fresh in snapshot_strategy()) {
        let delta = filter_new(&FlatRecord::default(), &fresh);
        prop_assert_eq!(delta, dedup_by_id(fresh));
    }

    #[test]
    fn filter_matches_merge_growth(old in record_strategy(), fresh in snapshot_strategy()) {
        let before = old.len();
        let delta = filter_new(&old, &fresh);
        let merged = merge_at(old, fresh, base());
        prop_assert_eq!(merged.len(), before + delta.len());
    }
}

#[test]
fn test_documented_scenario() {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let old = FlatRecord::new(vec![Flat::new(1).with_created(t0)]);
    let fresh = vec![Flat::new(1), Flat::new(2), Flat::new(2)];

    let delta = filter_new(&old, &fresh);
    assert_eq!(delta, vec![Flat::new(2)]);

    let now = base();
    let merged = merge_at(old, fresh, now);
    assert_eq!(merged.len(), 2);

    let one = merged.get(FlatId(1)).unwrap();
    assert_eq!(one.created, Some(t0));
    assert_eq!(one.updated, Some(now));

    let two = merged.get(FlatId(2)).unwrap();
    assert_eq!(two.created, Some(now));
    assert_eq!(two.updated, Some(now));
}
