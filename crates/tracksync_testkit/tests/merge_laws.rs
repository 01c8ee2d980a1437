//! Algebraic properties of collection merge.

use proptest::prelude::*;
use tracksync_collection::{merge, Collection};
use tracksync_testkit::{collection_strategy, raw_collection_strategy, PropTestConfig};

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn merge_never_duplicates(a in raw_collection_strategy(24), b in raw_collection_strategy(24)) {
        let merged = merge(&a, &b);
        prop_assert!(merged.is_deduplicated());
    }

    #[test]
    fn merge_with_empty_incoming_is_identity(a in collection_strategy(24)) {
        prop_assert_eq!(merge(&a, &Collection::new()), a);
    }

    #[test]
    fn merge_into_empty_base_seeds(b in collection_strategy(24)) {
        prop_assert_eq!(merge(&Collection::new(), &b), b);
    }

    #[test]
    fn merge_is_idempotent(a in collection_strategy(24)) {
        prop_assert_eq!(merge(&a, &a), a);
    }

    #[test]
    fn merge_keeps_base_prefix(a in collection_strategy(24), b in raw_collection_strategy(24)) {
        let merged = merge(&a, &b);
        prop_assert_eq!(&merged.records()[..a.len()], a.records());
    }

    #[test]
    fn merge_covers_every_incoming_track(a in collection_strategy(24), b in raw_collection_strategy(24)) {
        let merged = merge(&a, &b);
        for record in &b {
            prop_assert!(merged.contains_track(record));
        }
    }

    #[test]
    fn merge_is_stable_when_repeated(a in collection_strategy(24), b in raw_collection_strategy(24)) {
        let once = merge(&a, &b);
        prop_assert_eq!(merge(&once, &b), once.clone());
        prop_assert_eq!(merge(&once, &a), once);
    }

    #[test]
    fn promotion_makes_approved_a_subset(main in collection_strategy(24), approved in raw_collection_strategy(24)) {
        let approved = approved.deduplicated();
        let promoted = merge(&main, &approved);
        for record in &approved {
            prop_assert!(promoted.contains_track(record));
        }
    }
}
