//! Properties of the configuration diff over arbitrary tables.

use std::collections::BTreeSet;

use proptest::prelude::*;
use vv_compare::diff_tables;
use vv_parser::ConfigTable;

fn table() -> impl Strategy<Value = ConfigTable> {
    prop::collection::btree_map(
        "[a-d]",
        prop::collection::btree_map("[a-e]", "[0-2]", 0..4),
        0..4,
    )
}

proptest! {
    #[test]
    fn diff_covers_exactly_the_union(model in table(), bench in table()) {
        let diff = diff_tables(&model, &bench);

        let sections: BTreeSet<&String> = model.keys().chain(bench.keys()).collect();
        prop_assert_eq!(diff.keys().collect::<BTreeSet<_>>(), sections);

        for (section, vars) in &diff {
            let m = model.get(section);
            let b = bench.get(section);
            let names: BTreeSet<&String> = m
                .into_iter()
                .flat_map(|v| v.keys())
                .chain(b.into_iter().flat_map(|v| v.keys()))
                .collect();
            prop_assert_eq!(vars.keys().collect::<BTreeSet<_>>(), names);

            for (name, entry) in vars {
                let mv = m.and_then(|v| v.get(name));
                let bv = b.and_then(|v| v.get(name));
                match (mv, bv) {
                    (Some(x), Some(y)) => {
                        prop_assert_eq!(entry.equal, x == y);
                        prop_assert_eq!(&entry.model, x);
                        prop_assert_eq!(&entry.bench, y);
                    }
                    (Some(x), None) => {
                        prop_assert!(!entry.equal);
                        prop_assert_eq!(&entry.model, x);
                        prop_assert_eq!(entry.bench.as_str(), "NA");
                    }
                    (None, Some(y)) => {
                        prop_assert!(!entry.equal);
                        prop_assert_eq!(entry.model.as_str(), "NA");
                        prop_assert_eq!(&entry.bench, y);
                    }
                    (None, None) => prop_assert!(false, "entry outside the union"),
                }
            }
        }
    }

    #[test]
    fn diff_with_itself_is_all_equal(model in table()) {
        let diff = diff_tables(&model, &model);
        prop_assert!(diff.values().all(|vars| vars.values().all(|e| e.equal)));
    }
}
