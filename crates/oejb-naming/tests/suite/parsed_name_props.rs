use oejb_naming::{component_hash, ParsedName};
use proptest::prelude::*;

fn arb_component() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "comp", "env", "Aa", "BB", "x-y", "é"])
        .prop_map(str::to_owned)
}

fn arb_raw_name() -> impl Strategy<Value = (Vec<String>, String)> {
    prop::collection::vec((arb_component(), 1usize..3), 0..6).prop_flat_map(|parts| {
        let components: Vec<String> = parts.iter().map(|(c, _)| c.clone()).collect();
        let raw: String = parts
            .iter()
            .map(|(component, slashes)| format!("{}{component}", "/".repeat(*slashes)))
            .collect();
        (Just(components), prop::sample::select(vec!["", "/", "//"]))
            .prop_map(move |(components, tail)| (components, format!("{raw}{tail}")))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn separators_are_collapsed((components, raw) in arb_raw_name()) {
        let name = ParsedName::new(&raw);
        if components.is_empty() {
            prop_assert!(name.is_empty());
            prop_assert_eq!(name.component_hash(), 0);
        } else {
            prop_assert_eq!(name.components(), components.as_slice());
            prop_assert_eq!(name.to_string(), components.join("/"));
        }
    }

    #[test]
    fn cursor_hash_tracks_component((_components, raw) in arb_raw_name()) {
        let mut name = ParsedName::new(&raw);
        loop {
            prop_assert_eq!(name.component_hash(), component_hash(name.component()));
            if !name.next() {
                break;
            }
        }
        prop_assert_eq!(name.pos(), name.len() - 1);
    }
}
