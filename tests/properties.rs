use std::collections::HashSet;

use proptest::prelude::*;
use probebench::exec::{LineRecord, digit_ratio};
use probebench::monitor::{SamplingMode, TableFold};
use probebench::parser::{PayloadParser, encode_payload};
use probebench::sweep::{ParameterSet, Sweep};
use probebench::template::CommandTemplate;

// Strategy for a sweep of up to 4 parameters with 1..4 small integer values each.
fn sweep_strategy() -> impl Strategy<Value = Sweep> {
    proptest::collection::vec(proptest::collection::vec(0i64..100, 1..4), 0..4).prop_map(
        |domains| {
            let mut sweep = Sweep::new();
            for (i, values) in domains.into_iter().enumerate() {
                sweep = sweep.param(&format!("p{i}"), values);
            }
            sweep
        },
    )
}

proptest! {
    #[test]
    fn sweep_yields_exactly_len_distinct_sets(sweep in sweep_strategy()) {
        let sets: Vec<ParameterSet> = sweep.iter().collect();
        prop_assert_eq!(sets.len(), sweep.len());

        // Domains may repeat values, so only positions are distinct; every
        // set binds every declared name.
        for set in &sets {
            let names: Vec<&str> = set.keys().map(String::as_str).collect();
            let mut declared: Vec<&str> = sweep.names().collect();
            declared.sort();
            prop_assert_eq!(names, declared);
        }
    }

    #[test]
    fn sweep_with_distinct_values_has_no_duplicates(n in 1usize..5, m in 1usize..5) {
        let sweep = Sweep::new()
            .param("a", (0..n as i64).collect::<Vec<_>>())
            .param("b", (0..m as i64).collect::<Vec<_>>());
        let rendered: HashSet<String> = sweep
            .iter()
            .map(|s| format!("{}-{}", s["a"], s["b"]))
            .collect();
        prop_assert_eq!(rendered.len(), n * m);
    }

    #[test]
    fn literal_text_renders_unchanged(text in "[a-z0-9 ./|-]{0,40}") {
        let template = CommandTemplate::parse(&text).unwrap();
        prop_assert!(template.fields().is_empty());
        prop_assert_eq!(template.render(&ParameterSet::new()).unwrap(), text);
    }

    #[test]
    fn digit_ratio_is_a_fraction(text in ".{0,60}") {
        let r = digit_ratio(&text);
        prop_assert!((0.0..=1.0).contains(&r));
    }

    #[test]
    fn fold_never_emits_ragged_rows(
        rows in proptest::collection::vec(proptest::collection::vec(0u32..1000, 1..5), 0..20)
    ) {
        let mut lines = vec![LineRecord::now("a,b,c")];
        lines.extend(rows.iter().map(|r| {
            LineRecord::now(r.iter().map(u32::to_string).collect::<Vec<_>>().join(","))
        }));

        let mut fold = TableFold::new(SamplingMode::Continuous);
        let timeline = fold.fold(&lines);

        let expected = rows.iter().filter(|r| r.len() == 3).count();
        prop_assert_eq!(timeline.len(), expected);
        for column in timeline.columns() {
            prop_assert_eq!(timeline.column(column).unwrap().len(), expected);
        }
    }

    #[test]
    fn payload_marker_survives_surrounding_noise(
        prefix in "[a-z ]{0,20}",
        suffix in "[a-z ]{0,20}",
        n in any::<i64>(),
    ) {
        let value = serde_json::json!({ "n": n });
        let marker = encode_payload("PasFmtDat", &value).unwrap();
        let line = format!("{prefix}{marker}{suffix}");
        prop_assert_eq!(PayloadParser::default().extract(&line), Some(value));
    }
}
