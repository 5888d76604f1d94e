//! Quantified invariants from §8, checked with `proptest` (mirroring the
//! teacher's `proptest`/`proptest-derive` dev-dependency usage).

use bindb_core::codec::{deleted_record, deserialize, serialize};
use bindb_core::column::{ColumnDef, ColumnType};
use bindb_core::schema::{RecordLayout, Schema};
use bindb_core::value::{Row, Value};
use proptest::prelude::*;

fn layout_with_text_length(length: u32) -> RecordLayout {
    RecordLayout::plan(Schema::new(
        "db",
        "t",
        vec![ColumnDef::new("name", ColumnType::Text).with_length(length)],
    ))
    .unwrap()
}

proptest! {
    /// For strings whose UTF-8 byte length fits in the declared capacity,
    /// `deserialize(serialize(s)) == s` exactly (§8 text round-trip).
    #[test]
    fn text_round_trips_when_it_fits(s in "[a-zA-Z0-9 ]{0,60}") {
        let layout = layout_with_text_length(16); // capacity = 4*16 = 64 bytes
        prop_assume!(s.len() <= 64);
        let mut row = Row::new();
        row.insert("name".into(), Value::Text(s.clone()));
        let bytes = serialize(&layout, &row).unwrap();
        let decoded = deserialize(&layout, &bytes).unwrap().unwrap();
        prop_assert_eq!(decoded.get("name"), Some(&Value::Text(s)));
    }

    /// For strings that overflow the declared capacity, the stored text is
    /// the longest character-boundary-respecting prefix that fits (§8).
    #[test]
    fn text_truncates_to_longest_fitting_char_boundary_prefix(s in "\\PC{80,200}") {
        let layout = layout_with_text_length(4); // capacity = 16 bytes
        let mut row = Row::new();
        row.insert("name".into(), Value::Text(s.clone()));
        let bytes = serialize(&layout, &row).unwrap();
        let decoded = deserialize(&layout, &bytes).unwrap().unwrap();
        let Some(Value::Text(got)) = decoded.get("name") else {
            panic!("expected a text value")
        };
        prop_assert!(got.len() <= 16);
        if s.len() > 16 {
            prop_assert!(s.starts_with(got.as_str()));
        } else {
            prop_assert_eq!(got, &s);
        }
    }

    /// A record whose status byte is the deleted marker always deserializes
    /// to `None`, regardless of its (irrelevant) payload bytes (§8).
    #[test]
    fn deleted_records_always_deserialize_to_none(length in 1u32..32) {
        let layout = layout_with_text_length(length);
        let bytes = deleted_record(layout.record_size);
        prop_assert!(deserialize(&layout, &bytes).unwrap().is_none());
    }

    /// Numbers and booleans round-trip exactly through serialize/deserialize.
    #[test]
    fn number_and_boolean_round_trip(n in any::<f64>().prop_filter("finite", |n| n.is_finite()), b in any::<bool>()) {
        let layout = RecordLayout::plan(Schema::new(
            "db",
            "t",
            vec![
                ColumnDef::new("n", ColumnType::Number),
                ColumnDef::new("b", ColumnType::Boolean),
            ],
        ))
        .unwrap();
        let mut row = Row::new();
        row.insert("n".into(), Value::Number(n));
        row.insert("b".into(), Value::Boolean(b));
        let bytes = serialize(&layout, &row).unwrap();
        let decoded = deserialize(&layout, &bytes).unwrap().unwrap();
        prop_assert_eq!(decoded.get("n"), Some(&Value::Number(n)));
        prop_assert_eq!(decoded.get("b"), Some(&Value::Boolean(b)));
    }
}
