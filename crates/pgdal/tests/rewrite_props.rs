//! Property tests for LIKE-marker rewriting.

use pgdal::{PatternMode, Template, Token, Value, rewrite_like};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Piece {
    Raw(String),
    Param(String),
    Like(PatternMode, String),
}

fn arb_mode() -> impl Strategy<Value = PatternMode> {
    prop_oneof![
        Just(PatternMode::Prefix),
        Just(PatternMode::Postfix),
        Just(PatternMode::Anywhere),
    ]
}

fn arb_raw() -> impl Strategy<Value = String> {
    // Includes text that looks like markers; raw tokens must stay raw.
    prop_oneof![
        "[a-zA-Z0-9_ =,()\"']{1,12}",
        Just(" LIKE 1".to_string()),
        Just(" AND ".to_string()),
        Just("'?'".to_string()),
    ]
}

fn arb_text() -> impl Strategy<Value = String> {
    "[a-z%_]{0,8}"
}

fn arb_plain_piece() -> impl Strategy<Value = Piece> {
    prop_oneof![
        arb_raw().prop_map(Piece::Raw),
        arb_text().prop_map(Piece::Param),
    ]
}

fn arb_piece() -> impl Strategy<Value = Piece> {
    prop_oneof![
        arb_raw().prop_map(Piece::Raw),
        arb_text().prop_map(Piece::Param),
        (arb_mode(), arb_text()).prop_map(|(m, t)| Piece::Like(m, t)),
    ]
}

fn build(pieces: &[Piece]) -> (Template, Vec<Value>) {
    let mut t = Template::empty();
    let mut values = Vec::new();
    for piece in pieces {
        match piece {
            Piece::Raw(s) => {
                t.push(s);
            }
            Piece::Param(v) => {
                t.push_param();
                values.push(Value::from(v.as_str()));
            }
            Piece::Like(mode, v) => {
                t.push(" ").push_like(*mode);
                values.push(Value::from(v.as_str()));
            }
        }
    }
    (t, values)
}

proptest! {
    #[test]
    fn like_free_templates_are_untouched(pieces in prop::collection::vec(arb_plain_piece(), 0..12)) {
        let (template, values) = build(&pieces);
        let (out, out_values) = rewrite_like(template.clone(), values.clone()).unwrap();
        prop_assert_eq!(out, template);
        prop_assert_eq!(out_values, values);
    }

    #[test]
    fn markers_are_consumed_and_values_wrapped(pieces in prop::collection::vec(arb_piece(), 0..12)) {
        let (template, values) = build(&pieces);
        let slots = template.slot_count();
        let (out, out_values) = rewrite_like(template, values.clone()).unwrap();

        prop_assert_eq!(out.like_count(), 0);
        prop_assert_eq!(out.slot_count(), slots);
        prop_assert_eq!(out_values.len(), values.len());
        prop_assert!(out.tokens().iter().all(|t| !matches!(t, Token::Like(_))));

        let mut slot = 0;
        for piece in &pieces {
            match piece {
                Piece::Raw(_) => {}
                Piece::Param(v) => {
                    prop_assert_eq!(out_values[slot].as_str(), Some(v.as_str()));
                    slot += 1;
                }
                Piece::Like(mode, v) => {
                    let got = out_values[slot].as_str().unwrap_or_default();
                    match mode {
                        PatternMode::Prefix => prop_assert_eq!(got, format!("%{v}")),
                        PatternMode::Postfix => prop_assert_eq!(got, format!("{v}%")),
                        PatternMode::Anywhere => prop_assert_eq!(got, format!("%{v}%")),
                    }
                    slot += 1;
                }
            }
        }

        let sql = out.to_sql().unwrap();
        prop_assert_eq!(sql.matches('$').count(), slots);
        if slots > 0 {
            let last = format!("${slots}");
            prop_assert!(sql.contains(&last));
        }
    }

    #[test]
    fn wrong_value_count_is_rejected(pieces in prop::collection::vec(arb_piece(), 1..8)) {
        let (template, mut values) = build(&pieces);
        values.push(Value::from("extra"));
        let err = rewrite_like(template, values).unwrap_err();
        prop_assert!(err.is_malformed_input());
    }
}
