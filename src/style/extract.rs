//! Inverse of the cascade: the smallest override that reproduces a computed style.
use std::collections::HashSet;

use super::merge::{merge_value, InstanceIndex};
use super::{PropValue, StyleProps, INSTANCE_ID};

/// Keys of `computed` whose value differs from `base`. Keys only in `base` are not
/// represented, so removal cannot be expressed.
///
/// For any `computed = merge_styles(base, o)`:
/// `merge_styles(base, &extract_variant_overrides(base, &computed)) == computed`.
pub fn extract_variant_overrides(base: &StyleProps, computed: &StyleProps) -> StyleProps {
    let mut out = StyleProps::new();
    for (key, value) in computed {
        match base.get(key) {
            Some(existing) if existing == value => {}
            Some(existing) => {
                out.insert(key.clone(), delta(existing, value));
            }
            None => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

/// The computed value itself when re-merging it reproduces it; otherwise a structural
/// delta (needed when the base list carries `$id`-less instances, which the array merge
/// always re-appends).
fn delta(base: &PropValue, computed: &PropValue) -> PropValue {
    if merge_value(base, computed) == *computed {
        return computed.clone();
    }
    let candidate = match (base, computed) {
        (PropValue::Object(b), PropValue::Object(c)) => PropValue::Object(object_delta(b, c)),
        (PropValue::List(b), PropValue::List(c)) => match list_delta(b, c) {
            Some(xs) => PropValue::List(xs),
            None => return computed.clone(),
        },
        _ => return computed.clone(),
    };
    if merge_value(base, &candidate) == *computed {
        log::debug!("override stored as structural delta");
        candidate
    } else {
        computed.clone()
    }
}

/// Differing keys only; `$id` is always kept so list entries still match their base.
fn object_delta(base: &StyleProps, computed: &StyleProps) -> StyleProps {
    let mut out = StyleProps::new();
    for (key, value) in computed {
        match base.get(key) {
            Some(existing) if existing == value && key != INSTANCE_ID => {}
            Some(existing) => {
                out.insert(key.clone(), delta(existing, value));
            }
            None => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

/// `computed` as laid out by the array merge is `head ++ unmatched ++ anonymous`; keep
/// the shortest `head` that regenerates the tail and reduce matched entries to deltas.
/// `None` when `computed` has no such layout.
fn list_delta(base: &[PropValue], computed: &[PropValue]) -> Option<Vec<PropValue>> {
    let index = InstanceIndex::new(base);
    let tail_len = index.anonymous.len();
    let split = computed.len().checked_sub(tail_len)?;
    let (head, tail) = computed.split_at(split);
    if !tail.iter().zip(&index.anonymous).all(|(x, y)| x == *y) {
        return None;
    }

    for cut in 0..=head.len() {
        let (prefix, rest) = head.split_at(cut);
        let ids = prefix
            .iter()
            .filter_map(PropValue::instance_id)
            .collect::<HashSet<_>>();
        let unmatched = index.unmatched(&ids).collect::<Vec<_>>();
        if rest.len() == unmatched.len() && rest.iter().zip(&unmatched).all(|(x, y)| x == *y) {
            let entries = prefix
                .iter()
                .map(|entry| {
                    let matched = entry.instance_id().and_then(|id| index.by_id.get(&id).copied());
                    match matched {
                        Some(b) => delta(b, entry),
                        None => entry.clone(),
                    }
                })
                .collect();
            return Some(entries);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{merge_styles, props_from_value, props_to_value};
    use serde_json::{json, Value};

    fn props(v: Value) -> StyleProps {
        props_from_value(v).unwrap()
    }

    fn assert_round_trip(base: Value, over: Value) -> StyleProps {
        let base = props(base);
        let computed = merge_styles(&base, &props(over));
        let extracted = extract_variant_overrides(&base, &computed);
        assert_eq!(
            props_to_value(&merge_styles(&base, &extracted)),
            props_to_value(&computed),
            "round trip failed; extracted = {}",
            props_to_value(&extracted)
        );
        extracted
    }

    #[test]
    fn equal_keys_are_omitted() {
        let base = props(json!({ "a": 1, "b": { "c": [1, 2] } }));
        let computed = props(json!({ "a": 1, "b": { "c": [1, 2] }, "d": true }));
        assert_eq!(props_to_value(&extract_variant_overrides(&base, &computed)), json!({ "d": true }));
    }

    #[test]
    fn removed_keys_are_not_represented() {
        let base = props(json!({ "a": 1, "b": 2 }));
        let computed = props(json!({ "a": 1 }));
        assert!(extract_variant_overrides(&base, &computed).is_empty());
    }

    #[test]
    fn concrete_background_scenario() {
        let extracted = assert_round_trip(
            json!({ "background": [{ "$id": "*", "color": { "solid": { "color": "#FFFFFF" } } }] }),
            json!({ "background": [{ "$id": "*", "color": { "solid": { "color": "#000000" } } }] }),
        );
        assert_eq!(
            props_to_value(&extracted)["background"][0]["color"],
            json!({ "solid": { "color": "#000000" } })
        );
    }

    #[test]
    fn verbatim_value_when_it_reproduces() {
        let extracted = assert_round_trip(
            json!({ "p": [{ "$id": "a", "v": 1 }, { "$id": "b", "v": 2 }], "q": 1 }),
            json!({ "p": [{ "$id": "a", "v": 9 }] }),
        );
        assert_eq!(
            props_to_value(&extracted),
            json!({ "p": [{ "$id": "a", "v": 9 }, { "$id": "b", "v": 2 }] })
        );
    }

    #[test]
    fn anonymous_base_instances_use_delta() {
        let extracted = assert_round_trip(
            json!({ "title": [{ "show": true }] }),
            json!({ "title": [{ "fontSize": 12 }] }),
        );
        assert_eq!(props_to_value(&extracted), json!({ "title": [{ "fontSize": 12 }] }));
    }

    #[test]
    fn nested_anonymous_instances_round_trip() {
        assert_round_trip(
            json!({ "p": [
                { "$id": "a", "rules": [{ "op": "gt" }], "v": 1 },
                { "$id": "b", "v": 2 },
                { "show": true }
            ] }),
            json!({ "p": [
                { "$id": "a", "rules": [{ "op": "lt" }] },
                { "show": false }
            ] }),
        );
    }

    #[test]
    fn round_trip_law_over_mixed_cases() {
        let cases = [
            (json!({}), json!({ "a": 1 })),
            (json!({ "a": 1 }), json!({})),
            (json!({ "a": [1, 2] }), json!({ "a": [3] })),
            (json!({ "a": { "b": [{ "x": 1 }] } }), json!({ "a": { "b": [{ "x": 2 }], "c": null } })),
            (json!({ "a": [{ "$id": "1" }, { "k": 0 }, { "$id": "2", "m": [{ "n": 1 }] }] }),
             json!({ "a": [{ "$id": "2", "m": [{ "n": 2 }] }, { "$id": "3" }] })),
            (json!({ "a": "scalar" }), json!({ "a": [{ "$id": "x" }] })),
        ];
        for (base, over) in cases {
            assert_round_trip(base, over);
        }
    }
}
