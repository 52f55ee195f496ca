//! Two-level style cascade: a visual's `"*"` style plus a named variant's overlay.
use std::collections::HashSet;

use indexmap::IndexMap;

use super::{PropValue, StyleProps, VisualStyles, DEFAULT_VARIANT};

/// Effective style of `visual_type`/`variant_name`. `None` for an unknown visual.
pub fn compute_variant_style(
    visual_styles: &VisualStyles,
    visual_type: &str,
    variant_name: &str,
) -> Option<StyleProps> {
    let variants = visual_styles.visual(visual_type)?;
    let base = variants.get(DEFAULT_VARIANT).cloned().unwrap_or_default();
    if variant_name == DEFAULT_VARIANT {
        return Some(base);
    }
    match variants.get(variant_name) {
        None => Some(base),
        Some(overrides) => Some(merge_styles(&base, overrides)),
    }
}

/// Deep merge of `over` onto `base`. The result shares nothing with either input.
///
/// - list vs list: property-instance merge keyed by `$id`
/// - object vs object: recurse
/// - anything else: `over` replaces
pub fn merge_styles(base: &StyleProps, over: &StyleProps) -> StyleProps {
    let mut out = base.clone();
    for (key, value) in over {
        let merged = match out.get(key) {
            Some(existing) => merge_value(existing, value),
            None => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

pub(crate) fn merge_value(base: &PropValue, over: &PropValue) -> PropValue {
    match (base, over) {
        (PropValue::List(b), PropValue::List(o)) => PropValue::List(merge_instances(b, o)),
        (PropValue::Object(b), PropValue::Object(o)) => PropValue::Object(merge_styles(b, o)),
        _ => over.clone(),
    }
}

/// Output order: override entries (matched ones merged with their base), then base
/// `$id` entries nobody matched, then base entries without `$id`.
pub(crate) fn merge_instances(base: &[PropValue], over: &[PropValue]) -> Vec<PropValue> {
    let index = InstanceIndex::new(base);
    let mut matched = HashSet::new();
    let mut out = Vec::with_capacity(base.len() + over.len());
    for entry in over {
        let hit = entry
            .instance_id()
            .and_then(|id| index.by_id.get(&id).map(|b| (id, *b)));
        match hit {
            Some((id, b)) => {
                out.push(merge_value(b, entry));
                matched.insert(id);
            }
            None => out.push(entry.clone()),
        }
    }
    out.extend(index.unmatched(&matched).cloned());
    out.extend(index.anonymous.iter().map(|e| (*e).clone()));
    out
}

/// Base instances split into `$id`-addressed and anonymous ones. A repeated `$id`
/// keeps its first position and its last value.
pub(crate) struct InstanceIndex<'a> {
    pub by_id: IndexMap<String, &'a PropValue>,
    pub anonymous: Vec<&'a PropValue>,
}

impl<'a> InstanceIndex<'a> {
    pub fn new(base: &'a [PropValue]) -> Self {
        let mut by_id = IndexMap::new();
        let mut anonymous = Vec::new();
        for entry in base {
            match entry.instance_id() {
                Some(id) => {
                    by_id.insert(id, entry);
                }
                None => anonymous.push(entry),
            }
        }
        Self { by_id, anonymous }
    }

    pub fn unmatched<'s>(
        &'s self,
        matched: &'s HashSet<String>,
    ) -> impl Iterator<Item = &'a PropValue> + 's {
        self.by_id
            .iter()
            .filter(move |(id, _)| !matched.contains(*id))
            .map(|(_, entry)| *entry)
    }
}
