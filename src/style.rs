//! Power BI visual style values.
//!
//! A property value is a closed union: a scalar, a nested object, or an ordered list of
//! property instances (`[{ "$id"?: ..., ...fields }]`). Everything round-trips through
//! `serde_json::Value` so theme documents keep their exact shape.
pub mod extract;
pub mod merge;
pub mod provenance;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

pub use extract::extract_variant_overrides;
pub use merge::{compute_variant_style, merge_styles};
pub use provenance::{get_property_sources, PropertySource};

/// Reserved variant key for a visual's default style.
pub const DEFAULT_VARIANT: &str = "*";

/// Identity key of a property instance inside a list.
pub const INSTANCE_ID: &str = "$id";

// ————————————————————————————————————————————————————————————————————————————
// VALUES
// ————————————————————————————————————————————————————————————————————————————

/// `VisualStyleProperties`: property name → value, in document order.
pub type StyleProps = IndexMap<String, PropValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum PropValue {
    Scalar(Scalar),
    Object(StyleProps),
    List(Vec<PropValue>),
}

impl PropValue {
    pub fn null() -> Self {
        PropValue::Scalar(Scalar::Null)
    }

    pub fn string(s: impl Into<String>) -> Self {
        PropValue::Scalar(Scalar::String(s.into()))
    }

    pub fn as_object(&self) -> Option<&StyleProps> {
        match self {
            PropValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropValue]> {
        match self {
            PropValue::List(xs) => Some(xs),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Scalar(Scalar::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<StyleProps> {
        match self {
            PropValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Identity key of a property instance: the JSON text of its `$id`, so `1` and `"1"`
    /// are different instances.
    pub fn instance_id(&self) -> Option<String> {
        let id = self.as_object()?.get(INSTANCE_ID)?;
        Some(Value::from(id.clone()).to_string())
    }

    /// `{ solid: { color } }` → `color`
    pub fn solid_color(&self) -> Option<&str> {
        self.as_object()?.get("solid")?.as_object()?.get("color")?.as_str()
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => PropValue::Scalar(Scalar::Null),
            Value::Bool(b) => PropValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => PropValue::Scalar(Scalar::Number(n)),
            Value::String(s) => PropValue::Scalar(Scalar::String(s)),
            Value::Array(xs) => PropValue::List(xs.into_iter().map(PropValue::from).collect()),
            Value::Object(map) => {
                PropValue::Object(map.into_iter().map(|(k, v)| (k, PropValue::from(v))).collect())
            }
        }
    }
}

impl From<PropValue> for Value {
    fn from(value: PropValue) -> Self {
        match value {
            PropValue::Scalar(Scalar::Null) => Value::Null,
            PropValue::Scalar(Scalar::Bool(b)) => Value::Bool(b),
            PropValue::Scalar(Scalar::Number(n)) => Value::Number(n),
            PropValue::Scalar(Scalar::String(s)) => Value::String(s),
            PropValue::List(xs) => Value::Array(xs.into_iter().map(Value::from).collect()),
            PropValue::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::string(s)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Scalar(Scalar::Bool(b))
    }
}

impl From<i64> for PropValue {
    fn from(n: i64) -> Self {
        PropValue::Scalar(Scalar::Number(n.into()))
    }
}

/// Object JSON → `StyleProps`; anything else → `None`.
pub fn props_from_value(value: Value) -> Option<StyleProps> {
    PropValue::from(value).into_object()
}

pub fn props_to_value(props: &StyleProps) -> Value {
    Value::from(PropValue::Object(props.clone()))
}

// ————————————————————————————————————————————————————————————————————————————
// VISUAL STYLES
// ————————————————————————————————————————————————————————————————————————————

/// variant name → style; always holds a `"*"` entry.
pub type VariantStyles = IndexMap<String, StyleProps>;

/// visual type → variants. Every visual carries a `"*"` variant, created empty when the
/// source document lacks one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "IndexMap<String, VariantStyles>")]
pub struct VisualStyles(IndexMap<String, VariantStyles>);

impl From<IndexMap<String, VariantStyles>> for VisualStyles {
    fn from(raw: IndexMap<String, VariantStyles>) -> Self {
        let mut out = VisualStyles::default();
        for (visual, mut variants) in raw {
            ensure_default(&mut variants);
            out.0.insert(visual, variants);
        }
        out
    }
}

fn ensure_default(variants: &mut VariantStyles) {
    if !variants.contains_key(DEFAULT_VARIANT) {
        variants.shift_insert(0, DEFAULT_VARIANT.to_owned(), StyleProps::new());
    }
}

impl VisualStyles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_visual(&self, visual: &str) -> bool {
        self.0.contains_key(visual)
    }

    pub fn visual(&self, visual: &str) -> Option<&VariantStyles> {
        self.0.get(visual)
    }

    pub fn visual_types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariantStyles)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn variant(&self, visual: &str, variant: &str) -> Option<&StyleProps> {
        self.0.get(visual)?.get(variant)
    }

    /// Get or create a visual entry (with an empty `"*"`).
    pub fn visual_mut(&mut self, visual: &str) -> &mut VariantStyles {
        let variants = self.0.entry(visual.to_owned()).or_default();
        ensure_default(variants);
        variants
    }

    pub fn set_variant(&mut self, visual: &str, variant: &str, props: StyleProps) {
        self.visual_mut(visual).insert(variant.to_owned(), props);
    }

    /// Removing `"*"` resets it to empty instead.
    pub fn remove_variant(&mut self, visual: &str, variant: &str) -> Option<StyleProps> {
        let variants = self.0.get_mut(visual)?;
        if variant == DEFAULT_VARIANT {
            let old = variants.get_mut(DEFAULT_VARIANT)?;
            return Some(std::mem::take(old));
        }
        variants.shift_remove(variant)
    }
}
