//! Contract between resolved schemas and a schema-driven form builder: which control to
//! render, what value it edits, and whether an edited value conforms.
use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::schema::{ResolvedSchema, ResolvedType};
use crate::style::{PropValue, Scalar};

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#(?:[0-9A-Fa-f]{3}|[0-9A-Fa-f]{6}|[0-9A-Fa-f]{8})$").expect("static regex")
});

pub fn is_hex_color(s: &str) -> bool {
    HEX_COLOR.is_match(s)
}

// ————————————————————————————————————————————————————————————————————————————
// CONTROLS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    Toggle,
    Number,
    Slider { min: f64, max: f64 },
    Text,
    Select(Vec<Value>),
    Color,
    Group,
    List,
    /// No usable schema (unresolved ref, null, unknown type).
    Unsupported,
}

pub fn control_for(schema: &ResolvedSchema) -> ControlKind {
    match &schema.resolved_type {
        ResolvedType::Boolean => ControlKind::Toggle,
        ResolvedType::Number | ResolvedType::Integer => match (schema.minimum, schema.maximum) {
            (Some(min), Some(max)) => ControlKind::Slider { min, max },
            _ => ControlKind::Number,
        },
        ResolvedType::String => ControlKind::Text,
        ResolvedType::Enum => ControlKind::Select(schema.enum_values.clone().unwrap_or_default()),
        ResolvedType::OneOf if is_color_choice(schema) => ControlKind::Color,
        ResolvedType::Object if schema.child("solid").is_some() => ControlKind::Color,
        ResolvedType::Object => ControlKind::Group,
        ResolvedType::Array => ControlKind::List,
        ResolvedType::OneOf
        | ResolvedType::Ref
        | ResolvedType::Null
        | ResolvedType::Other(_) => ControlKind::Unsupported,
    }
}

fn is_color_choice(schema: &ResolvedSchema) -> bool {
    schema
        .options
        .as_ref()
        .and_then(|options| options.first())
        .is_some_and(|first| first.child("solid").is_some())
}

/// The scalar a control edits: first property instance, `{ value }` unwrapped,
/// `{ solid: { color } }` reduced to the color.
pub fn current_value(value: &PropValue) -> Option<PropValue> {
    let value = match value {
        PropValue::List(instances) => instances.first()?,
        other => other,
    };
    if let Some(color) = value.solid_color() {
        return Some(PropValue::string(color));
    }
    if let Some(inner) = value.as_object().and_then(|o| o.get("value")) {
        return current_value(inner);
    }
    Some(value.clone())
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// One-shot [`Validator::validate`].
pub fn validate(schema: &ResolvedSchema, value: &PropValue) -> Vec<Violation> {
    Validator::new().validate(schema, value)
}

/// Checks values against resolved schemas. Each distinct `pattern` is compiled once per
/// validator, so keep one around when validating many values.
#[derive(Debug, Default)]
pub struct Validator {
    /// `None` for patterns that failed to compile.
    patterns: HashMap<String, Option<Regex>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `value` against `schema`. Unresolved refs accept anything. A `solid.color`
    /// string without its own `pattern` must be a hex color.
    pub fn validate(&mut self, schema: &ResolvedSchema, value: &PropValue) -> Vec<Violation> {
        let mut out = Vec::new();
        self.check(schema, value, "$", &mut out);
        out
    }

    fn compiled(&mut self, pattern: &str) -> Option<&Regex> {
        self.patterns
            .entry(pattern.to_owned())
            .or_insert_with(|| match Regex::new(pattern) {
                Ok(rx) => Some(rx),
                Err(error) => {
                    log::debug!("skipping invalid pattern {pattern}: {error}");
                    None
                }
            })
            .as_ref()
    }

    fn check(&mut self, schema: &ResolvedSchema, value: &PropValue, path: &str, out: &mut Vec<Violation>) {
        match &schema.resolved_type {
            ResolvedType::Ref | ResolvedType::Other(_) => {}
            ResolvedType::Null => {
                if value != &PropValue::null() {
                    fail(out, path, "expected null".into());
                }
            }
            ResolvedType::Boolean => {
                if !matches!(value, PropValue::Scalar(Scalar::Bool(_))) {
                    fail(out, path, "expected a boolean".into());
                }
            }
            ResolvedType::Number | ResolvedType::Integer => match value.as_f64() {
                None => fail(out, path, "expected a number".into()),
                Some(n) => {
                    if schema.resolved_type == ResolvedType::Integer && n.fract() != 0.0 {
                        fail(out, path, format!("{n} is not an integer"));
                    }
                    if let Some(min) = schema.minimum.filter(|min| n < *min) {
                        fail(out, path, format!("{n} is below minimum {min}"));
                    }
                    if let Some(max) = schema.maximum.filter(|max| n > *max) {
                        fail(out, path, format!("{n} is above maximum {max}"));
                    }
                }
            },
            ResolvedType::String => match value.as_str() {
                None => fail(out, path, "expected a string".into()),
                Some(s) => match &schema.pattern {
                    Some(pattern) => {
                        if self.compiled(pattern).is_some_and(|rx| !rx.is_match(s)) {
                            fail(out, path, format!("`{s}` does not match {pattern}"));
                        }
                    }
                    None if path.ends_with(".solid.color") && !is_hex_color(s) => {
                        fail(out, path, format!("`{s}` is not a hex color"));
                    }
                    None => {}
                },
            },
            ResolvedType::Enum => {
                let json = Value::from(value.clone());
                let allowed = schema.enum_values.as_deref().unwrap_or_default();
                if !allowed.contains(&json) {
                    fail(out, path, format!("{json} is not one of the allowed values"));
                }
            }
            ResolvedType::OneOf => {
                let options = schema.options.as_deref().unwrap_or_default();
                let matches_any = options.iter().any(|option| self.validate(option, value).is_empty());
                if !matches_any {
                    fail(out, path, format!("matches none of {} options", options.len()));
                }
            }
            ResolvedType::Array => match value.as_list() {
                None => fail(out, path, "expected an array".into()),
                Some(xs) => {
                    let len = xs.len() as u64;
                    if let Some(min) = schema.min_items.filter(|min| len < *min) {
                        fail(out, path, format!("{len} items, fewer than {min}"));
                    }
                    if let Some(max) = schema.max_items.filter(|max| len > *max) {
                        fail(out, path, format!("{len} items, more than {max}"));
                    }
                    if let Some(items) = &schema.items {
                        for (i, x) in xs.iter().enumerate() {
                            self.check(items, x, &format!("{path}[{i}]"), out);
                        }
                    }
                }
            },
            ResolvedType::Object => match value.as_object() {
                None => fail(out, path, "expected an object".into()),
                Some(map) => {
                    for name in &schema.required {
                        if !map.contains_key(name) {
                            fail(out, path, format!("missing required property `{name}`"));
                        }
                    }
                    for (name, x) in map {
                        match schema.child(name) {
                            Some(child) => self.check(child, x, &format!("{path}.{name}"), out),
                            None if schema.additional_properties == Some(false) => {
                                fail(out, path, format!("unexpected property `{name}`"));
                            }
                            None => {}
                        }
                    }
                }
            },
        }
    }
}

fn fail(out: &mut Vec<Violation>, path: &str, message: String) {
    out.push(Violation { path: path.to_owned(), message });
}
