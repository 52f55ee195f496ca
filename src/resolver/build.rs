use crate::schema::{ResolvedSchema, ResolvedType};
use crate::style::{PropValue, StyleProps};

/// Wrap a scalar into the shape `schema` expects.
///
/// - `oneOf`: only the solid-color case is handled; when the first option has a `solid`
///   property the value becomes `{ solid: { color: value } }`, otherwise it is returned as is
/// - `array`: `[{ value }]`
/// - `object`: only children listed in their own `required` are synthesized
pub fn build_value(schema: &ResolvedSchema, value: PropValue) -> PropValue {
    match schema.resolved_type {
        ResolvedType::OneOf => {
            let solid = schema
                .options
                .as_ref()
                .and_then(|options| options.first())
                .is_some_and(|first| first.child("solid").is_some());
            if solid {
                let color = StyleProps::from([("color".to_owned(), value)]);
                PropValue::Object(StyleProps::from([("solid".to_owned(), PropValue::Object(color))]))
            } else {
                value
            }
        }
        ResolvedType::Array => {
            PropValue::List(vec![PropValue::Object(StyleProps::from([("value".to_owned(), value)]))])
        }
        ResolvedType::Object => {
            let mut out = StyleProps::new();
            for (name, child) in schema.children.iter().flatten() {
                if child.required.iter().any(|r| r == name) {
                    out.insert(name.clone(), build_value(child, value.clone()));
                }
            }
            PropValue::Object(out)
        }
        _ => value,
    }
}
