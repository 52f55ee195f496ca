use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use super::StyleProps;

/// Where a top-level property of a computed style came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertySource {
    /// Only the `"*"` style sets it.
    Inherited,
    /// The variant touches a key the base also has (even with an identical value).
    Overridden,
    /// Only the variant sets it.
    New,
}

impl fmt::Display for PropertySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PropertySource::Inherited => "inherited",
            PropertySource::Overridden => "overridden",
            PropertySource::New => "new",
        };
        f.write_str(label)
    }
}

/// Classify every key of `computed_style` by top-level presence in the two inputs.
pub fn get_property_sources(
    base_style: &StyleProps,
    variant_style: &StyleProps,
    computed_style: &StyleProps,
) -> IndexMap<String, PropertySource> {
    computed_style
        .keys()
        .map(|key| {
            let source = match (variant_style.contains_key(key), base_style.contains_key(key)) {
                (true, true) => PropertySource::Overridden,
                (true, false) => PropertySource::New,
                (false, _) => PropertySource::Inherited,
            };
            (key.clone(), source)
        })
        .collect()
}
