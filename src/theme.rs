//! Power BI theme JSON: `visualStyles` plus whatever else the theme carries
//! (`name`, `dataColors`, `textClasses`, ...), kept untouched.
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::style::{
    compute_variant_style, extract_variant_overrides, PropValue, StyleProps, VisualStyles,
    DEFAULT_VARIANT,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThemeDocument {
    pub visual_styles: VisualStyles,
    /// Every other top-level key, in document order.
    pub extra: IndexMap<String, Value>,
    /// Where `visualStyles` sat among the top-level keys, if the source had it.
    visual_styles_at: Option<usize>,
}

/// `visualStyles` goes back where it was loaded from. A theme that never had the key gets
/// it appended once it holds any style.
impl Serialize for ThemeDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let styles = (self.visual_styles_at.is_some() || !self.visual_styles.is_empty())
            .then_some(&self.visual_styles);
        let at = self.visual_styles_at.unwrap_or(self.extra.len()).min(self.extra.len());
        let mut map = serializer.serialize_map(Some(self.extra.len() + usize::from(styles.is_some())))?;
        for (i, (key, value)) in self.extra.iter().enumerate() {
            if let Some(styles) = styles.filter(|_| i == at) {
                map.serialize_entry("visualStyles", styles)?;
            }
            map.serialize_entry(key, value)?;
        }
        if let Some(styles) = styles.filter(|_| at == self.extra.len()) {
            map.serialize_entry("visualStyles", styles)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ThemeDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl ThemeDocument {
    pub fn from_str(src: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(src)?)
    }

    /// `visualStyles` is deserialized on its own so errors carry the path inside it.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(Error::NotAnObject);
        };
        let mut extra = map.into_iter().collect::<IndexMap<String, Value>>();
        let visual_styles_at = extra.get_index_of("visualStyles");
        let visual_styles = match extra.shift_remove("visualStyles") {
            None => VisualStyles::default(),
            Some(raw) => crate::path_de::from_value_with_path(raw).map_err(|error| match error {
                Error::Deserialize { path, message } => Error::Deserialize {
                    path: format!("visualStyles.{path}"),
                    message,
                },
                other => other,
            })?,
        };
        Ok(Self { visual_styles, extra, visual_styles_at })
    }

    pub fn to_string_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn name(&self) -> Option<&str> {
        self.extra.get("name").and_then(Value::as_str)
    }

    pub fn visual_types(&self) -> Vec<String> {
        self.visual_styles.visual_types().map(str::to_owned).collect()
    }

    pub fn variant_names(&self, visual: &str) -> Result<Vec<String>> {
        let variants = self
            .visual_styles
            .visual(visual)
            .ok_or_else(|| Error::UnknownVisual(visual.to_owned()))?;
        Ok(variants.keys().cloned().collect())
    }

    /// Effective style of a variant (the `"*"` style for unrecorded variants).
    pub fn variant_style(&self, visual: &str, variant: &str) -> Result<StyleProps> {
        compute_variant_style(&self.visual_styles, visual, variant)
            .ok_or_else(|| Error::UnknownVisual(visual.to_owned()))
    }

    /// Overrides recorded for a variant; empty for `"*"` and unrecorded variants.
    pub fn variant_overrides(&self, visual: &str, variant: &str) -> Result<StyleProps> {
        let variants = self
            .visual_styles
            .visual(visual)
            .ok_or_else(|| Error::UnknownVisual(visual.to_owned()))?;
        if variant == DEFAULT_VARIANT {
            return Ok(StyleProps::new());
        }
        Ok(variants.get(variant).cloned().unwrap_or_default())
    }

    /// Store `computed` as the effective style of `visual`/`variant`.
    ///
    /// `"*"` is stored verbatim. Any other variant stores only what differs from `"*"`;
    /// when nothing differs the variant entry is dropped. Returns what was stored.
    pub fn set_variant_style(&mut self, visual: &str, variant: &str, computed: StyleProps) -> StyleProps {
        if variant == DEFAULT_VARIANT {
            self.visual_styles.set_variant(visual, variant, computed.clone());
            return computed;
        }
        let base = self
            .visual_styles
            .variant(visual, DEFAULT_VARIANT)
            .cloned()
            .unwrap_or_default();
        let overrides = extract_variant_overrides(&base, &computed);
        if overrides.is_empty() {
            log::debug!("{visual}/{variant} matches the default style, dropping variant");
            self.visual_styles.visual_mut(visual).shift_remove(variant);
        } else {
            self.visual_styles.set_variant(visual, variant, overrides.clone());
        }
        overrides
    }

    /// Set one top-level property on the effective style of a variant.
    pub fn set_property(&mut self, visual: &str, variant: &str, property: &str, value: PropValue) -> StyleProps {
        let mut computed = self.variant_style(visual, variant).unwrap_or_default();
        computed.insert(property.to_owned(), value);
        self.set_variant_style(visual, variant, computed)
    }

    /// Drop a variant; `"*"` is reset to empty instead of removed.
    pub fn remove_variant(&mut self, visual: &str, variant: &str) -> Result<StyleProps> {
        if !self.visual_styles.contains_visual(visual) {
            return Err(Error::UnknownVisual(visual.to_owned()));
        }
        self.visual_styles
            .remove_variant(visual, variant)
            .ok_or_else(|| Error::UnknownVariant {
                visual: visual.to_owned(),
                variant: variant.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{props_from_value, props_to_value};
    use serde_json::json;

    fn sample() -> ThemeDocument {
        ThemeDocument::from_value(json!({
            "name": "Midnight",
            "dataColors": ["#118DFF", "#12239E"],
            "visualStyles": {
                "card": {
                    "*": { "background": [{ "$id": "*", "color": { "solid": { "color": "#FFFFFF" } } }] },
                    "dark": { "background": [{ "$id": "*", "color": { "solid": { "color": "#000000" } } }] }
                },
                "slicer": { "compact": { "items": [{ "padding": 2 }] } }
            }
        }))
        .unwrap()
    }

    #[test]
    fn loads_and_keeps_unknown_fields() {
        let theme = sample();
        assert_eq!(theme.name(), Some("Midnight"));
        assert_eq!(theme.extra["dataColors"], json!(["#118DFF", "#12239E"]));
        assert_eq!(theme.visual_types(), vec!["card", "slicer"]);
        assert_eq!(theme.variant_names("slicer").unwrap(), vec!["*", "compact"]);

        let again = ThemeDocument::from_str(&theme.to_string_pretty().unwrap()).unwrap();
        assert_eq!(again, theme);
    }

    #[test]
    fn saving_keeps_visual_styles_in_place() {
        let theme = ThemeDocument::from_value(json!({
            "name": "Plain",
            "visualStyles": {},
            "dataColors": ["#118DFF"]
        }))
        .unwrap();
        let saved = serde_json::to_value(&theme).unwrap();
        let keys = saved.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec!["name", "visualStyles", "dataColors"]);
        assert_eq!(saved["visualStyles"], json!({}));

        let mut bare = ThemeDocument::from_value(json!({ "name": "Bare" })).unwrap();
        assert_eq!(serde_json::to_value(&bare).unwrap(), json!({ "name": "Bare" }));
        bare.set_property("card", "*", "title", PropValue::from(json!([{ "show": true }])));
        let saved = serde_json::to_value(&bare).unwrap();
        let keys = saved.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec!["name", "visualStyles"]);
    }

    #[test]
    fn malformed_theme_reports_path() {
        let err = ThemeDocument::from_value(json!({ "visualStyles": { "card": { "*": 5 } } })).unwrap_err();
        match err {
            Error::Deserialize { path, .. } => assert_eq!(path, "visualStyles.card.*"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_object_theme_is_rejected() {
        assert!(matches!(ThemeDocument::from_str("[]"), Err(Error::NotAnObject)));
        assert!(serde_json::from_value::<ThemeDocument>(json!({ "visualStyles": 1 })).is_err());
    }

    #[test]
    fn variant_style_cascades() {
        let theme = sample();
        let dark = theme.variant_style("card", "dark").unwrap();
        assert_eq!(dark["background"].as_list().unwrap()[0].as_object().unwrap()["color"].solid_color(), Some("#000000"));
        assert!(matches!(theme.variant_style("table", "*"), Err(Error::UnknownVisual(_))));
    }

    #[test]
    fn storing_a_variant_keeps_only_deltas() {
        let mut theme = sample();
        let mut computed = theme.variant_style("card", "*").unwrap();
        computed.insert("border".into(), PropValue::from(json!([{ "show": true }])));
        let stored = theme.set_variant_style("card", "bordered", computed.clone());
        assert_eq!(props_to_value(&stored), json!({ "border": [{ "show": true }] }));
        assert_eq!(theme.variant_style("card", "bordered").unwrap(), computed);

        let same = theme.variant_style("card", "*").unwrap();
        let stored = theme.set_variant_style("card", "dark", same);
        assert!(stored.is_empty());
        assert!(!theme.variant_names("card").unwrap().contains(&"dark".to_string()));
    }

    #[test]
    fn set_property_on_new_visual() {
        let mut theme = ThemeDocument::default();
        let value = PropValue::from(json!([{ "show": false }]));
        theme.set_property("table", "*", "title", value.clone());
        assert_eq!(theme.variant_style("table", "*").unwrap()["title"], value);
        theme.set_property("table", "minimal", "title", value);
        assert!(theme.variant_overrides("table", "minimal").unwrap().is_empty());
    }

    #[test]
    fn removing_variants() {
        let mut theme = sample();
        let removed = theme.remove_variant("card", "dark").unwrap();
        assert_eq!(
            removed,
            props_from_value(json!({ "background": [{ "$id": "*", "color": { "solid": { "color": "#000000" } } }] })).unwrap()
        );
        assert!(matches!(theme.remove_variant("card", "dark"), Err(Error::UnknownVariant { .. })));
        assert!(matches!(theme.remove_variant("map", "*"), Err(Error::UnknownVisual(_))));
    }
}
