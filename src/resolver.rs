//! `$ref`/`allOf`/`oneOf` expansion into navigable `ResolvedSchema` trees.
//!
//! Resolution never fails: an unresolvable or cyclic `$ref` degrades to a `ref` stub and
//! the rest of the tree resolves normally. Results are memoized per (node content, path)
//! in a cache owned by the resolver instance; entries are never evicted. A result that
//! contains a cycle cut depends on which definitions were being expanded at the time, so
//! it is never memoized.
pub mod all_of;
pub mod build;

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::schema::{
    definition_name, ResolvedSchema, ResolvedType, SchemaDocument, SchemaNode,
};

pub use build::build_value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

pub struct SchemaResolver {
    doc: SchemaDocument,
    cache: ResolveCache,
}

#[derive(Default)]
struct ResolveCache {
    entries: HashMap<(u64, String), ResolvedSchema>,
    expanding: Expansion,
}

/// Definitions currently being expanded, innermost last.
#[derive(Debug, Default)]
pub(crate) struct Expansion {
    stack: Vec<String>,
    /// Number of `$ref`s cut short so far because their definition was on the stack.
    cuts: usize,
}

/// One resolution pass: shared document plus the instance cache.
struct Pass<'a> {
    doc: &'a SchemaDocument,
    cache: &'a mut ResolveCache,
}

// ————————————————————————————————————————————————————————————————————————————
// FRONT API
// ————————————————————————————————————————————————————————————————————————————

impl SchemaResolver {
    pub fn new(doc: SchemaDocument) -> Self {
        Self { doc, cache: ResolveCache::default() }
    }

    pub fn document(&self) -> &SchemaDocument {
        &self.doc
    }

    /// Number of memoized (node, path) results.
    pub fn cached_len(&self) -> usize {
        self.cache.entries.len()
    }

    /// Resolve a node against this resolver's `definitions`. `path` only disambiguates
    /// cache entries.
    pub fn resolve(&mut self, node: &SchemaNode, path: &str) -> ResolvedSchema {
        Pass { doc: &self.doc, cache: &mut self.cache }.resolve(node, path)
    }

    /// Keys of `visualStyles.properties`, minus `*` and `$`-prefixed keys, in document order.
    pub fn get_visual_types(&self) -> Vec<String> {
        let Some(visuals) = self.doc.visual_styles() else {
            return Vec::new();
        };
        visuals
            .keys()
            .filter(|k| k.as_str() != "*" && !k.starts_with('$'))
            .cloned()
            .collect()
    }

    /// `None` when the document has no schema for `visual_type`.
    pub fn get_visual_schema(&mut self, visual_type: &str) -> Option<ResolvedSchema> {
        let Self { doc, cache } = self;
        let doc: &SchemaDocument = doc;
        let visual = doc.visual_styles()?.get(visual_type)?;
        // visualStyles.<visual>.properties['*'] holds the `$ref` to the visual definition
        let node = visual
            .properties
            .as_ref()
            .and_then(|props| props.get("*"))
            .unwrap_or(visual);
        Some(Pass { doc, cache }.resolve(node, &format!("visualStyles.{visual_type}")))
    }

    pub fn resolve_all(&mut self) -> IndexMap<String, ResolvedSchema> {
        let mut out = IndexMap::new();
        for visual_type in self.get_visual_types() {
            if let Some(schema) = self.get_visual_schema(&visual_type) {
                out.insert(visual_type, schema);
            }
        }
        out
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Expansion {
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.stack.iter().any(|n| n == name)
    }

    pub(crate) fn enter(&mut self, name: &str) {
        self.stack.push(name.to_owned());
    }

    pub(crate) fn leave(&mut self) {
        self.stack.pop();
    }

    pub(crate) fn cut(&mut self) {
        self.cuts += 1;
    }

    pub(crate) fn cuts(&self) -> usize {
        self.cuts
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

impl Pass<'_> {
    fn resolve(&mut self, node: &SchemaNode, path: &str) -> ResolvedSchema {
        let key = (node.content_hash(), path.to_owned());
        if let Some(hit) = self.cache.entries.get(&key) {
            log::trace!("cache hit at {path}");
            return hit.clone();
        }
        let cuts_before = self.cache.expanding.cuts();
        let resolved = self.resolve_uncached(node, path);
        if self.cache.expanding.cuts() == cuts_before {
            self.cache.entries.insert(key, resolved.clone());
        }
        resolved
    }

    fn resolve_uncached(&mut self, node: &SchemaNode, path: &str) -> ResolvedSchema {
        if let Some(pointer) = &node.ref_ {
            return self.resolve_ref(node, pointer, path);
        }
        if let Some(alternatives) = node.one_of.as_ref().or(node.any_of.as_ref()) {
            let options = alternatives
                .iter()
                .enumerate()
                .map(|(i, alt)| self.resolve(alt, &format!("{path}|{i}")))
                .collect();
            let mut out = ResolvedSchema::of_type(ResolvedType::OneOf).with_annotations(node);
            out.options = Some(options);
            return out;
        }
        if node.all_of.is_some() {
            let merged = all_of::merge_branches(self.doc, &mut self.cache.expanding, node);
            return self.resolve_object(&merged, path);
        }
        if let Some(values) = &node.enum_ {
            let mut out = ResolvedSchema::of_type(ResolvedType::Enum).with_annotations(node);
            out.enum_values = Some(values.clone());
            return out;
        }
        if node.is_object() {
            return self.resolve_object(node, path);
        }
        if node.is_array() {
            let mut out = ResolvedSchema::of_type(ResolvedType::Array).with_annotations(node);
            out.items = node
                .items
                .as_deref()
                .map(|items| Box::new(self.resolve(items, &format!("{path}[]"))));
            return out;
        }
        let type_name = node.type_.as_ref().and_then(|t| t.primary()).unwrap_or("string");
        ResolvedSchema::of_type(ResolvedType::from_type_name(type_name)).with_annotations(node)
    }

    fn resolve_ref(&mut self, node: &SchemaNode, pointer: &str, path: &str) -> ResolvedSchema {
        let name = definition_name(pointer);
        if self.cache.expanding.contains(name) {
            log::debug!("cyclic $ref {pointer} at {path}, not expanding");
            self.cache.expanding.cut();
            let mut stub = ref_stub(node, pointer);
            stub.cyclic = true;
            return stub;
        }
        let doc = self.doc;
        let Some(target) = doc.lookup_ref(pointer) else {
            log::warn!("unresolved $ref {pointer} at {path}");
            return ref_stub(node, pointer);
        };
        self.cache.expanding.enter(name);
        let mut out = self.resolve(target, path);
        self.cache.expanding.leave();
        // local metadata beats the definition's own
        if node.title.is_some() {
            out.title = node.title.clone();
        }
        if node.description.is_some() {
            out.description = node.description.clone();
        }
        out
    }

    fn resolve_object(&mut self, node: &SchemaNode, path: &str) -> ResolvedSchema {
        let mut children = IndexMap::new();
        for (name, child) in node.properties.iter().flatten() {
            let resolved = self.resolve(child, &format!("{path}.{name}"));
            children.insert(name.clone(), resolved);
        }
        let mut out = ResolvedSchema::of_type(ResolvedType::Object).with_annotations(node);
        out.children = Some(children);
        out
    }
}

fn ref_stub(node: &SchemaNode, pointer: &str) -> ResolvedSchema {
    let mut stub = ResolvedSchema::of_type(ResolvedType::Ref).with_annotations(node);
    stub.ref_path = Some(pointer.to_owned());
    stub
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeDecl;
    use serde_json::{json, Value};

    fn resolver(doc: Value) -> SchemaResolver {
        SchemaResolver::new(SchemaDocument::from_value(&doc).unwrap())
    }

    fn powerbi_like() -> Value {
        json!({
            "definitions": {
                "fill": {
                    "oneOf": [
                        { "type": "object", "properties": { "solid": { "type": "object", "properties": { "color": { "type": "string" } } } } },
                        { "type": "object", "properties": { "gradient": { "type": "object" } } }
                    ]
                },
                "commonCards": {
                    "type": "object",
                    "properties": {
                        "background": { "type": "array", "items": { "type": "object", "properties": {
                            "show": { "type": "boolean" },
                            "color": { "$ref": "#/definitions/fill", "title": "Background color" },
                            "transparency": { "type": "number", "minimum": 0, "maximum": 100 }
                        } } },
                        "title": { "type": "array", "items": { "type": "object", "properties": {
                            "fontSize": { "type": "number" }
                        } } }
                    }
                },
                "card": {
                    "allOf": [
                        { "$ref": "#/definitions/commonCards" },
                        { "type": "object", "properties": {
                            "labels": { "type": "array", "items": { "type": "object", "properties": {
                                "fontFamily": { "enum": ["Segoe UI", "Arial"] }
                            } } }
                        } }
                    ]
                }
            },
            "properties": {
                "visualStyles": {
                    "properties": {
                        "card": { "properties": { "*": { "$ref": "#/definitions/card" } } },
                        "*": { "properties": { "*": { "$ref": "#/definitions/commonCards" } } },
                        "slicer": { "properties": { "*": { "$ref": "#/definitions/missing" } } },
                        "$schema": { "type": "string" }
                    }
                }
            }
        })
    }

    #[test]
    fn visual_types_skip_wildcard_and_dollar_keys() {
        let r = resolver(powerbi_like());
        assert_eq!(r.get_visual_types(), vec!["card".to_string(), "slicer".to_string()]);
    }

    #[test]
    fn visual_types_empty_without_visual_styles() {
        let r = resolver(json!({ "definitions": {} }));
        assert!(r.get_visual_types().is_empty());
    }

    #[test]
    fn visual_schema_expands_all_of_and_refs() {
        let mut r = resolver(powerbi_like());
        let card = r.get_visual_schema("card").expect("card schema");
        assert_eq!(card.resolved_type, ResolvedType::Object);
        let keys = card.children.as_ref().unwrap().keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec!["background", "title", "labels"]);

        let item = card.child("background").unwrap().items.as_deref().unwrap();
        let color = item.child("color").unwrap();
        assert_eq!(color.resolved_type, ResolvedType::OneOf);
        assert_eq!(color.title.as_deref(), Some("Background color"));
        let options = color.options.as_ref().unwrap();
        assert_eq!(options.len(), 2);
        assert!(options[0].child("solid").is_some());

        let transparency = item.child("transparency").unwrap();
        assert_eq!(transparency.resolved_type, ResolvedType::Number);
        assert_eq!(transparency.maximum, Some(100.0));

        let font = card.child("labels").unwrap().items.as_deref().unwrap().child("fontFamily").unwrap();
        assert_eq!(font.resolved_type, ResolvedType::Enum);
        assert_eq!(font.enum_values.as_ref().unwrap(), &vec![json!("Segoe UI"), json!("Arial")]);
    }

    #[test]
    fn unknown_visual_is_absent() {
        let mut r = resolver(powerbi_like());
        assert!(r.get_visual_schema("waterfallChart").is_none());
    }

    #[test]
    fn unresolved_ref_degrades_to_stub() {
        let mut r = resolver(powerbi_like());
        let slicer = r.get_visual_schema("slicer").unwrap();
        assert_eq!(slicer.resolved_type, ResolvedType::Ref);
        assert_eq!(slicer.ref_path.as_deref(), Some("#/definitions/missing"));
        assert!(!slicer.cyclic);
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut r = resolver(powerbi_like());
        let first = r.get_visual_schema("card").unwrap();
        let cached = r.cached_len();
        let second = r.get_visual_schema("card").unwrap();
        assert_eq!(first, second);
        assert_eq!(r.cached_len(), cached);

        let node = SchemaNode::from_value(&json!({ "$ref": "#/definitions/fill" }));
        assert_eq!(r.resolve(&node, "x"), r.resolve(&node, "x"));
    }

    #[test]
    fn all_of_later_branch_wins() {
        let mut r = resolver(json!({
            "definitions": {
                "a": { "properties": { "x": { "type": "string" }, "y": { "type": "boolean" } }, "required": ["x"] }
            }
        }));
        let node = SchemaNode::from_value(&json!({
            "allOf": [
                { "$ref": "#/definitions/a" },
                { "properties": { "x": { "type": "number" } }, "required": ["x"] }
            ]
        }));
        let out = r.resolve(&node, "root");
        assert_eq!(out.resolved_type, ResolvedType::Object);
        assert_eq!(out.child("x").unwrap().resolved_type, ResolvedType::Number);
        assert_eq!(out.child("y").unwrap().resolved_type, ResolvedType::Boolean);
        assert_eq!(out.required, vec!["x".to_string(), "x".to_string()]);
    }

    #[test]
    fn ref_cycles_are_cut() {
        let mut r = resolver(json!({
            "definitions": {
                "node": { "type": "object", "properties": {
                    "label": { "type": "string" },
                    "next": { "$ref": "#/definitions/node" }
                } },
                "ping": { "$ref": "#/definitions/pong" },
                "pong": { "$ref": "#/definitions/ping" }
            }
        }));
        let list = r.resolve(&SchemaNode::from_value(&json!({ "$ref": "#/definitions/node" })), "root");
        let next = list.child("next").unwrap();
        assert_eq!(next.resolved_type, ResolvedType::Ref);
        assert!(next.cyclic);

        let ping = r.resolve(&SchemaNode::from_value(&json!({ "$ref": "#/definitions/ping" })), "root");
        assert_eq!(ping.resolved_type, ResolvedType::Ref);
        assert!(ping.cyclic);
    }

    #[test]
    fn hand_built_nodes_do_not_share_cache_entries() {
        let mut r = resolver(json!({}));
        let string = SchemaNode { type_: Some(TypeDecl::One("string".into())), ..SchemaNode::default() };
        let number = SchemaNode { type_: Some(TypeDecl::One("number".into())), ..SchemaNode::default() };
        assert_eq!(r.resolve(&string, "x").resolved_type, ResolvedType::String);
        assert_eq!(r.resolve(&number, "x").resolved_type, ResolvedType::Number);

        let mut edited = string.clone();
        edited.maximum = Some(5.0);
        assert_eq!(r.resolve(&edited, "x").maximum, Some(5.0));
    }

    #[test]
    fn cycle_cuts_do_not_depend_on_call_history() {
        let doc = json!({
            "definitions": {
                "A": { "type": "object", "properties": { "b": { "$ref": "#/definitions/B" } } },
                "B": { "type": "object", "properties": { "a": { "$ref": "#/definitions/A" } } }
            }
        });
        let ref_a = SchemaNode::from_value(&json!({ "$ref": "#/definitions/A" }));
        let ref_b = SchemaNode::from_value(&json!({ "$ref": "#/definitions/B" }));

        let fresh = resolver(doc.clone()).resolve(&ref_b, "v.b");
        let inner = fresh.child("a").unwrap().child("b").unwrap();
        assert!(inner.cyclic);
        assert_eq!(inner.ref_path.as_deref(), Some("#/definitions/B"));

        let mut warm = resolver(doc);
        warm.resolve(&ref_a, "v");
        assert_eq!(warm.resolve(&ref_b, "v.b"), fresh);
        assert_eq!(warm.cached_len(), 0);
    }

    #[test]
    fn array_and_primitive_fallbacks() {
        let mut r = resolver(json!({}));
        let untyped = r.resolve(&SchemaNode::from_value(&json!({ "type": "array" })), "a");
        assert_eq!(untyped.resolved_type, ResolvedType::Array);
        assert!(untyped.items.is_none());

        let listed = r.resolve(&SchemaNode::from_value(&json!({ "type": ["integer", "null"] })), "b");
        assert_eq!(listed.resolved_type, ResolvedType::Integer);

        let bare = r.resolve(&SchemaNode::from_value(&json!({ "title": "Anything" })), "c");
        assert_eq!(bare.resolved_type, ResolvedType::String);
        assert_eq!(bare.title.as_deref(), Some("Anything"));
    }

    #[test]
    fn any_of_resolves_like_one_of() {
        let mut r = resolver(json!({}));
        let out = r.resolve(
            &SchemaNode::from_value(&json!({ "anyOf": [{ "type": "number" }, { "type": "string" }] })),
            "root",
        );
        assert_eq!(out.resolved_type, ResolvedType::OneOf);
        let kinds = out.options.unwrap().into_iter().map(|o| o.resolved_type).collect::<Vec<_>>();
        assert_eq!(kinds, vec![ResolvedType::Number, ResolvedType::String]);
    }

    #[test]
    fn resolve_all_keeps_visual_order() {
        let mut r = resolver(powerbi_like());
        let all = r.resolve_all();
        assert_eq!(all.keys().cloned().collect::<Vec<_>>(), vec!["card", "slicer"]);
    }
}
