//! Raw and resolved schema trees.
//!
//! `SchemaNode` is the read-only view of one node of a JSON-Schema-like document. It is
//! built leniently from `serde_json::Value`: a field of the wrong shape is dropped (and
//! logged) instead of failing the whole document, since a single malformed branch must
//! not block resolution of unrelated visuals.
//!
//! `ResolvedSchema` is what the resolver hands to consumers: `$ref`/`allOf`/`oneOf` are
//! gone and every node carries an explicit `ResolvedType`.
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ————————————————————————————————————————————————————————————————————————————
// RAW NODES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Hash)]
pub enum TypeDecl {
    One(String),
    Many(Vec<String>),
}

impl TypeDecl {
    /// `type: "x"` → `x`; `type: ["x", "y"]` → `x`.
    pub fn primary(&self) -> Option<&str> {
        match self {
            TypeDecl::One(name) => Some(name.as_str()),
            TypeDecl::Many(names) => names.first().map(String::as_str),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        match self {
            TypeDecl::One(x) => x == name,
            TypeDecl::Many(xs) => xs.iter().any(|x| x == name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaNode {
    pub type_: Option<TypeDecl>,
    pub ref_: Option<String>,
    pub properties: Option<IndexMap<String, SchemaNode>>,
    pub items: Option<Box<SchemaNode>>,
    pub one_of: Option<Vec<SchemaNode>>,
    pub all_of: Option<Vec<SchemaNode>>,
    pub any_of: Option<Vec<SchemaNode>>,
    pub enum_: Option<Vec<Value>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub pattern: Option<String>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub required: Vec<String>,
    pub additional_properties: Option<AdditionalProperties>,
    /// Only meaningful on the document root.
    pub definitions: IndexMap<String, SchemaNode>,
}

impl SchemaNode {
    pub fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            if !value.is_boolean() {
                log::debug!("schema node is not an object: {value}");
            }
            return Self::default();
        };
        Self {
            type_: map.get("type").and_then(parse_type),
            ref_: string_field(map, "$ref"),
            properties: map.get("properties").and_then(parse_node_map),
            items: map.get("items").filter(|v| v.is_object()).map(|v| Box::new(Self::from_value(v))),
            one_of: map.get("oneOf").and_then(parse_node_list),
            all_of: map.get("allOf").and_then(parse_node_list),
            any_of: map.get("anyOf").and_then(parse_node_list),
            enum_: map.get("enum").and_then(Value::as_array).cloned(),
            title: string_field(map, "title"),
            description: string_field(map, "description"),
            minimum: map.get("minimum").and_then(Value::as_f64),
            maximum: map.get("maximum").and_then(Value::as_f64),
            pattern: string_field(map, "pattern"),
            min_items: map.get("minItems").and_then(Value::as_u64),
            max_items: map.get("maxItems").and_then(Value::as_u64),
            required: map
                .get("required")
                .and_then(Value::as_array)
                .map(|xs| xs.iter().filter_map(Value::as_str).map(str::to_owned).collect())
                .unwrap_or_default(),
            additional_properties: match map.get("additionalProperties") {
                Some(Value::Bool(b)) => Some(AdditionalProperties::Allowed(*b)),
                Some(v @ Value::Object(_)) => {
                    Some(AdditionalProperties::Schema(Box::new(Self::from_value(v))))
                }
                _ => None,
            },
            definitions: map.get("definitions").and_then(parse_node_map).unwrap_or_default(),
        }
    }

    /// `type === 'object'` or `properties` present.
    pub fn is_object(&self) -> bool {
        self.properties.is_some() || self.type_.as_ref().is_some_and(|t| t.is("object"))
    }

    pub fn is_array(&self) -> bool {
        self.type_.as_ref().is_some_and(|t| t.is("array"))
    }

    /// Deterministic hash of everything the node holds, however it was built. Map order
    /// is part of the identity since it decides child order in the resolved tree.
    pub fn content_hash(&self) -> u64 {
        let mut h = DefaultHasher::new();
        self.hash(&mut h);
        h.finish()
    }
}

impl Hash for SchemaNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_.hash(state);
        self.ref_.hash(state);
        hash_node_map(self.properties.as_ref(), state);
        self.items.hash(state);
        self.one_of.hash(state);
        self.all_of.hash(state);
        self.any_of.hash(state);
        self.enum_
            .as_ref()
            .map(|values| values.iter().map(Value::to_string).collect::<Vec<_>>())
            .hash(state);
        self.title.hash(state);
        self.description.hash(state);
        self.minimum.map(f64::to_bits).hash(state);
        self.maximum.map(f64::to_bits).hash(state);
        self.pattern.hash(state);
        self.min_items.hash(state);
        self.max_items.hash(state);
        self.required.hash(state);
        self.additional_properties.hash(state);
        hash_node_map(Some(&self.definitions), state);
    }
}

fn hash_node_map<H: Hasher>(map: Option<&IndexMap<String, SchemaNode>>, state: &mut H) {
    let Some(map) = map else {
        0u8.hash(state);
        return;
    };
    1u8.hash(state);
    map.len().hash(state);
    for (name, node) in map {
        name.hash(state);
        node.hash(state);
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            log::debug!("ignoring non-string `{key}`: {other}");
            None
        }
        None => None,
    }
}

fn parse_type(value: &Value) -> Option<TypeDecl> {
    match value {
        Value::String(s) => Some(TypeDecl::One(s.clone())),
        Value::Array(xs) => {
            let names = xs.iter().filter_map(Value::as_str).map(str::to_owned).collect::<Vec<_>>();
            if names.is_empty() { None } else { Some(TypeDecl::Many(names)) }
        }
        _ => None,
    }
}

fn parse_node_map(value: &Value) -> Option<IndexMap<String, SchemaNode>> {
    let map = value.as_object()?;
    Some(map.iter().map(|(k, v)| (k.clone(), SchemaNode::from_value(v))).collect())
}

fn parse_node_list(value: &Value) -> Option<Vec<SchemaNode>> {
    let xs = value.as_array()?;
    Some(xs.iter().map(SchemaNode::from_value).collect())
}

// ————————————————————————————————————————————————————————————————————————————
// DOCUMENT
// ————————————————————————————————————————————————————————————————————————————

/// A loaded schema document (one schema version).
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    pub root: SchemaNode,
}

impl SchemaDocument {
    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::NotAnObject);
        }
        Ok(Self { root: SchemaNode::from_value(value) })
    }

    pub fn from_str(src: &str) -> Result<Self> {
        let value = serde_json::from_str::<Value>(src)?;
        Self::from_value(&value)
    }

    pub fn definitions(&self) -> &IndexMap<String, SchemaNode> {
        &self.root.definitions
    }

    /// `#/definitions/name` → the definition named `name`.
    pub fn lookup_ref(&self, pointer: &str) -> Option<&SchemaNode> {
        self.root.definitions.get(definition_name(pointer))
    }

    /// `properties.visualStyles.properties`
    pub fn visual_styles(&self) -> Option<&IndexMap<String, SchemaNode>> {
        self.root
            .properties
            .as_ref()?
            .get("visualStyles")?
            .properties
            .as_ref()
    }
}

pub fn definition_name(pointer: &str) -> &str {
    pointer.strip_prefix("#/definitions/").unwrap_or(pointer)
}

// ————————————————————————————————————————————————————————————————————————————
// RESOLVED NODES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
    OneOf,
    Enum,
    Ref,
    /// Any other `type` name, kept verbatim.
    Other(String),
}

impl ResolvedType {
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "object" => Self::Object,
            "array" => Self::Array,
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "null" => Self::Null,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::OneOf => "oneOf",
            Self::Enum => "enum",
            Self::Ref => "ref",
            Self::Other(name) => name,
        }
    }
}

impl Serialize for ResolvedType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSchema {
    pub resolved_type: ResolvedType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<IndexMap<String, ResolvedSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ResolvedSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ResolvedSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_path: Option<String>,
    /// Set on a `ref` stub produced by the cycle guard.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cyclic: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
}

impl ResolvedSchema {
    pub fn of_type(resolved_type: ResolvedType) -> Self {
        Self {
            resolved_type,
            title: None,
            description: None,
            children: None,
            items: None,
            options: None,
            enum_values: None,
            ref_path: None,
            cyclic: false,
            required: Vec::new(),
            additional_properties: None,
            minimum: None,
            maximum: None,
            pattern: None,
            min_items: None,
            max_items: None,
        }
    }

    /// Copy metadata and scalar constraints from the raw node.
    pub(crate) fn with_annotations(mut self, node: &SchemaNode) -> Self {
        self.title = node.title.clone();
        self.description = node.description.clone();
        self.required = node.required.clone();
        self.additional_properties = match &node.additional_properties {
            Some(AdditionalProperties::Allowed(b)) => Some(*b),
            Some(AdditionalProperties::Schema(_)) => Some(true),
            None => None,
        };
        self.minimum = node.minimum;
        self.maximum = node.maximum;
        self.pattern = node.pattern.clone();
        self.min_items = node.min_items;
        self.max_items = node.max_items;
        self
    }

    pub fn child(&self, name: &str) -> Option<&ResolvedSchema> {
        self.children.as_ref()?.get(name)
    }

    pub fn is_unresolved(&self) -> bool {
        self.resolved_type == ResolvedType::Ref
    }
}

// ------------------------------- Tests ------------------------------------ //
