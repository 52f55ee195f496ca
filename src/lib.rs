//! Power BI theme schema resolution and style cascade engine.
//!
//! - [`resolver`]: expand a theme JSON schema (`$ref`/`allOf`/`oneOf`) into per-visual trees.
//! - [`style`]: `"*"` → variant cascade, provenance, and minimal-override extraction.
//! - [`theme`]: theme documents edited through the cascade.
//! - [`form`]: what a schema-driven editor needs from a resolved schema.
pub mod error;
pub mod form;
pub mod path_de;
pub mod resolver;
pub mod schema;
pub mod style;
pub mod theme;

pub use error::{Error, Result};
pub use resolver::{build_value, SchemaResolver};
pub use schema::{ResolvedSchema, ResolvedType, SchemaDocument, SchemaNode};
pub use style::{
    compute_variant_style, extract_variant_overrides, get_property_sources, merge_styles,
    PropValue, PropertySource, StyleProps, VisualStyles,
};
pub use theme::ThemeDocument;
