use indexmap::IndexMap;

use super::Expansion;
use crate::schema::{definition_name, SchemaDocument, SchemaNode, TypeDecl};

/// Collapse an `allOf` node into one synthetic object node.
///
/// - `$ref` branches are replaced by their definition (chains followed).
/// - Nested `allOf` branches are flattened in place.
/// - `properties`: later branches overwrite earlier ones (last-wins).
/// - `required`: concatenated, duplicates kept.
///
/// The node's own `properties` come first so any branch can override them. A branch
/// whose `$ref` is already being expanded is skipped and recorded as a cut.
pub(crate) fn merge_branches(
    doc: &SchemaDocument,
    expanding: &mut Expansion,
    node: &SchemaNode,
) -> SchemaNode {
    let mut acc = Accumulated {
        properties: node.properties.clone().unwrap_or_default(),
        required: node.required.clone(),
    };
    for branch in node.all_of.iter().flatten() {
        absorb(doc, expanding, branch, &mut acc);
    }

    SchemaNode {
        type_: Some(TypeDecl::One("object".to_owned())),
        properties: Some(acc.properties),
        required: acc.required,
        title: node.title.clone(),
        description: node.description.clone(),
        additional_properties: node.additional_properties.clone(),
        ..SchemaNode::default()
    }
}

struct Accumulated {
    properties: IndexMap<String, SchemaNode>,
    required: Vec<String>,
}

fn absorb(
    doc: &SchemaDocument,
    expanding: &mut Expansion,
    branch: &SchemaNode,
    acc: &mut Accumulated,
) {
    if let Some(pointer) = &branch.ref_ {
        let name = definition_name(pointer);
        if expanding.contains(name) {
            log::debug!("cyclic $ref {pointer} inside allOf, skipping branch");
            expanding.cut();
            return;
        }
        let Some(target) = doc.lookup_ref(pointer) else {
            log::warn!("unresolved $ref {pointer} inside allOf, skipping branch");
            return;
        };
        expanding.enter(name);
        absorb(doc, expanding, target, acc);
        expanding.leave();
        return;
    }
    for nested in branch.all_of.iter().flatten() {
        absorb(doc, expanding, nested, acc);
    }
    for (name, prop) in branch.properties.iter().flatten() {
        acc.properties.insert(name.clone(), prop.clone());
    }
    acc.required.extend(branch.required.iter().cloned());
}
