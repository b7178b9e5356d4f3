use serde_json::{json, Map, Value};

use crate::filter::{Entity, FieldSelection};
use crate::tree::{StructureNode, TreeNode};

use super::STRUCTURE_PATH;

/// Hyperlinks for one element: itself and the collection it belongs to
pub fn links(node: &StructureNode) -> Value {
    json!({
        "self": format!("{}/{}", STRUCTURE_PATH, node.id),
        "collection": STRUCTURE_PATH,
    })
}

/// Plain columns of a node, keyed by their registry names
fn attributes(node: &StructureNode) -> Map<String, Value> {
    let mut obj = Map::new();
    for column in StructureNode::columns() {
        let value = serde_json::to_value((column.get)(node)).unwrap_or(Value::Null);
        obj.insert(column.name.to_string(), value);
    }
    obj.insert("links".into(), links(node));
    obj
}

/// Convert a node into the public wire format, with its parent nested when known
pub fn node_to_api_value(node: &StructureNode, parent: Option<&StructureNode>, selection: &FieldSelection) -> Value {
    let mut obj = attributes(node);
    if let Some(parent) = parent {
        obj.insert("parent".into(), Value::Object(attributes(parent)));
    }
    selection.apply(&mut obj);
    Value::Object(obj)
}

/// Nested drill-down of a subtree. Each element is projected on its own and
/// carries its `children` unless the selection excludes them.
pub fn tree_to_api_value(tree: &TreeNode, selection: &FieldSelection) -> Value {
    let mut obj = attributes(&tree.node);
    selection.apply(&mut obj);
    if selection.keeps_children() {
        let children: Vec<Value> = tree
            .children
            .iter()
            .map(|child| tree_to_api_value(child, selection))
            .collect();
        obj.insert("children".into(), Value::Array(children));
    }
    Value::Object(obj)
}

/// Single-element read: the subtree, with the parent of its top nested beside it
pub fn element_to_api_value(tree: &TreeNode, parent: Option<&StructureNode>, selection: &FieldSelection) -> Value {
    let mut obj = attributes(&tree.node);
    if let Some(parent) = parent {
        obj.insert("parent".into(), Value::Object(attributes(parent)));
    }
    selection.apply(&mut obj);
    if selection.keeps_children() {
        let children: Vec<Value> = tree
            .children
            .iter()
            .map(|child| tree_to_api_value(child, selection))
            .collect();
        obj.insert("children".into(), Value::Array(children));
    }
    Value::Object(obj)
}

pub fn list_to_api_value(nodes: &[StructureNode], selection: &FieldSelection) -> Value {
    Value::Array(
        nodes
            .iter()
            .map(|n| node_to_api_value(n, None, selection))
            .collect(),
    )
}
