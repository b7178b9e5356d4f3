//! Explicit per-entity column registries.
//!
//! A registry is the only source of truth about which names a client may filter,
//! sort or select on. Each column carries its SQL identifier, its type and a plain
//! accessor so the same plan can run in SQL and against rows in memory.

use super::types::{ColumnType, ColumnValue};
use crate::tree::StructureNode;

pub struct Column<R> {
    /// Name used in query strings and JSON output
    pub name: &'static str,
    /// Identifier in the table
    pub sql: &'static str,
    pub kind: ColumnType,
    pub get: fn(&R) -> ColumnValue,
}

/// Attribute and relation names reachable through dotted field paths
pub struct EntityMeta {
    pub name: &'static str,
    pub attributes: &'static [&'static str],
    pub relations: &'static [Relation],
}

pub struct Relation {
    pub name: &'static str,
    pub target: fn() -> &'static EntityMeta,
}

impl EntityMeta {
    /// Whether `path` (e.g. `parent.name`, `children`) names something on this entity
    pub fn resolves(&self, path: &str) -> bool {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        match rest {
            None => {
                self.attributes.contains(&head) || self.relations.iter().any(|r| r.name == head)
            }
            Some(rest) => self
                .relations
                .iter()
                .find(|r| r.name == head)
                .map(|r| (r.target)().resolves(rest))
                .unwrap_or(false),
        }
    }
}

/// A row type the query translator can work with
pub trait Entity: Sized + 'static {
    /// Model name used in error messages
    const MODEL: &'static str;
    const TABLE: &'static str;
    /// Sort key for listings without `order_by`
    const DEFAULT_ORDER: &'static str;

    fn columns() -> &'static [Column<Self>];
    fn meta() -> &'static EntityMeta;

    fn column(name: &str) -> Option<&'static Column<Self>> {
        Self::columns().iter().find(|c| c.name == name)
    }
}

fn id(n: &StructureNode) -> ColumnValue {
    ColumnValue::Int(n.id.0)
}
fn name(n: &StructureNode) -> ColumnValue {
    ColumnValue::Text(n.name.clone())
}
fn kind(n: &StructureNode) -> ColumnValue {
    ColumnValue::Int(n.kind.code())
}
fn parent_id(n: &StructureNode) -> ColumnValue {
    n.parent_id.map_or(ColumnValue::Null, |p| ColumnValue::Int(p.0))
}
fn tree_id(n: &StructureNode) -> ColumnValue {
    ColumnValue::Int(n.tree_id)
}
fn lft(n: &StructureNode) -> ColumnValue {
    ColumnValue::Int(n.left)
}
fn rgt(n: &StructureNode) -> ColumnValue {
    ColumnValue::Int(n.right)
}
fn level(n: &StructureNode) -> ColumnValue {
    ColumnValue::Int(n.level)
}
fn insertable(n: &StructureNode) -> ColumnValue {
    ColumnValue::Bool(n.flags.insertable)
}
fn movable(n: &StructureNode) -> ColumnValue {
    ColumnValue::Bool(n.flags.movable)
}
fn updatable(n: &StructureNode) -> ColumnValue {
    ColumnValue::Bool(n.flags.updatable)
}
fn deletable(n: &StructureNode) -> ColumnValue {
    ColumnValue::Bool(n.flags.deletable)
}

static STRUCTURE_COLUMNS: [Column<StructureNode>; 12] = [
    Column { name: "id", sql: "id", kind: ColumnType::Integer, get: id },
    Column { name: "name", sql: "name", kind: ColumnType::Text, get: name },
    Column { name: "type", sql: "type", kind: ColumnType::Integer, get: kind },
    Column { name: "parent_id", sql: "parent_id", kind: ColumnType::Integer, get: parent_id },
    Column { name: "tree_id", sql: "tree_id", kind: ColumnType::Integer, get: tree_id },
    Column { name: "lft", sql: "lft", kind: ColumnType::Integer, get: lft },
    Column { name: "rgt", sql: "rgt", kind: ColumnType::Integer, get: rgt },
    Column { name: "level", sql: "level", kind: ColumnType::Integer, get: level },
    Column { name: "insertable", sql: "insertable", kind: ColumnType::Boolean, get: insertable },
    Column { name: "movable", sql: "movable", kind: ColumnType::Boolean, get: movable },
    Column { name: "updatable", sql: "updatable", kind: ColumnType::Boolean, get: updatable },
    Column { name: "deletable", sql: "deletable", kind: ColumnType::Boolean, get: deletable },
];

fn structure_meta() -> &'static EntityMeta {
    &STRUCTURE_META
}

static STRUCTURE_META: EntityMeta = EntityMeta {
    name: "OrganizationalStructure",
    attributes: &[
        "id", "name", "type", "parent_id", "tree_id", "lft", "rgt", "level", "insertable",
        "movable", "updatable", "deletable", "links",
    ],
    relations: &[
        Relation { name: "parent", target: structure_meta },
        Relation { name: "children", target: structure_meta },
    ],
};

impl Entity for StructureNode {
    const MODEL: &'static str = "OrganizationalStructure";
    const TABLE: &'static str = "organizational_structure";
    const DEFAULT_ORDER: &'static str = "lft";

    fn columns() -> &'static [Column<Self>] {
        &STRUCTURE_COLUMNS
    }

    fn meta() -> &'static EntityMeta {
        &STRUCTURE_META
    }
}
