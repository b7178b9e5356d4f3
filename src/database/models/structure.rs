use sqlx::FromRow;

use crate::database::manager::DatabaseError;
use crate::tree::{NodeId, NodeKind, PolicyFlags, StructureNode};

/// Column list shared by every statement that reads whole rows
pub const STRUCTURE_COLUMNS: &str = "id, name, \"type\", parent_id, tree_id, lft, rgt, level, \
     insertable, movable, updatable, deletable";

/// One row of `organizational_structure` as stored
#[derive(Debug, Clone, FromRow)]
pub struct StructureRow {
    pub id: i64,
    pub name: String,
    #[sqlx(rename = "type")]
    pub kind: i64,
    pub parent_id: Option<i64>,
    pub tree_id: i64,
    pub lft: i64,
    pub rgt: i64,
    pub level: i64,
    pub insertable: bool,
    pub movable: bool,
    pub updatable: bool,
    pub deletable: bool,
}

impl TryFrom<StructureRow> for StructureNode {
    type Error = DatabaseError;

    fn try_from(row: StructureRow) -> Result<Self, Self::Error> {
        let kind = NodeKind::from_code(row.kind)
            .ok_or_else(|| DatabaseError::QueryError(format!("row {} has unknown type {}", row.id, row.kind)))?;
        Ok(StructureNode {
            id: NodeId(row.id),
            name: row.name,
            kind,
            parent_id: row.parent_id.map(NodeId),
            tree_id: row.tree_id,
            left: row.lft,
            right: row.rgt,
            level: row.level,
            flags: PolicyFlags {
                insertable: row.insertable,
                movable: row.movable,
                updatable: row.updatable,
                deletable: row.deletable,
            },
        })
    }
}

pub fn into_nodes(rows: Vec<StructureRow>) -> Result<Vec<StructureNode>, DatabaseError> {
    rows.into_iter().map(StructureNode::try_from).collect()
}
