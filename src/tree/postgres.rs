use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, error};

use super::error::TreeError;
use super::nested_set::{build_tree, Changes, NestedSet};
use super::node::{
    DeleteOutcome, NewNode, NodeId, NodeUpdate, Relocation, StructureNode, TreeNode, UpdateOutcome,
};
use super::{TreeStore, DEFAULT_TREE_ID};
use crate::database::models::structure::{into_nodes, StructureRow, STRUCTURE_COLUMNS};
use crate::database::QueryBuilder;
use crate::filter::{ColumnValue, StructureFilter};

/// Postgres-backed store.
///
/// Each mutation is one transaction: an advisory lock keyed by `tree_id`
/// serializes writers, the tree's rows are loaded `FOR UPDATE`, the pure
/// nested-set operation runs in process, and only the changed rows are written
/// back. Any error drops the transaction, which rolls it back.
pub struct PgTreeStore {
    pool: PgPool,
    tree_id: i64,
    verify_invariants: bool,
}

impl PgTreeStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_tree(pool, DEFAULT_TREE_ID)
    }

    /// Store over another tree of the same table
    pub fn with_tree(pool: PgPool, tree_id: i64) -> Self {
        Self {
            pool,
            tree_id,
            verify_invariants: crate::config::config().tree.verify_invariants,
        }
    }

    async fn begin(&self) -> Result<(Transaction<'static, Postgres>, NestedSet), TreeError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(self.tree_id)
            .execute(&mut *tx)
            .await?;
        let set = self.load(&mut tx).await?;
        Ok((tx, set))
    }

    async fn load(&self, conn: &mut PgConnection) -> Result<NestedSet, TreeError> {
        let rows = sqlx::query_as::<_, StructureRow>(&format!(
            "SELECT {} FROM organizational_structure WHERE tree_id = $1 ORDER BY lft FOR UPDATE",
            STRUCTURE_COLUMNS
        ))
        .bind(self.tree_id)
        .fetch_all(conn)
        .await?;
        Ok(NestedSet::from_nodes(into_nodes(rows)?))
    }

    /// Verifies the draft, writes the difference and commits
    async fn commit(
        &self,
        mut tx: Transaction<'static, Postgres>,
        before: &NestedSet,
        after: &NestedSet,
    ) -> Result<(), TreeError> {
        if self.verify_invariants {
            after.verify()?;
        }
        let changes = after.diff(before);
        if changes.is_empty() {
            debug!("Nothing to write for tree {}", self.tree_id);
            return Ok(tx.commit().await?);
        }
        debug!(
            "Writing {} inserted, {} updated, {} removed rows",
            changes.inserted.len(),
            changes.updated.len(),
            changes.removed.len()
        );
        write_changes(&mut tx, &changes).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn mutate<T, F>(&self, op: F) -> Result<T, TreeError>
    where
        F: FnOnce(&mut NestedSet) -> Result<T, TreeError> + Send,
    {
        let (tx, before) = self.begin().await?;
        let mut after = before.clone();
        let out = op(&mut after)?;
        self.commit(tx, &before, &after).await?;
        Ok(out)
    }
}

async fn next_id(conn: &mut PgConnection) -> Result<NodeId, TreeError> {
    let id: i64 = sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence('organizational_structure', 'id'))")
        .fetch_one(conn)
        .await?;
    Ok(NodeId(id))
}

async fn write_changes(tx: &mut Transaction<'static, Postgres>, changes: &Changes) -> Result<(), TreeError> {
    for node in &changes.inserted {
        sqlx::query(
            "INSERT INTO organizational_structure \
                (id, name, \"type\", parent_id, tree_id, lft, rgt, level, \
                 insertable, movable, updatable, deletable) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(node.id.0)
        .bind(&node.name)
        .bind(node.kind.code())
        .bind(node.parent_id.map(|p| p.0))
        .bind(node.tree_id)
        .bind(node.left)
        .bind(node.right)
        .bind(node.level)
        .bind(node.flags.insertable)
        .bind(node.flags.movable)
        .bind(node.flags.updatable)
        .bind(node.flags.deletable)
        .execute(&mut **tx)
        .await?;
    }

    if !changes.updated.is_empty() {
        let rows = &changes.updated;
        let ids: Vec<i64> = rows.iter().map(|n| n.id.0).collect();
        let names: Vec<String> = rows.iter().map(|n| n.name.clone()).collect();
        let kinds: Vec<i64> = rows.iter().map(|n| n.kind.code()).collect();
        // 0 stands for NULL inside the array
        let parents: Vec<i64> = rows.iter().map(|n| n.parent_id.map_or(0, |p| p.0)).collect();
        let trees: Vec<i64> = rows.iter().map(|n| n.tree_id).collect();
        let lfts: Vec<i64> = rows.iter().map(|n| n.left).collect();
        let rgts: Vec<i64> = rows.iter().map(|n| n.right).collect();
        let levels: Vec<i64> = rows.iter().map(|n| n.level).collect();

        sqlx::query(
            "UPDATE organizational_structure AS t SET \
                name = u.name, \"type\" = u.kind, parent_id = NULLIF(u.parent_id, 0), \
                tree_id = u.tree_id, lft = u.lft, rgt = u.rgt, level = u.level \
             FROM UNNEST($1::bigint[], $2::text[], $3::bigint[], $4::bigint[], \
                         $5::bigint[], $6::bigint[], $7::bigint[], $8::bigint[]) \
                  AS u(id, name, kind, parent_id, tree_id, lft, rgt, level) \
             WHERE t.id = u.id",
        )
        .bind(&ids)
        .bind(&names)
        .bind(&kinds)
        .bind(&parents)
        .bind(&trees)
        .bind(&lfts)
        .bind(&rgts)
        .bind(&levels)
        .execute(&mut **tx)
        .await?;
    }

    if !changes.removed.is_empty() {
        let ids: Vec<i64> = changes.removed.iter().map(|id| id.0).collect();
        sqlx::query("DELETE FROM organizational_structure WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl TreeStore for PgTreeStore {
    async fn create_node(&self, new: NewNode) -> Result<StructureNode, TreeError> {
        let (mut tx, before) = self.begin().await?;
        let id = next_id(&mut tx).await?;
        let mut after = before.clone();
        let node = after.insert(id, new)?;
        self.commit(tx, &before, &after).await?;
        Ok(node)
    }

    async fn relocate(&self, id: NodeId, relocation: Relocation) -> Result<StructureNode, TreeError> {
        self.mutate(move |set| {
            set.relocate(id, relocation)?;
            set.node(id).cloned()
        })
        .await
    }

    async fn update_node(&self, id: NodeId, update: NodeUpdate) -> Result<UpdateOutcome, TreeError> {
        self.mutate(move |set| set.update(id, &update)).await
    }

    async fn delete_node(&self, id: NodeId, recursive: bool) -> Result<DeleteOutcome, TreeError> {
        self.mutate(move |set| set.delete(id, recursive)).await
    }

    async fn read_subtree(&self, id: NodeId) -> Result<TreeNode, TreeError> {
        // One statement, one snapshot
        let rows = sqlx::query_as::<_, StructureRow>(&format!(
            "SELECT {} FROM organizational_structure AS c \
             JOIN organizational_structure AS p \
               ON c.tree_id = p.tree_id AND c.lft BETWEEN p.lft AND p.rgt \
             WHERE p.id = $1 AND p.tree_id = $2 ORDER BY c.lft",
            qualified_columns("c")
        ))
        .bind(id.0)
        .bind(self.tree_id)
        .fetch_all(&self.pool)
        .await?;
        build_tree(into_nodes(rows)?).ok_or(TreeError::NodeNotFound(id))
    }

    async fn get_node(&self, id: NodeId) -> Result<StructureNode, TreeError> {
        let row = sqlx::query_as::<_, StructureRow>(&format!(
            "SELECT {} FROM organizational_structure WHERE id = $1 AND tree_id = $2",
            STRUCTURE_COLUMNS
        ))
        .bind(id.0)
        .bind(self.tree_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TreeError::NodeNotFound(id))?;
        Ok(StructureNode::try_from(row)?)
    }

    async fn root(&self) -> Result<StructureNode, TreeError> {
        let row = sqlx::query_as::<_, StructureRow>(&format!(
            "SELECT {} FROM organizational_structure WHERE tree_id = $1 AND parent_id IS NULL",
            STRUCTURE_COLUMNS
        ))
        .bind(self.tree_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TreeError::MissingRoot)?;
        Ok(StructureNode::try_from(row)?)
    }

    async fn list(&self, filter: &StructureFilter) -> Result<Vec<StructureNode>, TreeError> {
        let scoped = filter
            .scoped("tree_id", ColumnValue::Int(self.tree_id))
            .map_err(|e| TreeError::Invariant(e.to_string()))?;
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<StructureRow> = QueryBuilder::new(&scoped).select_all(&mut conn).await?;
        Ok(into_nodes(rows)?)
    }

    async fn verify(&self) -> Result<usize, TreeError> {
        let mut tx = self.pool.begin().await?;
        let set = self.load(&mut tx).await?;
        tx.rollback().await?;
        set.verify().map_err(|e| {
            error!("Stored tree {} is inconsistent: {}", self.tree_id, e);
            e
        })?;
        Ok(set.len())
    }

    async fn ping(&self) -> Result<(), TreeError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

fn qualified_columns(alias: &str) -> String {
    STRUCTURE_COLUMNS
        .split(',')
        .map(|c| format!("{}.{}", alias, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifies_every_column() {
        let columns = qualified_columns("c");
        assert!(columns.starts_with("c.id, c.name, c.\"type\""));
        assert!(columns.ends_with("c.deletable"));
        assert_eq!(columns.matches("c.").count(), 12);
    }
}
