//! The organizational structure as a nested-set tree.
//!
//! [`nested_set`] holds the pure interval arithmetic. [`TreeStore`] wraps it in a
//! unit of work against some storage: every mutating call either commits a state
//! that passes [`NestedSet::verify`] or leaves the stored tree untouched.

pub mod error;
pub mod memory;
pub mod nested_set;
pub mod node;
pub mod postgres;

pub use error::TreeError;
pub use memory::MemoryTreeStore;
pub use nested_set::{build_tree, default_name, Changes, NestedSet, NAME_MAX_LEN};
pub use node::{
    DeleteOutcome, NewNode, NodeId, NodeKind, NodeUpdate, PolicyFlags, Relocation, StructureNode,
    TreeNode, UpdateOutcome,
};
pub use postgres::PgTreeStore;

use async_trait::async_trait;

use crate::filter::StructureFilter;

/// Tree managed by the service
pub const DEFAULT_TREE_ID: i64 = 1;

#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Adds a node as the last child of its parent (the root when none is given)
    async fn create_node(&self, new: NewNode) -> Result<StructureNode, TreeError>;

    /// Moves a node with its subtree. Policy flags of the moved node are not consulted.
    async fn relocate(&self, id: NodeId, relocation: Relocation) -> Result<StructureNode, TreeError>;

    /// Rename, retype and relocate in one unit of work
    async fn update_node(&self, id: NodeId, update: NodeUpdate) -> Result<UpdateOutcome, TreeError>;

    async fn delete_node(&self, id: NodeId, recursive: bool) -> Result<DeleteOutcome, TreeError>;

    async fn read_subtree(&self, id: NodeId) -> Result<TreeNode, TreeError>;

    async fn get_node(&self, id: NodeId) -> Result<StructureNode, TreeError>;

    async fn root(&self) -> Result<StructureNode, TreeError>;

    /// Flat listing, filtered and ordered by the plan
    async fn list(&self, filter: &StructureFilter) -> Result<Vec<StructureNode>, TreeError>;

    /// Full invariant check of the stored tree. Returns the node count.
    async fn verify(&self) -> Result<usize, TreeError>;

    /// Storage reachability, for health checks
    async fn ping(&self) -> Result<(), TreeError>;

    fn backend(&self) -> &'static str;

    async fn move_inside(&self, id: NodeId, parent: NodeId) -> Result<StructureNode, TreeError> {
        self.relocate(id, Relocation::Inside(parent)).await
    }

    async fn move_before(&self, id: NodeId, sibling: NodeId) -> Result<StructureNode, TreeError> {
        self.relocate(id, Relocation::Before(sibling)).await
    }

    async fn move_after(&self, id: NodeId, sibling: NodeId) -> Result<StructureNode, TreeError> {
        self.relocate(id, Relocation::After(sibling)).await
    }
}
