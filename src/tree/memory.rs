use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::error::TreeError;
use super::nested_set::NestedSet;
use super::node::{
    DeleteOutcome, NewNode, NodeId, NodeUpdate, Relocation, StructureNode, TreeNode, UpdateOutcome,
};
use super::{TreeStore, DEFAULT_TREE_ID};
use crate::filter::StructureFilter;

struct MemoryState {
    set: NestedSet,
    /// Ids are never reused, even after the highest one is deleted
    next_id: i64,
}

/// Process-local store. Mutations run on a clone and are swapped in only after
/// they succeed, so readers never observe a half-applied change.
pub struct MemoryTreeStore {
    state: RwLock<MemoryState>,
    verify_invariants: bool,
}

impl MemoryTreeStore {
    /// A tree holding only the root, with id 1
    pub fn new(root_name: &str) -> Self {
        Self::from_set(NestedSet::with_root(NodeId(1), root_name, DEFAULT_TREE_ID))
    }

    pub fn from_set(set: NestedSet) -> Self {
        let next_id = set.max_id().map_or(1, |id| id.0 + 1);
        Self {
            state: RwLock::new(MemoryState { set, next_id }),
            verify_invariants: crate::config::config().tree.verify_invariants,
        }
    }

    /// Copy of the current tree
    pub async fn snapshot(&self) -> NestedSet {
        self.state.read().await.set.clone()
    }

    async fn mutate<T, F>(&self, op: F) -> Result<T, TreeError>
    where
        F: FnOnce(&mut NestedSet, NodeId) -> Result<T, TreeError>,
    {
        let mut state = self.state.write().await;
        let mut draft = state.set.clone();
        let out = op(&mut draft, NodeId(state.next_id))?;
        if self.verify_invariants {
            draft.verify()?;
        }
        if draft.max_id().map_or(false, |id| id.0 >= state.next_id) {
            state.next_id += 1;
        }
        state.set = draft;
        Ok(out)
    }
}

#[async_trait]
impl TreeStore for MemoryTreeStore {
    async fn create_node(&self, new: NewNode) -> Result<StructureNode, TreeError> {
        let node = self.mutate(|set, id| set.insert(id, new)).await?;
        debug!("Inserted node {} at [{}, {}]", node.id, node.left, node.right);
        Ok(node)
    }

    async fn relocate(&self, id: NodeId, relocation: Relocation) -> Result<StructureNode, TreeError> {
        self.mutate(|set, _| {
            set.relocate(id, relocation)?;
            set.node(id).cloned()
        })
        .await
    }

    async fn update_node(&self, id: NodeId, update: NodeUpdate) -> Result<UpdateOutcome, TreeError> {
        self.mutate(|set, _| set.update(id, &update)).await
    }

    async fn delete_node(&self, id: NodeId, recursive: bool) -> Result<DeleteOutcome, TreeError> {
        self.mutate(|set, _| set.delete(id, recursive)).await
    }

    async fn read_subtree(&self, id: NodeId) -> Result<TreeNode, TreeError> {
        self.state.read().await.set.subtree(id)
    }

    async fn get_node(&self, id: NodeId) -> Result<StructureNode, TreeError> {
        self.state.read().await.set.node(id).cloned()
    }

    async fn root(&self) -> Result<StructureNode, TreeError> {
        self.state.read().await.set.root().cloned()
    }

    async fn list(&self, filter: &StructureFilter) -> Result<Vec<StructureNode>, TreeError> {
        let state = self.state.read().await;
        Ok(filter.apply(state.set.in_order().into_iter().cloned()))
    }

    async fn verify(&self) -> Result<usize, TreeError> {
        let state = self.state.read().await;
        state.set.verify()?;
        Ok(state.set.len())
    }

    async fn ping(&self) -> Result<(), TreeError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{NodeKind, PolicyFlags};
    use std::sync::Arc;

    fn new_node(parent: i64, kind: NodeKind) -> NewNode {
        NewNode {
            parent_id: Some(NodeId(parent)),
            kind,
            name: None,
            flags: PolicyFlags::default(),
        }
    }

    #[tokio::test]
    async fn assigns_increasing_ids_without_reuse() {
        let store = MemoryTreeStore::new("Company");
        let a = store.create_node(new_node(1, NodeKind::Container)).await.unwrap();
        let b = store.create_node(new_node(1, NodeKind::Container)).await.unwrap();
        assert_eq!((a.id, b.id), (NodeId(2), NodeId(3)));

        store.delete_node(b.id, true).await.unwrap();
        let c = store.create_node(new_node(1, NodeKind::Leaf)).await.unwrap();
        assert_eq!(c.id, NodeId(4));
    }

    #[tokio::test]
    async fn failed_mutation_leaves_tree_and_ids_untouched() {
        let store = MemoryTreeStore::new("Company");
        let leaf = store.create_node(new_node(1, NodeKind::Leaf)).await.unwrap();
        let before = store.snapshot().await;

        let err = store.create_node(new_node(leaf.id.0, NodeKind::Leaf)).await.unwrap_err();
        assert!(matches!(err, TreeError::InvalidParent { .. }));
        assert_eq!(store.snapshot().await, before);

        let next = store.create_node(new_node(1, NodeKind::Leaf)).await.unwrap();
        assert_eq!(next.id, NodeId(3));
    }

    #[tokio::test]
    async fn move_helpers_delegate_to_relocate() {
        let store = MemoryTreeStore::new("Company");
        let a = store.create_node(new_node(1, NodeKind::Container)).await.unwrap();
        let b = store.create_node(new_node(1, NodeKind::Container)).await.unwrap();

        let moved = store.move_before(b.id, a.id).await.unwrap();
        assert_eq!(moved.left, 2);
        let moved = store.move_inside(a.id, b.id).await.unwrap();
        assert_eq!(moved.parent_id, Some(b.id));
        assert_eq!(store.verify().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn concurrent_inserts_keep_invariants() {
        let store = Arc::new(MemoryTreeStore::new("Company"));
        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let kind = if i % 3 == 0 { NodeKind::Leaf } else { NodeKind::Container };
                    store.create_node(new_node(1, kind)).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(store.verify().await.unwrap(), 33);
        assert_eq!(store.read_subtree(NodeId(1)).await.unwrap().size(), 33);
    }
}
