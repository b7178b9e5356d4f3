//! Nested-set interval arithmetic over an in-memory snapshot of one tree.
//!
//! Every mutating function validates all of its preconditions before touching a
//! single interval, so an `Err` always leaves the set exactly as it was. Stores
//! load a snapshot, call into this module inside their unit of work, verify the
//! result and persist the difference.
//!
//! Intervals of a tree with `n` nodes always cover `1..=2n` without gaps:
//! insertion opens a two-slot gap immediately before the parent's closing bound,
//! removal closes the gap left by a block, and a move is a removal followed by an
//! insertion of the whole block at the destination.

use std::collections::{BTreeMap, HashSet};

use super::error::TreeError;
use super::node::{
    DeleteOutcome, NewNode, NodeId, NodeKind, NodeUpdate, Relocation, StructureNode, TreeNode,
    UpdateOutcome,
};

/// Longest element name
pub const NAME_MAX_LEN: usize = 100;

/// All nodes of one tree, keyed by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestedSet {
    nodes: BTreeMap<NodeId, StructureNode>,
}

/// Row-level difference between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    pub inserted: Vec<StructureNode>,
    pub updated: Vec<StructureNode>,
    pub removed: Vec<NodeId>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

impl NestedSet {
    /// A tree holding only its root
    pub fn with_root(id: NodeId, name: impl Into<String>, tree_id: i64) -> Self {
        let root = StructureNode {
            id,
            name: name.into(),
            kind: NodeKind::Container,
            parent_id: None,
            tree_id,
            left: 1,
            right: 2,
            level: 1,
            flags: Default::default(),
        };
        Self::from_nodes([root])
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = StructureNode>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&StructureNode> {
        self.nodes.get(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&StructureNode, TreeError> {
        self.nodes.get(&id).ok_or(TreeError::NodeNotFound(id))
    }

    pub fn root(&self) -> Result<&StructureNode, TreeError> {
        self.nodes
            .values()
            .find(|n| n.parent_id.is_none())
            .ok_or(TreeError::MissingRoot)
    }

    /// Largest id in use
    pub fn max_id(&self) -> Option<NodeId> {
        self.nodes.keys().next_back().copied()
    }

    /// Document order (ascending left bound)
    pub fn in_order(&self) -> Vec<&StructureNode> {
        let mut out: Vec<&StructureNode> = self.nodes.values().collect();
        out.sort_by_key(|n| n.left);
        out
    }

    pub fn children(&self, id: NodeId) -> Vec<&StructureNode> {
        let mut out: Vec<&StructureNode> = self
            .nodes
            .values()
            .filter(|n| n.parent_id == Some(id))
            .collect();
        out.sort_by_key(|n| n.left);
        out
    }

    /// The node and its descendants in document order, selected by interval range
    pub fn subtree_rows(&self, id: NodeId) -> Result<Vec<StructureNode>, TreeError> {
        let top = self.node(id)?;
        let (tree_id, left, right) = (top.tree_id, top.left, top.right);
        let mut rows: Vec<StructureNode> = self
            .nodes
            .values()
            .filter(|n| n.tree_id == tree_id && n.left >= left && n.left <= right)
            .cloned()
            .collect();
        rows.sort_by_key(|n| n.left);
        Ok(rows)
    }

    pub fn subtree(&self, id: NodeId) -> Result<TreeNode, TreeError> {
        let rows = self.subtree_rows(id)?;
        build_tree(rows).ok_or(TreeError::NodeNotFound(id))
    }

    /// Adds `new` as the last child of its parent (the root when none is given)
    pub fn insert(&mut self, id: NodeId, new: NewNode) -> Result<StructureNode, TreeError> {
        if self.nodes.contains_key(&id) {
            return Err(TreeError::Invariant(format!("id {} is already in use", id)));
        }
        let parent = match new.parent_id {
            Some(pid) => self.nodes.get(&pid).ok_or(TreeError::ParentNotFound(pid))?,
            None => self.root()?,
        };
        if parent.is_leaf() {
            return Err(TreeError::InvalidParent {
                id: parent.id,
                name: parent.name.clone(),
                reason: "positions can't hold other elements",
            });
        }
        if !parent.flags.insertable {
            return Err(TreeError::InvalidParent {
                id: parent.id,
                name: parent.name.clone(),
                reason: "it is not insertable",
            });
        }

        let name = match new.name {
            Some(name) => name,
            None => default_name(new.kind, parent),
        };
        let node = StructureNode {
            id,
            name,
            kind: new.kind,
            parent_id: Some(parent.id),
            tree_id: parent.tree_id,
            left: parent.right,
            right: parent.right + 1,
            level: parent.level + 1,
            flags: new.flags,
        };

        self.shift(node.tree_id, node.left, 2);
        self.nodes.insert(id, node.clone());
        Ok(node)
    }

    pub fn move_inside(&mut self, id: NodeId, parent: NodeId) -> Result<(), TreeError> {
        self.relocate(id, Relocation::Inside(parent))
    }

    pub fn move_before(&mut self, id: NodeId, sibling: NodeId) -> Result<(), TreeError> {
        self.relocate(id, Relocation::Before(sibling))
    }

    pub fn move_after(&mut self, id: NodeId, sibling: NodeId) -> Result<(), TreeError> {
        self.relocate(id, Relocation::After(sibling))
    }

    pub fn relocate(&mut self, id: NodeId, relocation: Relocation) -> Result<(), TreeError> {
        self.check_relocation(id, relocation)?;
        self.splice(id, relocation);
        Ok(())
    }

    /// Rename, retype and relocate as one step. Policy flags of the node itself are
    /// enforced here: `updatable` for name/type, `movable` for relocation.
    pub fn update(&mut self, id: NodeId, update: &NodeUpdate) -> Result<UpdateOutcome, TreeError> {
        let current = self.node(id)?.clone();
        if update.is_empty() {
            return Ok(UpdateOutcome {
                previous_name: current.name.clone(),
                node: current,
                changed: false,
            });
        }

        if (update.name.is_some() || update.kind.is_some()) && !current.flags.updatable {
            return Err(TreeError::Forbidden {
                name: current.name,
                flag: "updatable",
            });
        }
        let retype = update.kind.filter(|k| *k != current.kind);
        if let Some(kind) = retype {
            if current.is_root() {
                return Err(TreeError::RootProtected { action: "retyped" });
            }
            if kind == NodeKind::Leaf && current.has_children() {
                return Err(TreeError::LeafWithChildren {
                    children: current.descendant_count(),
                    name: current.name,
                });
            }
        }
        if let Some(relocation) = update.relocation {
            if current.is_root() {
                return Err(TreeError::RootProtected { action: "moved" });
            }
            if !current.flags.movable {
                return Err(TreeError::Forbidden {
                    name: current.name,
                    flag: "movable",
                });
            }
            self.check_relocation(id, relocation)?;
        }

        let rename = update.name.clone().filter(|n| *n != current.name);
        let changed = rename.is_some() || retype.is_some() || update.relocation.is_some();
        if let Some(node) = self.nodes.get_mut(&id) {
            if let Some(name) = rename {
                node.name = name;
            }
            if let Some(kind) = retype {
                node.kind = kind;
            }
        }
        if let Some(relocation) = update.relocation {
            self.splice(id, relocation);
        }

        Ok(UpdateOutcome {
            node: self.node(id)?.clone(),
            previous_name: current.name,
            changed,
        })
    }

    /// Removes a node.
    ///
    /// Non-recursive: the direct children take the node's place under its parent.
    /// Recursive: the whole block goes, except descendants marked non-deletable,
    /// which are lifted (with their own subtrees) to the node's place first.
    pub fn delete(&mut self, id: NodeId, recursive: bool) -> Result<DeleteOutcome, TreeError> {
        let node = self.node(id)?.clone();
        if node.is_root() {
            return Err(TreeError::RootProtected { action: "deleted" });
        }
        if !node.flags.deletable {
            return Err(TreeError::Forbidden {
                name: node.name,
                flag: "deletable",
            });
        }

        if recursive {
            let rescued = self.protected_descendants(&node);
            // Reverse document order so each one lands in front of the previous
            for rescued_id in rescued.iter().rev() {
                self.splice(*rescued_id, Relocation::After(id));
            }
            let removed = self.take_block(id).into_iter().map(|n| n.id).collect();
            Ok(DeleteOutcome {
                removed,
                reparented: rescued,
                name: node.name,
            })
        } else {
            let reparented = self.lift_children(&node);
            Ok(DeleteOutcome {
                removed: vec![id],
                reparented,
                name: node.name,
            })
        }
    }

    /// Checks every invariant of the encoding
    pub fn verify(&self) -> Result<(), TreeError> {
        if self.is_empty() {
            return Err(TreeError::MissingRoot);
        }
        let roots: Vec<&StructureNode> = self.nodes.values().filter(|n| n.is_root()).collect();
        match roots.as_slice() {
            [root] if root.left == 1 => {}
            [root] => {
                return Err(TreeError::Invariant(format!(
                    "root {} starts at {} instead of 1",
                    root.id, root.left
                )))
            }
            [] => return Err(TreeError::MissingRoot),
            many => {
                return Err(TreeError::Invariant(format!("{} roots found", many.len())));
            }
        }

        let ordered = self.in_order();
        let count = ordered.len() as i64;
        let mut bounds = HashSet::with_capacity(ordered.len() * 2);
        for node in &ordered {
            if node.left >= node.right {
                return Err(TreeError::Invariant(format!(
                    "node {} has empty interval [{}, {}]",
                    node.id, node.left, node.right
                )));
            }
            if node.tree_id != ordered[0].tree_id {
                return Err(TreeError::Invariant(format!("node {} belongs to another tree", node.id)));
            }
            for bound in [node.left, node.right] {
                if bound < 1 || bound > 2 * count || !bounds.insert(bound) {
                    return Err(TreeError::Invariant(format!(
                        "bound {} of node {} is out of range or duplicated",
                        bound, node.id
                    )));
                }
            }
        }

        let lefts: Vec<i64> = ordered.iter().map(|n| n.left).collect();
        let mut open: Vec<&StructureNode> = Vec::new();
        for (index, node) in ordered.iter().enumerate() {
            while open.last().map_or(false, |top| top.right < node.left) {
                open.pop();
            }
            let expected_parent = open.last().map(|p| p.id);
            if node.parent_id != expected_parent {
                return Err(TreeError::Invariant(format!(
                    "node {} has parent {:?} but its interval lies in {:?}",
                    node.id, node.parent_id, expected_parent
                )));
            }
            if let Some(parent) = open.last() {
                if node.right > parent.right {
                    return Err(TreeError::Invariant(format!(
                        "node {} overlaps the end of its parent {}",
                        node.id, parent.id
                    )));
                }
                if parent.is_leaf() {
                    return Err(TreeError::Invariant(format!(
                        "position {} has child {}",
                        parent.id, node.id
                    )));
                }
            }
            if node.level != open.len() as i64 + 1 {
                return Err(TreeError::Invariant(format!(
                    "node {} has level {} at depth {}",
                    node.id,
                    node.level,
                    open.len() + 1
                )));
            }
            let descendants = lefts[index + 1..].partition_point(|l| *l < node.right) as i64;
            if node.right - node.left != 2 * descendants + 1 {
                return Err(TreeError::Invariant(format!(
                    "node {} spans {} but has {} descendants",
                    node.id,
                    node.right - node.left,
                    descendants
                )));
            }
            open.push(node);
        }
        Ok(())
    }

    /// Rows of `self` that differ from `before`
    pub fn diff(&self, before: &NestedSet) -> Changes {
        let mut changes = Changes::default();
        for (id, node) in &self.nodes {
            match before.nodes.get(id) {
                None => changes.inserted.push(node.clone()),
                Some(old) if old != node => changes.updated.push(node.clone()),
                Some(_) => {}
            }
        }
        changes.removed = before
            .nodes
            .keys()
            .filter(|id| !self.nodes.contains_key(id))
            .copied()
            .collect();
        changes
    }

    fn check_relocation(&self, id: NodeId, relocation: Relocation) -> Result<(), TreeError> {
        let node = self.node(id)?;
        if node.is_root() {
            return Err(TreeError::RootProtected { action: "moved" });
        }
        let target_id = relocation.target();
        let target = self
            .nodes
            .get(&target_id)
            .ok_or(TreeError::TargetNotFound(target_id))?;

        if target_id != id && node.contains(target) {
            return Err(invalid_target(target, "it lies inside the element being moved"));
        }

        match relocation {
            Relocation::Inside(_) => {
                if target_id == id {
                    return Err(invalid_target(target, "an element can't be moved inside itself"));
                }
                if target.is_leaf() {
                    return Err(invalid_target(target, "positions can't hold other elements"));
                }
                if !target.flags.insertable {
                    return Err(invalid_target(target, "it is not insertable"));
                }
                if node.parent_id == Some(target_id) {
                    return Err(TreeError::NoOp { name: node.name.clone() });
                }
            }
            Relocation::Before(_) | Relocation::After(_) => {
                if target_id == id {
                    return Err(TreeError::NoOp { name: node.name.clone() });
                }
                let parent_id = target
                    .parent_id
                    .ok_or_else(|| invalid_target(target, "the root has no siblings"))?;
                let parent = self.node(parent_id)?;
                if !parent.flags.insertable {
                    return Err(invalid_target(target, "its parent is not insertable"));
                }
                let in_place = node.parent_id == target.parent_id
                    && match relocation {
                        Relocation::Before(_) => node.right + 1 == target.left,
                        _ => target.right + 1 == node.left,
                    };
                if in_place {
                    return Err(TreeError::NoOp { name: node.name.clone() });
                }
            }
        }
        Ok(())
    }

    /// Detaches the block of `id` and re-inserts it at `relocation`. Unchecked.
    fn splice(&mut self, id: NodeId, relocation: Relocation) {
        let mut block = self.take_block(id);
        let Some(block_root) = block.iter().find(|n| n.id == id).cloned() else {
            return;
        };
        let target_id = relocation.target();
        let Some(target) = self.nodes.get(&target_id).cloned() else {
            return;
        };

        let (position, parent_id, level) = match relocation {
            Relocation::Inside(_) => (target.right, Some(target.id), target.level + 1),
            Relocation::Before(_) => (target.left, target.parent_id, target.level),
            Relocation::After(_) => (target.right + 1, target.parent_id, target.level),
        };
        let width = block_root.width();
        let offset = position - block_root.left;
        let level_delta = level - block_root.level;

        self.shift(target.tree_id, position, width);
        for node in block.iter_mut() {
            node.left += offset;
            node.right += offset;
            node.level += level_delta;
            node.tree_id = target.tree_id;
            if node.id == id {
                node.parent_id = parent_id;
            }
        }
        self.nodes.extend(block.into_iter().map(|n| (n.id, n)));
    }

    /// Removes the node and its descendants, closing the gap they leave
    fn take_block(&mut self, id: NodeId) -> Vec<StructureNode> {
        let Some(top) = self.nodes.get(&id).cloned() else {
            return Vec::new();
        };
        let ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.tree_id == top.tree_id && n.left >= top.left && n.left <= top.right)
            .map(|n| n.id)
            .collect();
        let mut block: Vec<StructureNode> = ids.iter().filter_map(|i| self.nodes.remove(i)).collect();
        block.sort_by_key(|n| n.left);
        self.shift(top.tree_id, top.right + 1, -top.width());
        block
    }

    /// Removes a single node; its direct children move up one level in its place
    fn lift_children(&mut self, node: &StructureNode) -> Vec<NodeId> {
        let mut lifted = Vec::new();
        for child in self.nodes.values_mut() {
            if child.tree_id != node.tree_id || child.left <= node.left || child.left >= node.right {
                continue;
            }
            child.left -= 1;
            child.right -= 1;
            child.level -= 1;
            if child.parent_id == Some(node.id) {
                child.parent_id = node.parent_id;
                lifted.push((child.left, child.id));
            }
        }
        self.nodes.remove(&node.id);
        self.shift(node.tree_id, node.right + 1, -2);
        lifted.sort();
        lifted.into_iter().map(|(_, id)| id).collect()
    }

    /// Outermost non-deletable descendants, in document order
    fn protected_descendants(&self, node: &StructureNode) -> Vec<NodeId> {
        let mut rescued: Vec<&StructureNode> = Vec::new();
        let mut candidates: Vec<&StructureNode> = self
            .nodes
            .values()
            .filter(|n| node.contains(n) && !n.flags.deletable)
            .collect();
        candidates.sort_by_key(|n| n.left);
        for candidate in candidates {
            if !rescued.iter().any(|r| r.contains(candidate)) {
                rescued.push(candidate);
            }
        }
        rescued.into_iter().map(|n| n.id).collect()
    }

    /// Moves every bound `>= from` by `delta`
    fn shift(&mut self, tree_id: i64, from: i64, delta: i64) {
        for node in self.nodes.values_mut().filter(|n| n.tree_id == tree_id) {
            if node.left >= from {
                node.left += delta;
            }
            if node.right >= from {
                node.right += delta;
            }
        }
    }
}

/// Name given to an element created without one
pub fn default_name(kind: NodeKind, parent: &StructureNode) -> String {
    let name = if parent.is_root() {
        format!("New {}", kind.label())
    } else {
        format!("New {} of «{}»", kind.label(), parent.name)
    };
    name.chars().take(NAME_MAX_LEN).collect()
}

/// Nests rows that are already sorted by left bound. The first row becomes the top.
pub fn build_tree(rows: Vec<StructureNode>) -> Option<TreeNode> {
    let mut open: Vec<TreeNode> = Vec::new();
    let mut top: Option<TreeNode> = None;

    for node in rows {
        while open.last().map_or(false, |last| last.node.right < node.left) {
            if let Some(done) = open.pop() {
                attach(&mut open, &mut top, done);
            }
        }
        open.push(TreeNode {
            node,
            children: Vec::new(),
        });
    }
    while let Some(done) = open.pop() {
        attach(&mut open, &mut top, done);
    }
    top
}

fn attach(open: &mut [TreeNode], top: &mut Option<TreeNode>, done: TreeNode) {
    match open.last_mut() {
        Some(parent) => parent.children.push(done),
        None => {
            if top.is_none() {
                *top = Some(done);
            }
        }
    }
}

fn invalid_target(target: &StructureNode, reason: &'static str) -> TreeError {
    TreeError::InvalidTarget {
        id: target.id,
        name: target.name.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::PolicyFlags;

    fn new_node(parent: Option<i64>, kind: NodeKind, name: &str) -> NewNode {
        NewNode {
            parent_id: parent.map(NodeId),
            kind,
            name: Some(name.to_string()),
            flags: PolicyFlags::default(),
        }
    }

    /// root(1) -> A(2) -> {X(3), Y(4)}, B(5)
    fn sample() -> NestedSet {
        let mut set = NestedSet::with_root(NodeId(1), "root", 1);
        set.insert(NodeId(2), new_node(Some(1), NodeKind::Container, "A")).unwrap();
        set.insert(NodeId(3), new_node(Some(2), NodeKind::Leaf, "X")).unwrap();
        set.insert(NodeId(4), new_node(Some(2), NodeKind::Leaf, "Y")).unwrap();
        set.insert(NodeId(5), new_node(Some(1), NodeKind::Container, "B")).unwrap();
        set.verify().unwrap();
        set
    }

    fn child_ids(set: &NestedSet, id: i64) -> Vec<i64> {
        set.children(NodeId(id)).iter().map(|n| n.id.0).collect()
    }

    fn bounds(set: &NestedSet, id: i64) -> (i64, i64) {
        let n = set.get(NodeId(id)).unwrap();
        (n.left, n.right)
    }

    #[test]
    fn insert_lands_before_parent_closing_bound() {
        let set = sample();
        assert_eq!(bounds(&set, 1), (1, 10));
        assert_eq!(bounds(&set, 2), (2, 7));
        assert_eq!(bounds(&set, 3), (3, 4));
        assert_eq!(bounds(&set, 4), (5, 6));
        assert_eq!(bounds(&set, 5), (8, 9));
        assert_eq!(set.get(NodeId(3)).unwrap().level, 3);
    }

    #[test]
    fn insert_defaults_to_root_and_generated_names() {
        let mut set = sample();
        let mut new = new_node(None, NodeKind::Container, "");
        new.name = None;
        let top = set.insert(NodeId(6), new).unwrap();
        assert_eq!(top.parent_id, Some(NodeId(1)));
        assert_eq!(top.name, "New department");

        let mut nested = new_node(Some(2), NodeKind::Leaf, "");
        nested.name = None;
        let pos = set.insert(NodeId(7), nested).unwrap();
        assert_eq!(pos.name, "New position of «A»");
        set.verify().unwrap();
    }

    #[test]
    fn inserted_node_reads_back_as_single_node_tree() {
        let mut set = sample();
        let created = set.insert(NodeId(9), new_node(Some(5), NodeKind::Leaf, "Z")).unwrap();
        let tree = set.subtree(NodeId(9)).unwrap();
        assert_eq!(tree.node, created);
        assert!(tree.children.is_empty());
        assert_eq!(tree.node.name, "Z");
        assert_eq!(tree.node.kind, NodeKind::Leaf);
    }

    #[test]
    fn insert_under_leaf_is_rejected_without_change() {
        let mut set = sample();
        let before = set.clone();
        let err = set.insert(NodeId(6), new_node(Some(3), NodeKind::Leaf, "P")).unwrap_err();
        assert!(matches!(err, TreeError::InvalidParent { .. }));
        assert_eq!(set, before);
    }

    #[test]
    fn insert_under_missing_or_closed_parent_fails() {
        let mut set = sample();
        let err = set.insert(NodeId(6), new_node(Some(42), NodeKind::Leaf, "P")).unwrap_err();
        assert!(matches!(err, TreeError::ParentNotFound(NodeId(42))));

        set.nodes.get_mut(&NodeId(5)).unwrap().flags.insertable = false;
        let err = set.insert(NodeId(6), new_node(Some(5), NodeKind::Leaf, "P")).unwrap_err();
        assert!(matches!(err, TreeError::InvalidParent { .. }));
    }

    #[test]
    fn move_inside_appends_as_last_child() {
        let mut set = sample();
        set.move_inside(NodeId(3), NodeId(5)).unwrap();
        set.verify().unwrap();
        assert_eq!(child_ids(&set, 2), vec![4]);
        assert_eq!(child_ids(&set, 5), vec![3]);

        set.move_inside(NodeId(2), NodeId(5)).unwrap();
        set.verify().unwrap();
        assert_eq!(child_ids(&set, 1), vec![5]);
        assert_eq!(child_ids(&set, 5), vec![3, 2]);
        assert_eq!(set.get(NodeId(4)).unwrap().level, 4);
    }

    #[test]
    fn move_inside_current_parent_is_noop() {
        let mut set = sample();
        let before = set.clone();
        let err = set.move_inside(NodeId(3), NodeId(2)).unwrap_err();
        assert!(matches!(err, TreeError::NoOp { .. }));
        assert_eq!(set, before);
    }

    #[test]
    fn move_into_own_subtree_is_rejected() {
        let mut set = sample();
        set.insert(NodeId(6), new_node(Some(2), NodeKind::Container, "A1")).unwrap();
        let before = set.clone();
        assert!(matches!(
            set.move_inside(NodeId(2), NodeId(6)).unwrap_err(),
            TreeError::InvalidTarget { .. }
        ));
        assert!(matches!(
            set.move_inside(NodeId(2), NodeId(2)).unwrap_err(),
            TreeError::InvalidTarget { .. }
        ));
        assert!(matches!(
            set.move_before(NodeId(2), NodeId(3)).unwrap_err(),
            TreeError::InvalidTarget { .. }
        ));
        assert_eq!(set, before);
    }

    #[test]
    fn move_inside_leaf_or_missing_target_fails() {
        let mut set = sample();
        assert!(matches!(
            set.move_inside(NodeId(5), NodeId(3)).unwrap_err(),
            TreeError::InvalidTarget { .. }
        ));
        assert!(matches!(
            set.move_inside(NodeId(5), NodeId(77)).unwrap_err(),
            TreeError::TargetNotFound(NodeId(77))
        ));
    }

    #[test]
    fn move_after_lands_directly_after_sibling() {
        let mut set = sample();
        set.insert(NodeId(6), new_node(Some(2), NodeKind::Leaf, "Z")).unwrap();
        // A: X, Y, Z
        set.move_after(NodeId(3), NodeId(4)).unwrap();
        set.verify().unwrap();
        assert_eq!(child_ids(&set, 2), vec![4, 3, 6]);

        set.move_after(NodeId(4), NodeId(6)).unwrap();
        set.verify().unwrap();
        assert_eq!(child_ids(&set, 2), vec![3, 6, 4]);
    }

    #[test]
    fn move_before_leftmost_sibling_works() {
        let mut set = sample();
        set.move_before(NodeId(4), NodeId(3)).unwrap();
        set.verify().unwrap();
        assert_eq!(child_ids(&set, 2), vec![4, 3]);

        set.move_before(NodeId(5), NodeId(2)).unwrap();
        set.verify().unwrap();
        assert_eq!(child_ids(&set, 1), vec![5, 2]);
    }

    #[test]
    fn move_next_to_sibling_in_another_parent() {
        let mut set = sample();
        set.insert(NodeId(6), new_node(Some(5), NodeKind::Leaf, "W")).unwrap();
        set.move_before(NodeId(3), NodeId(6)).unwrap();
        set.verify().unwrap();
        assert_eq!(child_ids(&set, 5), vec![3, 6]);
        assert_eq!(set.get(NodeId(3)).unwrap().parent_id, Some(NodeId(5)));
    }

    #[test]
    fn move_already_in_place_is_noop() {
        let mut set = sample();
        assert!(matches!(set.move_before(NodeId(3), NodeId(4)).unwrap_err(), TreeError::NoOp { .. }));
        assert!(matches!(set.move_after(NodeId(4), NodeId(3)).unwrap_err(), TreeError::NoOp { .. }));
        assert!(matches!(set.move_after(NodeId(4), NodeId(4)).unwrap_err(), TreeError::NoOp { .. }));
    }

    #[test]
    fn root_cannot_be_moved_or_get_siblings() {
        let mut set = sample();
        assert!(matches!(
            set.move_inside(NodeId(1), NodeId(5)).unwrap_err(),
            TreeError::RootProtected { .. }
        ));
        assert!(matches!(
            set.move_before(NodeId(5), NodeId(1)).unwrap_err(),
            TreeError::InvalidTarget { .. }
        ));
    }

    #[test]
    fn sibling_moves_respect_parent_insertable_flag() {
        let mut set = sample();
        set.nodes.get_mut(&NodeId(2)).unwrap().flags.insertable = false;
        let err = set.move_after(NodeId(5), NodeId(3)).unwrap_err();
        assert!(matches!(err, TreeError::InvalidTarget { .. }));
    }

    #[test]
    fn policy_flags_are_not_inherited() {
        let mut set = sample();
        set.insert(NodeId(6), new_node(Some(2), NodeKind::Container, "A1")).unwrap();
        set.nodes.get_mut(&NodeId(2)).unwrap().flags.insertable = false;
        // A is closed, its child department A1 is not
        set.insert(NodeId(7), new_node(Some(6), NodeKind::Leaf, "deep")).unwrap();
        set.move_inside(NodeId(5), NodeId(6)).unwrap();
        set.verify().unwrap();
    }

    #[test]
    fn non_recursive_delete_lifts_children_into_place() {
        let mut set = sample();
        let outcome = set.delete(NodeId(2), false).unwrap();
        set.verify().unwrap();
        assert_eq!(outcome.removed, vec![NodeId(2)]);
        assert_eq!(outcome.reparented, vec![NodeId(3), NodeId(4)]);
        assert_eq!(child_ids(&set, 1), vec![3, 4, 5]);
        assert_eq!(set.get(NodeId(3)).unwrap().level, 2);
    }

    #[test]
    fn recursive_delete_removes_block() {
        let mut set = sample();
        let outcome = set.delete(NodeId(2), true).unwrap();
        set.verify().unwrap();
        assert_eq!(outcome.removed, vec![NodeId(2), NodeId(3), NodeId(4)]);
        assert_eq!(set.len(), 2);
        assert_eq!(bounds(&set, 1), (1, 4));
    }

    #[test]
    fn recursive_delete_rescues_non_deletable_descendants() {
        let mut set = sample();
        set.insert(NodeId(6), new_node(Some(2), NodeKind::Container, "A1")).unwrap();
        set.insert(NodeId(7), new_node(Some(6), NodeKind::Leaf, "deep")).unwrap();
        set.nodes.get_mut(&NodeId(4)).unwrap().flags.deletable = false;
        set.nodes.get_mut(&NodeId(6)).unwrap().flags.deletable = false;

        let outcome = set.delete(NodeId(2), true).unwrap();
        set.verify().unwrap();
        assert_eq!(outcome.reparented, vec![NodeId(4), NodeId(6)]);
        assert_eq!(outcome.removed, vec![NodeId(2), NodeId(3)]);
        assert_eq!(child_ids(&set, 1), vec![4, 6, 5]);
        assert_eq!(child_ids(&set, 6), vec![7]);
    }

    #[test]
    fn delete_guards() {
        let mut set = sample();
        assert!(matches!(set.delete(NodeId(1), true).unwrap_err(), TreeError::RootProtected { .. }));
        assert!(matches!(set.delete(NodeId(99), true).unwrap_err(), TreeError::NodeNotFound(_)));
        set.nodes.get_mut(&NodeId(5)).unwrap().flags.deletable = false;
        assert!(matches!(set.delete(NodeId(5), false).unwrap_err(), TreeError::Forbidden { .. }));
    }

    #[test]
    fn scenario_delete_department_keeps_position() {
        let mut set = NestedSet::with_root(NodeId(1), "root", 1);
        set.insert(NodeId(2), new_node(Some(1), NodeKind::Container, "Dept A")).unwrap();
        set.insert(NodeId(3), new_node(Some(2), NodeKind::Leaf, "Position X")).unwrap();

        set.delete(NodeId(2), false).unwrap();
        let tree = set.subtree(NodeId(1)).unwrap();
        assert_eq!(tree.child_ids(), vec![NodeId(3)]);
        assert!(tree.children[0].children.is_empty());
        assert!(set.get(NodeId(2)).is_none());
    }

    #[test]
    fn update_rules() {
        let mut set = sample();
        let err = set
            .update(NodeId(2), &NodeUpdate { kind: Some(NodeKind::Leaf), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, TreeError::LeafWithChildren { children: 2, .. }));

        let err = set
            .update(NodeId(1), &NodeUpdate { kind: Some(NodeKind::Leaf), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, TreeError::RootProtected { .. }));

        set.nodes.get_mut(&NodeId(5)).unwrap().flags.updatable = false;
        let err = set
            .update(NodeId(5), &NodeUpdate { name: Some("B2".into()), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, TreeError::Forbidden { flag: "updatable", .. }));

        set.nodes.get_mut(&NodeId(3)).unwrap().flags.movable = false;
        let err = set
            .update(
                NodeId(3),
                &NodeUpdate { relocation: Some(Relocation::Inside(NodeId(5))), ..Default::default() },
            )
            .unwrap_err();
        assert!(matches!(err, TreeError::Forbidden { flag: "movable", .. }));
    }

    #[test]
    fn update_renames_and_moves_together() {
        let mut set = sample();
        let outcome = set
            .update(
                NodeId(3),
                &NodeUpdate {
                    name: Some("X2".into()),
                    kind: None,
                    relocation: Some(Relocation::Inside(NodeId(5))),
                },
            )
            .unwrap();
        set.verify().unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.previous_name, "X");
        assert_eq!(outcome.node.name, "X2");
        assert_eq!(outcome.node.parent_id, Some(NodeId(5)));
    }

    #[test]
    fn update_with_failing_move_does_not_rename() {
        let mut set = sample();
        let before = set.clone();
        let err = set
            .update(
                NodeId(3),
                &NodeUpdate {
                    name: Some("X2".into()),
                    kind: None,
                    relocation: Some(Relocation::Inside(NodeId(2))),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TreeError::NoOp { .. }));
        assert_eq!(set, before);
    }

    #[test]
    fn same_values_report_unchanged() {
        let mut set = sample();
        let outcome = set
            .update(
                NodeId(2),
                &NodeUpdate { name: Some("A".into()), kind: Some(NodeKind::Container), relocation: None },
            )
            .unwrap();
        assert!(!outcome.changed);
    }

    #[test]
    fn diff_reports_touched_rows() {
        let before = sample();
        let mut after = before.clone();
        after.move_inside(NodeId(3), NodeId(5)).unwrap();
        let changes = after.diff(&before);
        assert!(changes.inserted.is_empty());
        assert!(changes.removed.is_empty());
        let touched: Vec<i64> = changes.updated.iter().map(|n| n.id.0).collect();
        assert!(touched.contains(&3));
        assert!(touched.contains(&4));
        assert!(!touched.contains(&1));

        let mut after = before.clone();
        after.delete(NodeId(2), true).unwrap();
        assert_eq!(after.diff(&before).removed, vec![NodeId(2), NodeId(3), NodeId(4)]);
    }

    #[test]
    fn empty_update_writes_nothing_even_when_locked() {
        let before = sample();
        let mut after = before.clone();
        after.nodes.get_mut(&NodeId(3)).unwrap().flags.updatable = false;
        let locked = after.clone();

        let outcome = after.update(NodeId(3), &NodeUpdate::default()).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.previous_name, "X");
        assert!(after.diff(&locked).is_empty());
        assert!(!after.diff(&before).is_empty());
    }

    #[test]
    fn verify_requires_a_root() {
        let set = NestedSet::from_nodes(Vec::<StructureNode>::new());
        assert!(set.is_empty());
        assert!(matches!(set.verify(), Err(TreeError::MissingRoot)));
    }

    #[test]
    fn verify_catches_broken_intervals() {
        let mut set = sample();
        set.nodes.get_mut(&NodeId(4)).unwrap().right = 9;
        assert!(set.verify().is_err());

        let mut set = sample();
        set.nodes.get_mut(&NodeId(5)).unwrap().parent_id = Some(NodeId(2));
        assert!(set.verify().is_err());
    }

    /// Small deterministic generator so the sequence is reproducible
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: u64) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 33) % bound
        }
    }

    #[test]
    fn invariants_hold_across_random_operation_sequences() {
        for seed in 1..=20u64 {
            let mut rng = Lcg(seed);
            let mut set = NestedSet::with_root(NodeId(1), "root", 1);
            let mut next_id = 2i64;

            for _ in 0..150 {
                let ids: Vec<NodeId> = set.in_order().iter().map(|n| n.id).collect();
                let pick = |rng: &mut Lcg| ids[rng.next(ids.len() as u64) as usize];
                let before = set.clone();
                let result = match rng.next(6) {
                    0 | 1 => {
                        let kind = if rng.next(3) == 0 { NodeKind::Leaf } else { NodeKind::Container };
                        let parent = pick(&mut rng);
                        let r = set.insert(
                            NodeId(next_id),
                            NewNode { parent_id: Some(parent), kind, name: None, flags: PolicyFlags::default() },
                        );
                        next_id += 1;
                        r.map(|_| ())
                    }
                    2 => set.move_inside(pick(&mut rng), pick(&mut rng)),
                    3 => set.move_before(pick(&mut rng), pick(&mut rng)),
                    4 => set.move_after(pick(&mut rng), pick(&mut rng)),
                    _ => {
                        let recursive = rng.next(2) == 0;
                        set.delete(pick(&mut rng), recursive).map(|_| ())
                    }
                };
                if result.is_err() {
                    assert_eq!(set, before, "failed operation changed the tree (seed {})", seed);
                }
                set.verify()
                    .unwrap_or_else(|e| panic!("seed {}: {}", seed, e));
            }
        }
    }
}
