use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable node identifier. Assigned once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Departments hold other elements; positions never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Container,
    Leaf,
}

impl NodeKind {
    /// Wire code: 1 = department, 2 = position
    pub fn code(self) -> i64 {
        match self {
            NodeKind::Container => 1,
            NodeKind::Leaf => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(NodeKind::Container),
            2 => Some(NodeKind::Leaf),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Container => "department",
            NodeKind::Leaf => "position",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFlags {
    pub insertable: bool,
    pub movable: bool,
    pub updatable: bool,
    pub deletable: bool,
}

impl Default for PolicyFlags {
    fn default() -> Self {
        Self {
            insertable: true,
            movable: true,
            updatable: true,
            deletable: true,
        }
    }
}

/// One row of the organizational structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub parent_id: Option<NodeId>,
    pub tree_id: i64,
    pub left: i64,
    pub right: i64,
    pub level: i64,
    pub flags: PolicyFlags,
}

impl StructureNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    /// Interval width, always even: `2 * descendants + 2`
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    pub fn descendant_count(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }

    pub fn has_children(&self) -> bool {
        self.right - self.left > 1
    }

    /// Strictly inside this node's interval
    pub fn contains(&self, other: &StructureNode) -> bool {
        self.left < other.left && other.right < self.right
    }
}

/// Input for a new node. The store decides the interval.
#[derive(Debug, Clone)]
pub struct NewNode {
    pub parent_id: Option<NodeId>,
    pub kind: NodeKind,
    pub name: Option<String>,
    pub flags: PolicyFlags,
}

/// Where a node should go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relocation {
    Inside(NodeId),
    Before(NodeId),
    After(NodeId),
}

impl Relocation {
    pub fn target(self) -> NodeId {
        match self {
            Relocation::Inside(id) | Relocation::Before(id) | Relocation::After(id) => id,
        }
    }
}

/// In-place changes applied in a single unit of work
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub kind: Option<NodeKind>,
    pub relocation: Option<Relocation>,
}

impl NodeUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.kind.is_none() && self.relocation.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub node: StructureNode,
    /// Name as it was before the update
    pub previous_name: String,
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub removed: Vec<NodeId>,
    /// Nodes that survived by moving up to the deleted node's parent
    pub reparented: Vec<NodeId>,
    pub name: String,
}

/// A node with its descendants nested in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub node: StructureNode,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Node count including this one
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }

    pub fn child_ids(&self) -> Vec<NodeId> {
        self.children.iter().map(|c| c.node.id).collect()
    }
}
