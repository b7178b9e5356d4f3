use std::sync::Arc;

use tracing::{info, warn};

use super::ServiceError;
use crate::filter::{FieldSelection, StructureFilter};
use crate::params::{check_integer, ParamError, RawParams};
use crate::tree::{
    DeleteOutcome, NewNode, NodeId, NodeKind, NodeUpdate, PolicyFlags, Relocation, StructureNode,
    TreeNode, TreeStore, UpdateOutcome, NAME_MAX_LEN,
};

const MOVE_PARAMS: [&str; 3] = ["parent", "before", "after"];

/// What a collection read returns
#[derive(Debug, Clone)]
pub enum Listing {
    /// Drill-down from the root
    Tree(TreeNode),
    /// Matching rows without nesting, when `filters` or `order_by` is given
    Flat(Vec<StructureNode>),
}

#[derive(Debug, Clone)]
pub struct Created {
    pub node: StructureNode,
    pub parent: Option<StructureNode>,
}

/// A subtree together with the parent of its top
#[derive(Debug, Clone)]
pub struct Element {
    pub tree: TreeNode,
    pub parent: Option<StructureNode>,
}

/// Business rules of the organizational structure on top of a [`TreeStore`].
///
/// Every parameter is validated before the store is touched, so a rejected
/// request never reaches a unit of work.
#[derive(Clone)]
pub struct TreeService {
    store: Arc<dyn TreeStore>,
}

impl TreeService {
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn TreeStore> {
        &self.store
    }

    /// Parses an element id taken from the path
    pub fn node_id(raw: &str) -> Result<NodeId, ServiceError> {
        let id = check_integer(raw).map_err(|e| e.named("id"))?;
        Ok(NodeId(id))
    }

    /// `columns=` / `exclude=` of a request
    pub fn selection(params: &RawParams) -> Result<FieldSelection, ServiceError> {
        let columns = params.joined("columns");
        let exclude = params.joined("exclude");
        Ok(FieldSelection::parse::<StructureNode>(
            columns.as_deref(),
            exclude.as_deref(),
        )?)
    }

    pub async fn tree(&self, params: &RawParams) -> Result<Listing, ServiceError> {
        let filters = params.joined("filters");
        let order_by = params.joined("order_by");

        if filters.is_none() && order_by.is_none() {
            let root = self.store.root().await?;
            return Ok(Listing::Tree(self.store.read_subtree(root.id).await?));
        }

        let filter = StructureFilter::from_params(filters.as_deref(), order_by.as_deref())?;
        Ok(Listing::Flat(self.store.list(&filter).await?))
    }

    pub async fn element(&self, id: NodeId) -> Result<Element, ServiceError> {
        let tree = self.store.read_subtree(id).await?;
        let parent = self.parent_of(&tree.node).await?;
        Ok(Element { tree, parent })
    }

    pub async fn create(&self, params: &RawParams) -> Result<Created, ServiceError> {
        let kind = required_kind(params)?;
        let parent_id = params.integer("parent")?.map(NodeId);
        let name = params.text("name", 1, NAME_MAX_LEN)?;
        let flags = policy_flags(params)?;

        let new = NewNode {
            parent_id,
            kind,
            name,
            flags,
        };
        let node = self.store.create_node(new).await.map_err(|e| rejected("create", e))?;
        info!("Created {} «{}» (id={})", node.kind.label(), node.name, node.id);

        let parent = self.parent_of(&node).await?;
        Ok(Created { node, parent })
    }

    /// Rename, retype and move in one step. `changed` is false when the request
    /// carried nothing new.
    pub async fn update(&self, id: NodeId, params: &RawParams) -> Result<UpdateOutcome, ServiceError> {
        let relocation = relocation(params)?;
        let name = params.text("name", 1, NAME_MAX_LEN)?;
        let kind = optional_kind(params)?;

        let update = NodeUpdate {
            name,
            kind,
            relocation,
        };
        let outcome = self
            .store
            .update_node(id, update)
            .await
            .map_err(|e| rejected("update", e))?;
        if outcome.changed {
            info!("Updated element «{}» (id={})", outcome.previous_name, id);
        }
        Ok(outcome)
    }

    pub async fn delete(&self, id: NodeId, params: &RawParams) -> Result<DeleteOutcome, ServiceError> {
        let recursive = params.boolean("recursive")?.unwrap_or(false);
        let outcome = self
            .store
            .delete_node(id, recursive)
            .await
            .map_err(|e| rejected("delete", e))?;
        info!(
            "Deleted element «{}» (id={}), {} removed, {} reparented",
            outcome.name,
            id,
            outcome.removed.len(),
            outcome.reparented.len()
        );
        Ok(outcome)
    }

    async fn parent_of(&self, node: &StructureNode) -> Result<Option<StructureNode>, ServiceError> {
        match node.parent_id {
            Some(parent_id) => Ok(Some(self.store.get_node(parent_id).await?)),
            None => Ok(None),
        }
    }
}

fn rejected(action: &str, err: crate::tree::TreeError) -> ServiceError {
    warn!("Rejected {}: {}", action, err);
    err.into()
}

/// At most one of `parent`, `before`, `after`. Counted before any value is read.
fn relocation(params: &RawParams) -> Result<Option<Relocation>, ServiceError> {
    let given: Vec<&str> = MOVE_PARAMS
        .iter()
        .copied()
        .filter(|name| params.is_supplied(name))
        .collect();
    if given.len() > 1 {
        return Err(ServiceError::MultipleMoveDirectives {
            given: given.join(", "),
        });
    }

    let Some(name) = given.first().copied() else {
        return Ok(None);
    };
    let target = match params.integer(name)? {
        Some(id) => NodeId(id),
        None => return Ok(None),
    };
    Ok(Some(match name {
        "parent" => Relocation::Inside(target),
        "before" => Relocation::Before(target),
        _ => Relocation::After(target),
    }))
}

fn optional_kind(params: &RawParams) -> Result<Option<NodeKind>, ServiceError> {
    match params.integer("type")? {
        None => Ok(None),
        Some(code) => NodeKind::from_code(code).map(Some).ok_or_else(|| {
            ServiceError::Param(ParamError::NotAllowed {
                param: "type".into(),
                raw_value: code.to_string(),
                allowed: "1 (department), 2 (position)".into(),
            })
        }),
    }
}

fn required_kind(params: &RawParams) -> Result<NodeKind, ServiceError> {
    optional_kind(params)?.ok_or_else(|| ServiceError::Param(ParamError::Missing { param: "type".into() }))
}

fn policy_flags(params: &RawParams) -> Result<PolicyFlags, ServiceError> {
    let defaults = PolicyFlags::default();
    Ok(PolicyFlags {
        insertable: params.boolean("insertable")?.unwrap_or(defaults.insertable),
        movable: params.boolean("movable")?.unwrap_or(defaults.movable),
        updatable: params.boolean("updatable")?.unwrap_or(defaults.updatable),
        deletable: params.boolean("deletable")?.unwrap_or(defaults.deletable),
    })
}
