use thiserror::Error;

use super::node::NodeId;
use crate::database::DatabaseError;

/// Failures of structural operations. No variant is ever returned after a partial mutation.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Structure element with id={0} doesn't exist")]
    NodeNotFound(NodeId),

    #[error("Parent structure element with id={0} doesn't exist")]
    ParentNotFound(NodeId),

    #[error("Target structure element with id={0} doesn't exist")]
    TargetNotFound(NodeId),

    #[error("Element «{name}» (id={id}) can't be a parent: {reason}")]
    InvalidParent {
        id: NodeId,
        name: String,
        reason: &'static str,
    },

    #[error("Element «{name}» (id={id}) can't be a move target: {reason}")]
    InvalidTarget {
        id: NodeId,
        name: String,
        reason: &'static str,
    },

    #[error("Element «{name}» is already in the requested position")]
    NoOp { name: String },

    #[error("The root element of the structure is protected: it can't be {action}")]
    RootProtected { action: &'static str },

    #[error("Element «{name}» is not {flag}")]
    Forbidden { name: String, flag: &'static str },

    #[error("Element «{name}» has {children} descendants and can't become a position")]
    LeafWithChildren { name: String, children: i64 },

    #[error("Structure has no root element")]
    MissingRoot,

    #[error("Nested-set invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for TreeError {
    fn from(err: sqlx::Error) -> Self {
        TreeError::Database(DatabaseError::Sqlx(err))
    }
}
