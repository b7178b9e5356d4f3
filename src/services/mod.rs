pub mod structure_service;

pub use structure_service::{Created, Element, Listing, TreeService};

use thiserror::Error;

use crate::filter::FilterError;
use crate::params::ParamError;
use crate::tree::TreeError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("Only one of parameters «parent», «before», «after» can be given at once, got: {given}")]
    MultipleMoveDirectives { given: String },
}
