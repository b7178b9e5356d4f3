pub mod columns;
pub mod error;
pub mod fields;
pub mod filter;
pub mod filter_order;
pub mod filter_where;
pub mod types;

pub use columns::{Column, Entity, EntityMeta};
pub use error::FilterError;
pub use fields::FieldSelection;
pub use filter::{Filter, StructureFilter};
pub use types::*;
