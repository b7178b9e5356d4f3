pub mod structure;

pub use structure::StructureRow;
