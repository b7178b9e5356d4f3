use thiserror::Error;

use super::types::{ColumnType, FilterOp};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid filter «{0}» (should be «filter=<column>:<operator>:<value>»)")]
    MalformedFilter(String),

    #[error("Invalid filter operator «{0}» (possible variants is: {variants})", variants = FilterOp::variants())]
    UnsupportedOperator(String),

    #[error("Column «{column}» from filter «{clause}» doesn't exist in model «{model}»")]
    ColumnNotFound {
        column: String,
        clause: String,
        model: &'static str,
    },

    #[error("Value «{value}» from filter «{clause}» is not type of «{expected}»")]
    InvalidValue {
        value: String,
        clause: String,
        expected: ColumnType,
    },

    #[error("Too many filter clauses: {count} (at most {max} allowed)")]
    TooManyClauses { count: usize, max: usize },

    #[error("Invalid order parameter «{0}» (should be «order_by=<column>:<direction>»)")]
    MalformedOrder(String),

    #[error("Invalid order direction «{direction}» in order parameter «{part}» (possible variants is: «asc», «desc»)")]
    InvalidDirection { direction: String, part: String },

    #[error("Column «{column}» from order parameter «{part}» doesn't exist in model «{model}»")]
    OrderColumnNotFound {
        column: String,
        part: String,
        model: &'static str,
    },

    #[error("None of columns from parameter «&columns={0}» exist in model «{1}»")]
    NoValidColumns(String, &'static str),
}
