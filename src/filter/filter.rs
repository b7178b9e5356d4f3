use std::marker::PhantomData;

use super::columns::Entity;
use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{ColumnValue, FilterOp, FilterOrderInfo, FilterWhereInfo, SqlResult};
use crate::tree::StructureNode;

/// A validated listing query: conditions plus ordering over one entity.
///
/// Built once from request parameters, then either rendered to SQL or run
/// against rows already in memory. Both paths use the same registry.
#[derive(Debug)]
pub struct Filter<E> {
    conditions: Vec<FilterWhereInfo>,
    order: Vec<FilterOrderInfo>,
    max_clauses: usize,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Filter<E> {
    fn clone(&self) -> Self {
        Self {
            conditions: self.conditions.clone(),
            order: self.order.clone(),
            max_clauses: self.max_clauses,
            _entity: PhantomData,
        }
    }
}

pub type StructureFilter = Filter<StructureNode>;

impl<E: Entity> Default for Filter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Filter<E> {
    pub fn new() -> Self {
        Self {
            conditions: vec![],
            order: vec![],
            max_clauses: crate::config::config().filter.max_clauses,
            _entity: PhantomData,
        }
    }

    pub fn from_params(filters: Option<&str>, order_by: Option<&str>) -> Result<Self, FilterError> {
        let mut filter = Self::new();
        if let Some(raw) = filters {
            filter.where_clause(raw)?;
        }
        if let Some(raw) = order_by {
            filter.order(raw)?;
        }
        Ok(filter)
    }

    pub fn where_clause(&mut self, raw: &str) -> Result<&mut Self, FilterError> {
        self.conditions = FilterWhere::parse::<E>(raw, self.max_clauses)?;
        Ok(self)
    }

    pub fn order(&mut self, raw: &str) -> Result<&mut Self, FilterError> {
        self.order = FilterOrder::validate_and_parse::<E>(raw)?;
        Ok(self)
    }

    /// The same plan with an extra equality on a registered column. Not counted
    /// against the clause cap; stores use it to stay inside their own rows.
    pub fn scoped(&self, column: &str, value: ColumnValue) -> Result<Self, FilterError> {
        let column = E::column(column).ok_or_else(|| FilterError::ColumnNotFound {
            column: column.to_string(),
            clause: format!("{}:==", column),
            model: E::MODEL,
        })?;
        let mut filter = self.clone();
        filter.conditions.insert(
            0,
            FilterWhereInfo {
                column: column.name,
                operator: FilterOp::Eq,
                data: vec![value],
            },
        );
        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.order.is_empty()
    }

    pub fn conditions(&self) -> &[FilterWhereInfo] {
        &self.conditions
    }

    pub fn to_sql(&self) -> SqlResult {
        let columns = E::columns()
            .iter()
            .map(|c| format!("\"{}\"", c.sql))
            .collect::<Vec<_>>()
            .join(", ");
        let (where_clause, params) = FilterWhere::generate::<E>(&self.conditions, 0);
        let order_clause = if self.order.is_empty() {
            format!("ORDER BY \"{}\" ASC", E::DEFAULT_ORDER)
        } else {
            FilterOrder::generate::<E>(&self.order)
        };

        let query = [
            format!("SELECT {}", columns),
            format!("FROM \"{}\"", E::TABLE),
            format!("WHERE {}", where_clause),
            order_clause,
        ]
        .join(" ");

        SqlResult { query, params }
    }

    pub fn matches(&self, row: &E) -> bool {
        self.conditions.iter().all(|c| FilterWhere::matches(c, row))
    }

    /// Filters and sorts rows that are already in the entity's default order
    pub fn apply(&self, rows: impl IntoIterator<Item = E>) -> Vec<E> {
        let mut out: Vec<E> = rows.into_iter().filter(|r| self.matches(r)).collect();
        if !self.order.is_empty() {
            out.sort_by(|a, b| FilterOrder::compare(&self.order, a, b));
        }
        out
    }
}
