use std::cmp::Ordering;

use super::columns::Entity;
use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Parses `column:direction[,column:direction...]`
    pub fn validate_and_parse<E: Entity>(raw: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let Some((column_name, direction)) = part.split_once(':') else {
                return Err(FilterError::MalformedOrder(part.to_string()));
            };
            if direction.contains(':') {
                return Err(FilterError::MalformedOrder(part.to_string()));
            }
            let sort = SortDirection::parse(direction.trim()).ok_or_else(|| FilterError::InvalidDirection {
                direction: direction.to_string(),
                part: part.to_string(),
            })?;
            let column = E::column(column_name.trim()).ok_or_else(|| FilterError::OrderColumnNotFound {
                column: column_name.to_string(),
                part: part.to_string(),
                model: E::MODEL,
            })?;
            out.push(FilterOrderInfo {
                column: column.name,
                sort,
            });
        }
        Ok(out)
    }

    pub fn generate<E: Entity>(infos: &[FilterOrderInfo]) -> String {
        let parts: Vec<String> = infos
            .iter()
            .filter_map(|i| E::column(i.column).map(|c| format!("\"{}\" {}", c.sql, i.sort.to_sql())))
            .collect();
        if parts.is_empty() {
            return String::new();
        }
        format!("ORDER BY {}", parts.join(", "))
    }

    /// Row comparison following the same keys the SQL would use
    pub fn compare<E: Entity>(infos: &[FilterOrderInfo], a: &E, b: &E) -> Ordering {
        for info in infos {
            let Some(column) = E::column(info.column) else {
                continue;
            };
            let ordering = (column.get)(a)
                .compare(&(column.get)(b))
                .unwrap_or(Ordering::Equal);
            let ordering = match info.sort {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
