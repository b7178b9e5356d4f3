use std::cmp::Ordering;

use super::columns::{Column, Entity};
use super::error::FilterError;
use super::types::{ColumnType, ColumnValue, FilterOp, FilterWhereInfo};
use crate::params::{check_bool, check_integer};

pub struct FilterWhere {
    param_values: Vec<ColumnValue>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Parses `column:operator:value[,column:operator:value...]`.
    ///
    /// A comma-separated fragment without `:` belongs to the previous clause's
    /// value, so `type:in:1,2,name:like:Sales` yields two clauses.
    pub fn parse<E: Entity>(raw: &str, max_clauses: usize) -> Result<Vec<FilterWhereInfo>, FilterError> {
        let clauses = split_clauses(raw);
        if clauses.len() > max_clauses {
            return Err(FilterError::TooManyClauses {
                count: clauses.len(),
                max: max_clauses,
            });
        }
        clauses.iter().map(|c| Self::parse_clause::<E>(c)).collect()
    }

    fn parse_clause<E: Entity>(clause: &str) -> Result<FilterWhereInfo, FilterError> {
        let parts: Vec<&str> = clause.split(':').collect();
        let [column_name, op, value] = parts.as_slice() else {
            return Err(FilterError::MalformedFilter(clause.to_string()));
        };
        let operator =
            FilterOp::parse(op).ok_or_else(|| FilterError::UnsupportedOperator(op.to_string()))?;
        let column = E::column(column_name.trim()).ok_or_else(|| FilterError::ColumnNotFound {
            column: column_name.to_string(),
            clause: clause.to_string(),
            model: E::MODEL,
        })?;

        let data = match operator {
            FilterOp::In => value
                .split(',')
                .map(|v| parse_value(column, v, clause))
                .collect::<Result<Vec<_>, _>>()?,
            // Patterns always compare as text
            FilterOp::Like | FilterOp::ILike => vec![ColumnValue::Text(format!("%{}%", value))],
            _ => vec![parse_value(column, value, clause)?],
        };

        Ok(FilterWhereInfo {
            column: column.name,
            operator,
            data,
        })
    }

    pub fn generate<E: Entity>(
        conditions: &[FilterWhereInfo],
        starting_param_index: usize,
    ) -> (String, Vec<ColumnValue>) {
        let mut filter_where = Self::new(starting_param_index);
        let parts: Vec<String> = conditions
            .iter()
            .filter_map(|c| filter_where.build_sql_condition::<E>(c))
            .collect();
        let where_clause = if parts.is_empty() {
            "1=1".to_string()
        } else {
            parts.join(" AND ")
        };
        (where_clause, filter_where.param_values)
    }

    fn build_sql_condition<E: Entity>(&mut self, condition: &FilterWhereInfo) -> Option<String> {
        let column = E::column(condition.column)?;
        let quoted_column = format!("\"{}\"", column.sql);
        let sql = match condition.operator {
            FilterOp::In => {
                if condition.data.is_empty() {
                    return Some("1=0".to_string());
                }
                let params: Vec<String> = condition.data.iter().map(|v| self.param(v.clone())).collect();
                format!("{} IN ({})", quoted_column, params.join(", "))
            }
            FilterOp::Like | FilterOp::ILike => format!(
                "CAST({} AS TEXT) {} {}",
                quoted_column,
                condition.operator.to_sql(),
                self.param(condition.data.first()?.clone())
            ),
            op => format!(
                "{} {} {}",
                quoted_column,
                op.to_sql(),
                self.param(condition.data.first()?.clone())
            ),
        };
        Some(sql)
    }

    /// Evaluates one condition against a row with SQL semantics: a NULL cell never matches
    pub fn matches<E: Entity>(condition: &FilterWhereInfo, row: &E) -> bool {
        let Some(column) = E::column(condition.column) else {
            return false;
        };
        let cell = (column.get)(row);
        if cell == ColumnValue::Null {
            return false;
        }
        let compare = |value: &ColumnValue| cell.compare(value);
        match condition.operator {
            FilterOp::In => condition.data.iter().any(|v| compare(v) == Some(Ordering::Equal)),
            FilterOp::Like | FilterOp::ILike => {
                let Some(ColumnValue::Text(pattern)) = condition.data.first() else {
                    return false;
                };
                let text = as_text(&cell);
                if condition.operator == FilterOp::ILike {
                    like(&text.to_lowercase(), &pattern.to_lowercase())
                } else {
                    like(&text, pattern)
                }
            }
            op => {
                let Some(ordering) = condition.data.first().and_then(compare) else {
                    return false;
                };
                match op {
                    FilterOp::Eq => ordering == Ordering::Equal,
                    FilterOp::Ne => ordering != Ordering::Equal,
                    FilterOp::Gt => ordering == Ordering::Greater,
                    FilterOp::Lt => ordering == Ordering::Less,
                    FilterOp::Gte => ordering != Ordering::Less,
                    FilterOp::Lte => ordering != Ordering::Greater,
                    _ => false,
                }
            }
        }
    }

    fn param(&mut self, value: ColumnValue) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

fn split_clauses(raw: &str) -> Vec<String> {
    let mut clauses: Vec<String> = Vec::new();
    for fragment in raw.split(',') {
        if fragment.trim().is_empty() {
            continue;
        }
        match clauses.last_mut() {
            Some(previous) if !fragment.contains(':') => {
                previous.push(',');
                previous.push_str(fragment);
            }
            _ => clauses.push(fragment.trim_start().to_string()),
        }
    }
    clauses
}

fn parse_value<R>(column: &Column<R>, raw: &str, clause: &str) -> Result<ColumnValue, FilterError> {
    let invalid = || FilterError::InvalidValue {
        value: raw.to_string(),
        clause: clause.to_string(),
        expected: column.kind,
    };
    match column.kind {
        ColumnType::Integer => check_integer(raw).map(ColumnValue::Int).map_err(|_| invalid()),
        ColumnType::Boolean => check_bool(raw).map(ColumnValue::Bool).map_err(|_| invalid()),
        ColumnType::Text => Ok(ColumnValue::Text(raw.to_string())),
    }
}

fn as_text(value: &ColumnValue) -> String {
    match value {
        ColumnValue::Null => String::new(),
        ColumnValue::Int(i) => i.to_string(),
        ColumnValue::Bool(b) => b.to_string(),
        ColumnValue::Text(s) => s.clone(),
    }
}

/// SQL `LIKE`: `%` matches any run of characters, `_` exactly one
pub fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        // `%` is always a wildcard, even where the text holds a literal `%`
        if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}
