use sqlx::{self, postgres::PgArguments, FromRow, PgConnection};

use crate::database::manager::DatabaseError;
use crate::filter::{ColumnValue, Entity, Filter, SqlResult};

/// Runs a validated [`Filter`] and maps rows with `T`'s `FromRow`
pub struct QueryBuilder<'f, E> {
    filter: &'f Filter<E>,
}

impl<'f, E: Entity> QueryBuilder<'f, E> {
    pub fn new(filter: &'f Filter<E>) -> Self {
        Self { filter }
    }

    pub fn sql_result(&self) -> SqlResult {
        self.filter.to_sql()
    }

    pub async fn select_all<T>(&self, conn: &mut PgConnection) -> Result<Vec<T>, DatabaseError>
    where
        T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let sql_result = self.sql_result();
        if crate::config::config().database.enable_query_logging {
            tracing::debug!("{} -- {} param(s)", sql_result.query, sql_result.params.len());
        }
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        let rows = q.fetch_all(conn).await?;
        Ok(rows)
    }
}

fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    v: &'q ColumnValue,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match v {
        ColumnValue::Null => {
            let none: Option<i64> = None;
            q.bind(none)
        }
        ColumnValue::Int(i) => q.bind(*i),
        ColumnValue::Bool(b) => q.bind(*b),
        ColumnValue::Text(s) => q.bind(s.as_str()),
    }
}
