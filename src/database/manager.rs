use sqlx::{postgres::PgPoolOptions, Executor, PgConnection, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::config;
use crate::tree::DEFAULT_TREE_ID;

const MIGRATION: &str = include_str!("../../migrations/001_organizational_structure.sql");

/// Advisory lock key for schema changes. Tree locks use positive tree ids.
const MIGRATION_LOCK: i64 = -1;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Owns the Postgres pool for the structure table
#[derive(Clone)]
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    /// Connects using `DATABASE_URL` and the `database` config section
    pub async fn connect() -> Result<Self, DatabaseError> {
        let url = std::env::var("DATABASE_URL").map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;
        Self::connect_to(&url).await
    }

    pub async fn connect_to(database_url: &str) -> Result<Self, DatabaseError> {
        let redacted = Self::redacted_url(database_url)?;
        let settings = &config().database;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.connection_timeout))
            .connect(database_url)
            .await?;

        info!("Created database pool for: {}", redacted);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Creates the schema if needed and seeds the root element of tree 1
    pub async fn migrate(&self, root_name: &str) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        // `IF NOT EXISTS` alone still races in the catalog
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK)
            .execute(&mut *tx)
            .await?;
        (&mut *tx).execute(MIGRATION).await?;
        seed(&mut *tx, DEFAULT_TREE_ID, root_name).await?;
        tx.commit().await?;

        info!("Schema is up to date");
        Ok(())
    }

    /// Inserts the root of `tree_id` unless that tree already has rows
    pub async fn seed_root(&self, tree_id: i64, root_name: &str) -> Result<bool, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        seed(&mut *conn, tree_id, root_name).await
    }

    /// Removes every row of `tree_id`. One statement, so parent references
    /// inside the tree never block it.
    pub async fn drop_tree(&self, tree_id: i64) -> Result<u64, DatabaseError> {
        let removed = sqlx::query("DELETE FROM organizational_structure WHERE tree_id = $1")
            .bind(tree_id)
            .execute(&self.pool)
            .await?;
        Ok(removed.rows_affected())
    }

    /// The URL with its password masked, for logs. Fails on unparseable URLs.
    pub fn redacted_url(database_url: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(database_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(DatabaseError::InvalidDatabaseUrl);
        }
        if url.password().is_some() {
            url.set_password(Some("****")).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        Ok(url.into())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}

async fn seed(conn: &mut PgConnection, tree_id: i64, root_name: &str) -> Result<bool, DatabaseError> {
    let seeded = sqlx::query(
        "INSERT INTO organizational_structure \
            (name, \"type\", parent_id, tree_id, lft, rgt, level) \
         SELECT $1, 1, NULL, $2, 1, 2, 1 \
         WHERE NOT EXISTS (SELECT 1 FROM organizational_structure WHERE tree_id = $2)",
    )
    .bind(root_name)
    .bind(tree_id)
    .execute(conn)
    .await?;

    let seeded = seeded.rows_affected() > 0;
    if seeded {
        info!("Seeded root element «{}» of tree {}", root_name, tree_id);
    }
    Ok(seeded)
}
