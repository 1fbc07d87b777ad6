pub mod models;
pub mod schema;

use async_trait::async_trait;
use diesel::result::Error as DieselError;
use diesel::sql_query;
use diesel::Connection;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::{
    pg::AsyncPgConnection,
    pooled_connection::{
        deadpool::{BuildError, Pool, PoolError},
        AsyncDieselConnectionManager,
    },
    RunQueryDsl,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use thiserror::Error;

use models::{CommentLine, StagedComment};
use schema::hc_comment_temp;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection error: {0}")]
    ConnectError(String),

    #[error(transparent)]
    DieselError(#[from] DieselError),

    #[error(transparent)]
    DBPoolError(#[from] PoolError),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// SQL flavour of the connected store. Only statements without a portable
/// spelling (staging truncation) branch on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

/// Connection source for the pipeline.
///
/// Every method acquires its own connection and releases it before
/// returning, whether the statement succeeded or not.
#[async_trait]
pub trait CallStore: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Runs one statement and returns the affected row count.
    async fn execute(&self, statement: &str) -> Result<usize, DbError>;

    async fn load_comment_lines(&self, statement: &str) -> Result<Vec<CommentLine>, DbError>;

    async fn stage_comments(&self, rows: &[StagedComment]) -> Result<usize, DbError>;
}

pub async fn build_db_pool(
    db_url: &str,
    max_size: usize,
) -> Result<Pool<AsyncPgConnection>, BuildError> {
    let pool_config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    Pool::builder(pool_config).max_size(max_size).build()
}

/// Applies the embedded staging/master table migrations.
pub async fn run_migrations(db_url: &str) -> Result<usize, DbError> {
    let db_url = db_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = AsyncConnectionWrapper::<AsyncPgConnection>::establish(&db_url)
            .map_err(|e| DbError::ConnectError(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map(|applied| applied.len())
            .map_err(|e| DbError::MigrationError(e.to_string()))
    })
    .await
    .map_err(|e| DbError::MigrationError(e.to_string()))?
}

/// Postgres-backed store drawing one pooled connection per call.
pub struct PgStore {
    pool: Pool<AsyncPgConnection>,
}

impl PgStore {
    pub fn new(pool: Pool<AsyncPgConnection>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallStore for PgStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, statement: &str) -> Result<usize, DbError> {
        let mut conn = self.pool.get().await?;
        Ok(sql_query(statement).execute(&mut conn).await?)
    }

    async fn load_comment_lines(&self, statement: &str) -> Result<Vec<CommentLine>, DbError> {
        let mut conn = self.pool.get().await?;
        Ok(sql_query(statement).load::<CommentLine>(&mut conn).await?)
    }

    async fn stage_comments(&self, rows: &[StagedComment]) -> Result<usize, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.pool.get().await?;
        Ok(diesel::insert_into(hc_comment_temp::table)
            .values(rows)
            .execute(&mut conn)
            .await?)
    }
}
