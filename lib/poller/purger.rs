use super::error::Error;
use crate::db::{CallStore, Dialect};

pub const CALLS_STAGING: &str = "hc_curent_temp";
pub const COMMENTS_STAGING: &str = "hc_comment_temp";
pub const COUNTS_STAGING: &str = "hc_unitcount_temp";

/// Empties a staging table. SQLite has no `TRUNCATE`; an unqualified
/// `DELETE` takes its truncate fast path.
pub fn truncate_statement(dialect: Dialect, table: &str) -> String {
    match dialect {
        Dialect::Postgres => format!("TRUNCATE TABLE {table}"),
        Dialect::Sqlite => format!("DELETE FROM {table}"),
    }
}

async fn purge(store: &dyn CallStore, table: &str) -> Result<usize, Error> {
    Ok(store
        .execute(&truncate_statement(store.dialect(), table))
        .await?)
}

pub async fn purge_calls(store: &dyn CallStore) -> Result<usize, Error> {
    purge(store, CALLS_STAGING).await
}

pub async fn purge_comments(store: &dyn CallStore) -> Result<usize, Error> {
    purge(store, COMMENTS_STAGING).await
}

pub async fn purge_counts(store: &dyn CallStore) -> Result<usize, Error> {
    purge(store, COUNTS_STAGING).await
}
