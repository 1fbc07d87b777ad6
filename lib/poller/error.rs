use crate::db::DbError;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Cutoff for {window} window is out of range")]
    ClockRange { window: &'static str },

    #[error("Cycle task failed: {0}")]
    TaskJoinError(#[from] JoinError),
}

impl Error {
    /// Database-layer failures alert on their own channel.
    pub fn is_database(&self) -> bool {
        matches!(self, Error::Database(_))
    }
}
