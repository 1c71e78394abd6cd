use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrailsyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type TrailsyncResult<T> = Result<T, TrailsyncError>;
