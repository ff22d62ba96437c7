use coursedeck_shared::ContentError;

use crate::uploads::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Access denied")]
    Forbidden,

    #[error("Resource not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Missing(_) => AppError::NotFound,
            StorageError::InvalidName(name) => {
                AppError::Validation(format!("Invalid file name: {name}"))
            }
            err @ StorageError::Io { .. } => AppError::Storage(err),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("Invalid content payload: {err}"))
    }
}

pub type AppResult<T> = Result<T, AppError>;
