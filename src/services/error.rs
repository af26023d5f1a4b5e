use thiserror::Error;

use crate::auth::PasswordError;
use crate::database::DatabaseError;
use crate::integrations::{BlobError, ContentCheckError};

/// Domain failures raised by the services, mapped onto HTTP by `ApiError`
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// The content reviewer declined the recipe; carries its explanation.
    #[error("recipe rejected by content check: {0}")]
    ContentRejected(String),

    #[error(transparent)]
    ContentCheckFailed(#[from] ContentCheckError),

    #[error(transparent)]
    Storage(#[from] BlobError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
