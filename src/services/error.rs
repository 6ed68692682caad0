//! Service-level error taxonomy
//!
//! Every service returns [`ServiceError`]; the HTTP layer maps each variant to
//! one status code.

use crate::db::DuplicateRecord;
use crate::query::QueryError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A referenced record does not exist
    #[error("{0}")]
    NotFound(String),

    /// Request body or query failed validation
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    /// Mail, file or geocoding provider failed
    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Internal(anyhow::Error),
}

impl ServiceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        if err.is::<DuplicateRecord>() {
            Self::validation("Duplicate field value entered")
        } else {
            Self::Internal(err)
        }
    }
}

impl From<QueryError> for ServiceError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Malformed(message) => Self::Validation(message),
            QueryError::Store(err) => err.into(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
