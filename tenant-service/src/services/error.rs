use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Migration of {unit} failed: {reason}; backup retained at {backup_location}")]
    Migration {
        unit: String,
        reason: String,
        backup_location: String,
    },

    #[error("Storage unavailable")]
    StorageUnavailable,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(anyhow::Error),

    #[error("Backup error: {0}")]
    Backup(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Both token failure kinds surface as `InvalidTokenError`; expiry stays
    /// distinguishable for callers that care.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, ServiceError::InvalidToken | ServiceError::TokenExpired)
    }
}

impl From<mongodb::error::Error> for ServiceError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err) {
            return ServiceError::Conflict("duplicate key".to_string());
        }
        ServiceError::Store(anyhow::Error::new(err))
    }
}

impl From<mongodb::bson::ser::Error> for ServiceError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        ServiceError::Internal(anyhow::anyhow!("Failed to encode document: {}", err))
    }
}

impl From<mongodb::bson::de::Error> for ServiceError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        ServiceError::Internal(anyhow::anyhow!("Failed to decode document: {}", err))
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    const DUPLICATE_KEY: i32 = 11000;

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::BulkWrite(e) => e
            .write_errors
            .as_ref()
            .is_some_and(|errs| errs.iter().any(|e| e.code == DUPLICATE_KEY)),
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            ServiceError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ServiceError::Unauthorized
            | ServiceError::InvalidToken
            | ServiceError::TokenExpired => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
            }
            ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::Forbidden => AppError::Forbidden(anyhow::anyhow!("Forbidden")),
            e @ ServiceError::Migration { .. } => AppError::MigrationFailed(anyhow::anyhow!(e)),
            ServiceError::StorageUnavailable => AppError::ServiceUnavailable,
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Store(e) => AppError::DatabaseError(e),
            ServiceError::Backup(e) => {
                AppError::InternalError(e.context("Backup failed; no data was modified"))
            }
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
