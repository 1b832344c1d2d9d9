use serde::Serialize;
use thiserror::Error;

/// Error body handed to callers that render failures to an end user.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub error: String,
}

/// Coarse classification of every failure the engine can raise.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AccessDenied,
    Validation,
    DomainConflict,
    PassphrasePolicy,
    Unsupported,
    Precondition,
    PersistenceFault,
    CryptoFault,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0}")]
    DomainConflict(String),
    #[error("{0}")]
    PassphrasePolicy(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("database migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("openssl error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::AccessDenied(_) => ErrorKind::AccessDenied,
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::DomainConflict(_) => ErrorKind::DomainConflict,
            ApiError::PassphrasePolicy(_) => ErrorKind::PassphrasePolicy,
            ApiError::Unsupported(_) => ErrorKind::Unsupported,
            ApiError::Precondition(_) => ErrorKind::Precondition,
            ApiError::Database(_)
            | ApiError::Pool(_)
            | ApiError::Migration(_)
            | ApiError::Serialization(_) => ErrorKind::PersistenceFault,
            ApiError::OpenSsl(_) => ErrorKind::CryptoFault,
        }
    }

    /// Whether the message is safe to show to an end user. Internal faults
    /// may leak schema or library details and are replaced by a generic text.
    pub fn is_displayable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AccessDenied
                | ErrorKind::Validation
                | ErrorKind::DomainConflict
                | ErrorKind::PassphrasePolicy
        )
    }

    pub fn to_response(&self) -> ErrorResponse {
        let error = if self.is_displayable() {
            self.to_string()
        } else {
            "an internal error occurred".to_string()
        };
        ErrorResponse { kind: self.kind(), error }
    }
}
