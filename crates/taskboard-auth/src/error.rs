//! Error types for authentication and token storage

/// Errors from login, refresh and token storage.
///
/// `Clone` because one refresh outcome is handed to every caller that
/// awaited it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("token storage error: {0}")]
    Storage(String),
}

/// Failure to read or persist the key-value storage file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StorageError(pub String);

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Storage(err.0)
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;
