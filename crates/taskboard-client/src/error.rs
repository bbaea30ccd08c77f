//! Error types for API requests

use taskboard_auth::AuthError;

/// Errors from `RequestPipeline::send` and the typed API.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The retry after a successful refresh was rejected again.
    #[error("request unauthorized after token refresh")]
    Unauthorized,

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl RequestError {
    /// Whether this failure ended the session (the caller was sent to login).
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, RequestError::Unauthorized | RequestError::Auth(_))
    }

    /// HTTP status behind the error, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Unauthorized => Some(401),
            RequestError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Label for the `status` dimension of request metrics.
    pub(crate) fn metric_label(&self) -> String {
        match self {
            RequestError::Unauthorized => "401".into(),
            RequestError::Auth(_) => "auth_error".into(),
            RequestError::Api { status, .. } => status.to_string(),
            RequestError::Transport(_) => "transport_error".into(),
            RequestError::Decode(_) => "decode_error".into(),
            RequestError::InvalidRequest(_) => "invalid_request".into(),
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, RequestError>;
