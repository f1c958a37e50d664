use thiserror::Error;

/// Failure modes of a request through the resilient API client.
///
/// `AuthExpired` means authorization failed and the token refresh could not
/// restore it; the credential store has already been cleared by the time it
/// propagates, so the caller's only recourse is a fresh login. Everything
/// else is surfaced once, never retried by the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session expired, login required")]
    AuthExpired,
    #[error("request timed out")]
    Timeout,
    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ApiError::AuthExpired)
    }
}
