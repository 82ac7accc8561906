use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Identity service rejected the credentials: {0}")]
    InvalidCredentials(String),

    #[error("Identity session expired or missing")]
    SessionExpired,

    #[error("Identity service rate limited - please wait before retrying")]
    RateLimited,

    #[error("Identity service error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid identity response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl IdentityError {
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 | 422 => IdentityError::InvalidCredentials(truncated),
            401 | 403 => IdentityError::SessionExpired,
            429 => IdentityError::RateLimited,
            500..=599 => IdentityError::ServerError(truncated),
            _ => IdentityError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}
