use thiserror::Error;

/// Failures of the session lifecycle operations.
///
/// Transient refresh failures are *not* errors: `refresh` and
/// `ensure_fresh_token` surface them as `None` and leave the decision to the
/// caller.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity service rejected the credentials. Not retried.
    #[error("Invalid credentials: {0}")]
    Authentication(String),

    /// Credentials were accepted but no access token could be obtained
    /// within the retry bound. No local session is established.
    #[error("No access token issued after {attempts} attempts")]
    TokenAcquisition { attempts: u32 },

    /// The backend could not resolve or register the account type.
    #[error("Account lookup failed: {0}")]
    AccountResolution(String),

    /// A previously valid session was rejected even after a token refresh.
    /// The session has been logged out; the user must sign in again.
    #[error("Session no longer authorized - please sign in again")]
    Authorization,
}
