//! Identity service integration.
//!
//! RescueLink delegates accounts, sessions and token issuance to a hosted
//! identity service, distinct from the platform's own REST backend. The
//! session manager talks to it through the `IdentityProvider` trait;
//! `IdentityClient` is the HTTP implementation.

pub mod client;
pub mod error;

use async_trait::async_trait;
use serde::Deserialize;

pub use client::IdentityClient;
pub use error::IdentityError;

/// A user record as the identity service reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "emailVerification", default)]
    pub verified: bool,
}

/// Result of a successful identity login. The access token is issued lazily
/// by some deployments, so it may be absent here; the session manager
/// retries acquisition separately.
#[derive(Debug, Clone)]
pub struct IdentityLogin {
    pub user: IdentityUser,
    pub token: Option<String>,
}

/// Operations the session manager needs from the identity service.
///
/// `current_user` distinguishes "no active session" (`Ok(None)`) from
/// transport failures (`Err`); the session manager logs out on the former
/// and merely skips a refresh on the latter. `issue_token` likewise returns
/// `Ok(None)` when the service declines to mint a token for the current
/// session.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<IdentityUser, IdentityError>;

    async fn login(&self, email: &str, password: &str) -> Result<IdentityLogin, IdentityError>;

    async fn current_user(&self) -> Result<Option<IdentityUser>, IdentityError>;

    async fn issue_token(&self) -> Result<Option<String>, IdentityError>;

    async fn delete_session(&self) -> Result<(), IdentityError>;
}
