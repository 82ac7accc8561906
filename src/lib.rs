//! Client core for the RescueLink animal rescue coordination platform.
//!
//! RescueLink apps report injured and stray animals, track rescue reports
//! and browse the NGO directory. This crate is the non-UI core those apps
//! share: the session/token lifecycle, the identity service client and the
//! authenticated backend API client.
//!
//! The central piece is [`SessionManager`]: it signs users in against the
//! identity service, resolves their account type with the backend, persists
//! the session, and keeps the bearer token fresh - proactively on a timer
//! and reactively (single-flight) when a request is rejected. [`ApiClient`]
//! wraps every backend call with that token and a one-shot retry after a
//! transparent refresh.
//!
//! Construct everything once at application start:
//!
//! ```no_run
//! use std::sync::Arc;
//! use rescuelink::{ApiClient, Config, FileStore, SessionManager};
//! use rescuelink::auth::CredentialStore;
//! use rescuelink::api::DirectoryClient;
//! use rescuelink::identity::IdentityClient;
//!
//! # async fn start() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let storage = Arc::new(FileStore::new(Config::data_dir()?));
//! let store = CredentialStore::new(storage.clone());
//! let identity = Arc::new(IdentityClient::new(&config, storage)?);
//! let directory = Arc::new(DirectoryClient::new(&config)?);
//!
//! let session = SessionManager::new(identity, directory, store);
//! let _restored = session.restore().await;
//! let _api = ApiClient::new(&config, session.clone())?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod identity;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthError, AuthStatus, FileStore, Session, SessionManager};
pub use config::Config;
pub use models::{AccountType, Ngo, Report, UserProfile};
