//! Authentication and session lifecycle.
//!
//! This module provides:
//! - `SessionManager`: login/registration/logout, single-flight token
//!   refresh and proactive refresh scheduling
//! - `CredentialStore`: best-effort persistence of the composed session
//! - `token`: expiry decoding for JWT-shaped bearer tokens
//!
//! Sessions are persisted on every mutation and restored once at process
//! start via `SessionManager::restore`.

pub mod error;
pub mod session;
pub mod store;
pub mod token;

pub use error::AuthError;
pub use session::{AuthStatus, Session, SessionManager, DEFAULT_MIN_TOKEN_VALIDITY};
pub use store::{CredentialStore, FileStore, KeyValueStore, MemoryStore, StoredSession};
