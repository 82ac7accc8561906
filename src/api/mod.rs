//! REST API client module for the RescueLink backend.
//!
//! This module provides the `ApiClient` used by all feature code, the
//! account directory calls used during login/registration, and the backend
//! path table.
//!
//! The backend authenticates with JWT bearer tokens obtained from the
//! identity service; `ApiClient` keeps them fresh transparently.

pub mod cache;
pub mod client;
pub mod directory;
pub mod endpoints;
pub mod error;

pub use client::ApiClient;
pub use directory::{AccountDirectory, AccountRecord, DirectoryClient, NewAccount};
pub use error::ApiError;
