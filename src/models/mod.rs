//! Data models for RescueLink entities.
//!
//! This module contains the data structures shared between the session
//! manager, the API client and application code:
//!
//! - `AccountType`, `UserProfile`: the signed-in principal
//! - `Report`: injured/stray animal reports
//! - `Ngo`: entries from the NGO directory

pub mod account;
pub mod ngo;
pub mod report;

pub use account::{AccountType, UserProfile};
pub use ngo::Ngo;
pub use report::{Report, UrgencyLevel};
