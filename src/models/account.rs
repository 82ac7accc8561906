use serde::{Deserialize, Serialize};

/// The kind of account a signed-in principal holds on the platform.
///
/// The backend distinguishes ordinary users (reporters, volunteers) from
/// registered NGOs. Anything else the backend sends deserializes to
/// `Unknown` rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum AccountType {
    User,
    Ngo,
    #[default]
    Unknown,
}

impl From<String> for AccountType {
    fn from(s: String) -> Self {
        AccountType::parse(&s)
    }
}

impl AccountType {
    /// Stable string form used for persistence and request bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::User => "user",
            AccountType::Ngo => "ngo",
            AccountType::Unknown => "unknown",
        }
    }

    /// Parse the persisted string form. Unrecognized values map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "user" => AccountType::User,
            "ngo" => AccountType::Ngo,
            _ => AccountType::Unknown,
        }
    }
}

/// Profile of the signed-in principal, composed at login time from the
/// identity service user and the backend account record.
///
/// `extra` carries whatever entity data the backend attached (NGO address,
/// volunteer flags, ...) without this crate having to know its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub entity_id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(flatten, default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
