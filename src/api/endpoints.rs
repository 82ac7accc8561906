//! Backend path table.
//!
//! Paths are backend-owned configuration; this module only centralizes the
//! ones the client core touches so they are not scattered through the code.

// Auth
pub const GET_ACCOUNT_TYPE: &str = "/users/auth/get_type";
pub const REGISTER_ACCOUNT: &str = "/users/auth/register";

// User profile
pub const PROFILE_ME: &str = "/users/profile/me/";
pub const REGISTER_DEVICE: &str = "/users/profile/register-device/";

// Reports
pub const OWN_REPORTS: &str = "/users/reports/own/";
pub const REPORTS: &str = "/reports/reports/";
pub const NEARBY_REPORTS: &str = "/reports/reports/nearby/";

// NGO directory
pub const NGO_DIRECTORY: &str = "/ngo/";

pub fn report_detail(report_id: &str) -> String {
    format!("/reports/reports/{}/", report_id)
}

pub fn ngo_detail(ngo_id: &str) -> String {
    format!("/ngo/{}/", ngo_id)
}
