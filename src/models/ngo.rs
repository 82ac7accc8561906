// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// A registered rescue NGO from the backend directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ngo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub active_reports: Option<i64>,
}

impl Ngo {
    pub fn display_location(&self) -> String {
        match (&self.city, &self.address) {
            (Some(city), _) => city.clone(),
            (None, Some(address)) => address.clone(),
            (None, None) => "Unknown".to_string(),
        }
    }
}
