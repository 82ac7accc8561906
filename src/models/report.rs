// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// An injured/stray animal report as returned by the backend.
///
/// Only the fields the client core needs are modeled; the backend sends a
/// much wider record and unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    #[serde(default)]
    pub report_id: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub ngo_assigned: Option<i64>,
    #[serde(default)]
    pub ngo_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub urgency_level: Option<UrgencyLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl Report {
    /// Short display label: the title if one was set, otherwise the species
    /// and status.
    pub fn display_title(&self) -> String {
        if let Some(ref title) = self.title {
            return title.clone();
        }
        match self.species {
            Some(ref species) => format!("{} ({})", species, self.status),
            None => self.status.clone(),
        }
    }

    pub fn has_location(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_parses_partial_record() {
        let json = r#"{
            "id": "r-1",
            "user_id": "u-1",
            "status": "open",
            "latitude": 12.97,
            "longitude": 77.59,
            "species": "dog",
            "urgency_level": "high"
        }"#;

        let report: Report = serde_json::from_str(json).unwrap();
        assert!(report.has_location());
        assert_eq!(report.urgency_level, Some(UrgencyLevel::High));
        assert_eq!(report.display_title(), "dog (open)");
    }
}
