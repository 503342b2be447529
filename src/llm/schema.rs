//! Structured work-history shape expected back from the model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    pub total_experience_years: f64,
    #[serde(default)]
    pub experience_by_domain: BTreeMap<String, f64>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl ExperienceRecord {
    /// Only the shape is checked; the model's numbers are trusted otherwise.
    pub fn validate(self) -> Result<Self, String> {
        if !self.total_experience_years.is_finite() || self.total_experience_years < 0.0 {
            return Err(format!(
                "total_experience_years must be a non-negative number, got {}",
                self.total_experience_years
            ));
        }
        Ok(self)
    }

    /// One line per role, or `N/A`.
    pub fn roles_summary(&self) -> String {
        if self.roles.is_empty() {
            return "N/A".to_string();
        }
        self.roles
            .iter()
            .map(Role::describe)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn domains_json(&self) -> String {
        serde_json::to_string(&self.experience_by_domain).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Models often emit `null` for unknown fields (an ongoing role has no end).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Role {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

impl Role {
    pub fn describe(&self) -> String {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        format!(
            "- {} at {} ({} - {}, {})",
            field(&self.title),
            field(&self.company),
            field(&self.start),
            field(&self.end),
            field(&self.domain)
        )
    }
}

/// Parsed record with the keyword match injected, so it stands on its own
/// when persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceReport {
    #[serde(flatten)]
    pub record: ExperienceRecord,
    pub matched_keywords: Vec<String>,
    pub match_score: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_summary() {
        let record = ExperienceRecord {
            total_experience_years: 4.0,
            experience_by_domain: BTreeMap::from([("IT".to_string(), 4.0)]),
            roles: vec![Role {
                title: Some("Engineer".to_string()),
                company: Some("XYZ Corp".to_string()),
                start: Some("Jan 2020".to_string()),
                end: None,
                domain: Some("IT".to_string()),
            }],
        };
        assert_eq!(record.roles_summary(), "- Engineer at XYZ Corp (Jan 2020 - , IT)");
        assert_eq!(record.domains_json(), r#"{"IT":4.0}"#);
    }

    #[test]
    fn test_negative_years_rejected() {
        let record = ExperienceRecord {
            total_experience_years: -1.0,
            experience_by_domain: BTreeMap::new(),
            roles: vec![],
        };
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = ExperienceReport {
            record: ExperienceRecord {
                total_experience_years: 6.5,
                experience_by_domain: BTreeMap::new(),
                roles: vec![],
            },
            matched_keywords: vec!["Python".to_string()],
            match_score: 50,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["total_experience_years"], 6.5);
        assert_eq!(value["match_score"], 50);
        assert_eq!(value["roles"], serde_json::json!([]));
    }
}
