//! Job offer models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LogoRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRecord {
    pub position: String,
    pub workplace_type: Option<String>,
    pub location: String,
    pub job_type: Option<String>,
    pub description: String,
    pub company_id: String,
    pub company_name: String,
    pub sector: Option<String>,
    pub logo: Option<LogoRef>,
    pub link: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl OfferRecord {
    /// Case-insensitive substring match on position and description.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        self.position.to_lowercase().contains(&keyword)
            || self.description.to_lowercase().contains(&keyword)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferRequest {
    pub position: Option<String>,
    pub workplace_type: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub sector: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
}

/// Partial offer update. Empty strings count as absent.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOfferRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workplace_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferSearchQuery {
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub workplace_type: Option<String>,
    /// Company name
    pub company: Option<String>,
    pub sector: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(position: &str, description: &str) -> OfferRecord {
        OfferRecord {
            position: position.into(),
            workplace_type: None,
            location: "Madrid".into(),
            job_type: None,
            description: description.into(),
            company_id: "co1".into(),
            company_name: "Acme".into(),
            sector: None,
            logo: None,
            link: "https://acme.example/jobs/1".into(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_keyword_matches_position_or_description() {
        let o = offer("Backend Engineer", "Rust services for fairs");
        assert!(o.matches_keyword("engineer"));
        assert!(o.matches_keyword("RUST"));
        assert!(!o.matches_keyword("designer"));
    }
}
