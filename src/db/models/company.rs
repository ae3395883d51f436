//! Company information page and calendar models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ButtonLink {
    pub additional_button_title: String,
    pub additional_button_link: String,
}

/// Link as submitted by a client, validated into a `ButtonLink`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonLinkInput {
    pub additional_button_title: Option<String>,
    pub additional_button_link: Option<String>,
}

impl ButtonLinkInput {
    pub fn validate(self) -> Option<ButtonLink> {
        match (self.additional_button_title, self.additional_button_link) {
            (Some(title), Some(link)) if !title.trim().is_empty() && !link.trim().is_empty() => {
                Some(ButtonLink {
                    additional_button_title: title,
                    additional_button_link: link,
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDocument {
    pub file_name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInfoRecord {
    pub company_id: String,
    pub description: String,
    #[serde(default)]
    pub additional_information: String,
    #[serde(default)]
    pub links: Vec<ButtonLink>,
    #[serde(default)]
    pub documents: Vec<CompanyDocument>,
    pub sector: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfoRequest {
    pub description: Option<String>,
    pub additional_information: Option<String>,
    pub links: Option<Vec<ButtonLinkInput>>,
    pub sector: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepDocumentsRequest {
    pub documents_to_keep: Option<Vec<CompanyDocument>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub name_date: String,
    pub link_event: String,
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventRequest {
    pub name_date: Option<String>,
    pub link_event: Option<String>,
    pub description: Option<String>,
}

/// Calendar links of a company, stored under the company's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarRecord {
    pub company_id: String,
    #[serde(default)]
    pub links_event: Vec<CalendarEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_validation() {
        let ok = ButtonLinkInput {
            additional_button_title: Some("Web".into()),
            additional_button_link: Some("https://acme.example".into()),
        };
        assert!(ok.validate().is_some());

        let missing = ButtonLinkInput {
            additional_button_title: Some("Web".into()),
            additional_button_link: None,
        };
        assert!(missing.validate().is_none());

        let blank = ButtonLinkInput {
            additional_button_title: Some("  ".into()),
            additional_button_link: Some("https://acme.example".into()),
        };
        assert!(blank.validate().is_none());
    }
}
