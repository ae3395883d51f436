//! Stand design models: the design itself, its banner/poster files, and the stand/model catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Stored;

/// Logo snapshot embedded in designs and offers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogoRef {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignRecord {
    pub company_id: String,
    pub stand_id: String,
    pub model_id: String,
    pub logo: Option<LogoRef>,
    /// Id of the companion `DesignFilesRecord`
    pub file_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stand_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Banner and poster of a company's stand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignFilesRecord {
    pub company_id: String,
    pub banner: Option<String>,
    pub poster: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Entry of the stand or model catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub name: String,
    pub file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCatalogItemRequest {
    pub name: Option<String>,
    pub file_url: Option<String>,
    pub config: Option<serde_json::Value>,
}

/// A design with everything it references resolved.
#[derive(Debug, Clone, Serialize)]
pub struct DesignView {
    pub design: Stored<DesignRecord>,
    pub stand: Option<Stored<CatalogItem>>,
    pub model: Option<Stored<CatalogItem>>,
    pub files: Option<Stored<DesignFilesRecord>>,
}
