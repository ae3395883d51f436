//! URL lists attached to a company: downloadable files and videos.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlListRecord {
    pub company_id: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

impl UrlListRecord {
    /// Append `url` unless already listed. Returns false on a duplicate.
    pub fn push_unique(&mut self, url: String) -> bool {
        if self.urls.contains(&url) {
            return false;
        }
        self.urls.push(url);
        true
    }

    /// Remove every occurrence of `url`. Returns whether anything was removed.
    pub fn remove(&mut self, url: &str) -> bool {
        let before = self.urls.len();
        self.urls.retain(|u| u != url);
        self.urls.len() != before
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoUrlRequest {
    pub url: Option<String>,
}
