//! Object storage for uploaded files (logos, banners, posters, documents).

mod drive;
mod memory;

pub use drive::DriveStorage;
pub use memory::MemoryStorage;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

use crate::config::{StorageConfig, StorageProvider};

/// A file received in a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_id: String,
    /// Publicly readable URL
    pub url: String,
}

/// Folder labels used when uploading.
pub mod folders {
    pub const LOGOS: &str = "logos";
    pub const PROFILE_IMAGES: &str = "profileImages";
    pub const CV_FILES: &str = "cvFiles";
    pub const BANNERS: &str = "banners";
    pub const POSTERS: &str = "posters";
    pub const FILES: &str = "files";
    pub const COMPANY_DOCUMENTS: &str = "company_documents";
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `file` under the folder labelled `folder`.
    async fn upload(&self, file: &UploadedFile, folder: &str) -> Result<StoredFile>;

    async fn delete(&self, file_id: &str) -> Result<()>;
}

impl dyn FileStorage + '_ {
    /// Delete the object behind `url`, logging instead of failing.
    pub async fn delete_url_best_effort(&self, url: &str) {
        let Some(file_id) = file_id_from_url(url) else {
            tracing::warn!(url = %url, "Cannot derive file id from URL, skipping delete");
            return;
        };
        if let Err(e) = self.delete(&file_id).await {
            tracing::warn!(file_id = %file_id, "Failed to delete stored file: {:#}", e);
        }
    }
}

lazy_static! {
    /// `https://drive.google.com/file/d/<id>/view`
    static ref PATH_ID_REGEX: Regex = Regex::new(r"/d/([^/?#]+)/").unwrap();

    /// `https://drive.google.com/uc?id=<id>`
    static ref QUERY_ID_REGEX: Regex = Regex::new(r"[?&]id=([^&#]+)").unwrap();
}

/// Extract the storage file id from either URL form this service hands out.
pub fn file_id_from_url(url: &str) -> Option<String> {
    PATH_ID_REGEX
        .captures(url)
        .or_else(|| QUERY_ID_REGEX.captures(url))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Build the configured storage backend.
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn FileStorage>> {
    match config.provider {
        StorageProvider::Drive => {
            let drive = DriveStorage::from_key_file(&config.credentials_path).await?;
            Ok(Arc::new(drive))
        }
        StorageProvider::Memory => {
            tracing::warn!("Using in-memory file storage; uploads are lost on restart");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_from_query_url() {
        assert_eq!(
            file_id_from_url("https://drive.google.com/uc?id=abc123").as_deref(),
            Some("abc123")
        );
        assert_eq!(
            file_id_from_url("https://drive.google.com/uc?export=view&id=abc123&x=1").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn test_file_id_from_path_url() {
        assert_eq!(
            file_id_from_url("https://drive.google.com/file/d/1AbC-xyz_9/view?usp=sharing").as_deref(),
            Some("1AbC-xyz_9")
        );
    }

    #[test]
    fn test_file_id_from_unrelated_url() {
        assert_eq!(file_id_from_url("https://example.com/logo.png"), None);
        assert_eq!(file_id_from_url(""), None);
    }
}
