use anyhow::{bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;

use super::{FileStorage, StoredFile, UploadedFile};

#[derive(Debug, Clone)]
pub struct MemoryObject {
    pub folder: String,
    pub file: UploadedFile,
}

/// Keeps uploads in process memory. URLs use the same shape as Drive links.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: DashMap<String, MemoryObject>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.objects.contains_key(file_id)
    }

    pub fn get(&self, file_id: &str) -> Option<MemoryObject> {
        self.objects.get(file_id).map(|o| o.clone())
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn upload(&self, file: &UploadedFile, folder: &str) -> Result<StoredFile> {
        let file_id = uuid::Uuid::new_v4().simple().to_string();
        self.objects.insert(
            file_id.clone(),
            MemoryObject {
                folder: folder.to_string(),
                file: file.clone(),
            },
        );
        Ok(StoredFile {
            url: format!("https://drive.google.com/uc?id={}", file_id),
            file_id,
        })
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        if self.objects.remove(file_id).is_none() {
            bail!("File {} not found", file_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file_id_from_url;
    use bytes::Bytes;

    fn file() -> UploadedFile {
        UploadedFile {
            file_name: "logo.png".to_string(),
            content_type: "image/png".to_string(),
            data: Bytes::from_static(b"\x89PNG"),
        }
    }

    #[tokio::test]
    async fn test_upload_and_delete() {
        let storage = MemoryStorage::new();
        let stored = storage.upload(&file(), "logos").await.unwrap();

        assert_eq!(file_id_from_url(&stored.url), Some(stored.file_id.clone()));
        let object = storage.get(&stored.file_id).unwrap();
        assert_eq!(object.folder, "logos");
        assert_eq!(object.file.file_name, "logo.png");

        storage.delete(&stored.file_id).await.unwrap();
        assert!(storage.is_empty());
        assert!(storage.delete(&stored.file_id).await.is_err());
    }
}
