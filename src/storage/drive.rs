//! Google Drive backend.
//!
//! Authenticates as a service account: an RS256-signed assertion is exchanged
//! for a short-lived access token, which is cached until shortly before it
//! expires. Every uploaded file is made readable by anyone holding the link.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{FileStorage, StoredFile, UploadedFile};

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh the access token this long before Google says it expires
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The subset of a service-account key file we need.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    id: String,
}

pub struct DriveStorage {
    client: reqwest::Client,
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    token: Mutex<Option<CachedToken>>,
    /// Folder name -> folder id
    folders: DashMap<String, String>,
}

impl DriveStorage {
    pub async fn from_key_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read service account key: {}", path.display()))?;
        let key: ServiceAccountKey =
            serde_json::from_str(&content).context("Failed to parse service account key")?;
        Self::new(key)
    }

    pub fn new(key: ServiceAccountKey) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Failed to parse service account private key PEM")?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("fairground/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;

        tracing::info!(account = %key.client_email, "Google Drive storage configured");

        Ok(Self {
            client,
            client_email: key.client_email,
            token_uri: key.token_uri,
            signing_key,
            token: Mutex::new(None),
            folders: DashMap::new(),
        })
    }

    fn assertion(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DRIVE_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + 3600,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .context("Failed to sign service account assertion")
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.token.clone());
            }
        }

        let assertion = self.assertion()?;
        let response = self
            .client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("Failed to request Google access token")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Google token endpoint error: {} - {}", status, body);
        }

        let token: AccessTokenResponse = response
            .json()
            .await
            .context("Failed to parse Google access token response")?;

        tracing::debug!(expires_in = token.expires_in, "Obtained Google access token");
        *cached = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }

    async fn folder_id(&self, name: &str) -> Result<String> {
        if let Some(id) = self.folders.get(name) {
            return Ok(id.clone());
        }

        let token = self.access_token().await?;
        let query = format!(
            "name='{}' and mimeType='{}' and trashed=false",
            escape_query(name),
            FOLDER_MIME
        );
        let response = self
            .client
            .get(FILES_URL)
            .bearer_auth(&token)
            .query(&[("q", query.as_str()), ("fields", "files(id, name)")])
            .send()
            .await
            .context("Failed to search Drive folders")?;
        let list: FileList = json_or_bail(response, "search folders").await?;

        let id = match list.files.into_iter().next() {
            Some(folder) => folder.id,
            None => {
                let response = self
                    .client
                    .post(FILES_URL)
                    .bearer_auth(&token)
                    .query(&[("fields", "id")])
                    .json(&json!({ "name": name, "mimeType": FOLDER_MIME }))
                    .send()
                    .await
                    .context("Failed to create Drive folder")?;
                let created: FileRef = json_or_bail(response, "create folder").await?;
                tracing::info!(folder = %name, folder_id = %created.id, "Created Drive folder");
                created.id
            }
        };

        self.folders.insert(name.to_string(), id.clone());
        Ok(id)
    }

    async fn make_public(&self, token: &str, file_id: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/{}/permissions", FILES_URL, file_id))
            .bearer_auth(token)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .context("Failed to set Drive permissions")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Drive permission error: {} - {}", status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl FileStorage for DriveStorage {
    async fn upload(&self, file: &UploadedFile, folder: &str) -> Result<StoredFile> {
        let folder_id = self.folder_id(folder).await?;
        let token = self.access_token().await?;

        let boundary = format!("fairground-{}", uuid::Uuid::new_v4().simple());
        let metadata = json!({ "name": file.file_name, "parents": [folder_id] });
        let body = multipart_related_body(&metadata, file, &boundary);

        let response = self
            .client
            .post(UPLOAD_URL)
            .bearer_auth(&token)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await
            .context("Failed to upload file to Drive")?;
        let created: FileRef = json_or_bail(response, "upload file").await?;

        self.make_public(&token, &created.id).await?;

        tracing::info!(folder = %folder, file_id = %created.id, "Uploaded file to Drive");
        Ok(StoredFile {
            url: format!("https://drive.google.com/uc?id={}", created.id),
            file_id: created.id,
        })
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        let token = self.access_token().await?;
        let response = self
            .client
            .delete(format!("{}/{}", FILES_URL, file_id))
            .bearer_auth(&token)
            .send()
            .await
            .context("Failed to delete file from Drive")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Drive delete error: {} - {}", status, body);
        }
        tracing::info!(file_id = %file_id, "Deleted file from Drive");
        Ok(())
    }
}

async fn json_or_bail<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    action: &str,
) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("Drive API error ({}): {} - {}", action, status, body);
    }
    response
        .json()
        .await
        .with_context(|| format!("Failed to parse Drive response ({})", action))
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn multipart_related_body(metadata: &serde_json::Value, file: &UploadedFile, boundary: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(file.data.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
    body.extend_from_slice(&file.data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_invalid_private_key_is_rejected() {
        let key = ServiceAccountKey {
            client_email: "svc@project.iam.gserviceaccount.com".to_string(),
            private_key: "not-a-valid-key".to_string(),
            token_uri: default_token_uri(),
        };
        assert!(DriveStorage::new(key).is_err());
    }

    #[test]
    fn test_key_file_defaults_token_uri() {
        let key: ServiceAccountKey = serde_json::from_str(
            r#"{"client_email": "svc@example.com", "private_key": "pem", "type": "service_account"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_escape_query() {
        assert_eq!(escape_query("logos"), "logos");
        assert_eq!(escape_query("o'brien"), "o\\'brien");
    }

    #[test]
    fn test_multipart_related_body() {
        let file = UploadedFile {
            file_name: "a.txt".to_string(),
            content_type: "text/plain".to_string(),
            data: Bytes::from_static(b"hello"),
        };
        let metadata = json!({ "name": "a.txt", "parents": ["folder1"] });
        let body = String::from_utf8(multipart_related_body(&metadata, &file, "b0undary")).unwrap();

        assert!(body.starts_with("--b0undary\r\nContent-Type: application/json"));
        assert!(body.contains(r#""parents":["folder1"]"#));
        assert!(body.contains("Content-Type: text/plain\r\n\r\nhello\r\n"));
        assert!(body.ends_with("--b0undary--\r\n"));
    }
}
