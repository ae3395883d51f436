//! Form bodies for endpoints that take uploads.
//!
//! [`UploadForm`] accepts either `multipart/form-data` or a JSON object, so
//! the same handler serves browsers posting files and API clients posting
//! plain JSON. In a JSON body, non-string values are kept as their JSON text
//! and decoded again through [`UploadForm::json`].

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ApiError;
use crate::storage::UploadedFile;

#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl UploadForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// First of several accepted spellings of the same field.
    pub fn text_any(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.text(name))
    }

    /// Owned copy of a text field, with blank values treated as absent.
    pub fn string(&self, name: &str) -> Option<String> {
        self.text(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name).and_then(|files| files.first())
    }

    pub fn files(&self, name: &str) -> &[UploadedFile] {
        self.files.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Decode a JSON-valued text field. Absent or blank fields yield `None`.
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ApiError> {
        let Some(raw) = self.text(name).filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };
        serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| ApiError::validation(format!("Invalid {} field: {}", name, e)))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }

    pub fn insert_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn insert_file(&mut self, name: impl Into<String>, file: UploadedFile) {
        self.files.entry(name.into()).or_default().push(file);
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation(format!("Malformed multipart body: {}", e.body_text())))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let data = field.bytes().await.map_err(|e| {
                        ApiError::validation(format!("Failed to read file {}: {}", name, e.body_text()))
                    })?;

                    // Browsers submit untouched file inputs as empty, nameless parts
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }

                    form.insert_file(
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            data,
                        },
                    );
                }
                None => {
                    let value = field.text().await.map_err(|e| {
                        ApiError::validation(format!("Failed to read field {}: {}", name, e.body_text()))
                    })?;
                    form.insert_text(name, value);
                }
            }
        }

        Ok(form)
    }

    fn from_json(value: Value) -> Result<Self, ApiError> {
        let Value::Object(object) = value else {
            return Err(ApiError::validation("Request body must be a JSON object"));
        };

        let mut form = Self::default();
        for (name, value) in object {
            match value {
                Value::Null => {}
                Value::String(s) => form.insert_text(name, s),
                other => form.insert_text(name, other.to_string()),
            }
        }
        Ok(form)
    }
}

#[async_trait]
impl<S> FromRequest<S> for UploadForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::validation(e.body_text()))?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/json") {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| ApiError::validation(e.body_text()))?;
            Self::from_json(value)
        } else if content_type.is_empty() {
            Ok(Self::default())
        } else {
            Err(ApiError::validation(format!(
                "Unsupported content type: {}",
                content_type
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ButtonLinkInput;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use serde_json::json;

    fn multipart_request(body: &str) -> Request {
        HttpRequest::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "multipart/form-data; boundary=XyZ")
            .body(Body::from(body.replace('\n', "\r\n")))
            .unwrap()
    }

    #[tokio::test]
    async fn test_multipart_fields_and_files() {
        let body = "--XyZ
Content-Disposition: form-data; name=\"standId\"

stand-1
--XyZ
Content-Disposition: form-data; name=\"banner\"; filename=\"banner.png\"
Content-Type: image/png

PNGDATA
--XyZ
Content-Disposition: form-data; name=\"poster\"; filename=\"\"
Content-Type: application/octet-stream


--XyZ--
";
        let form = UploadForm::from_request(multipart_request(body), &())
            .await
            .unwrap();

        assert_eq!(form.text("standId"), Some("stand-1"));
        let banner = form.file("banner").unwrap();
        assert_eq!(banner.file_name, "banner.png");
        assert_eq!(banner.content_type, "image/png");
        assert_eq!(&banner.data[..], b"PNGDATA");
        assert!(form.file("poster").is_none());
        assert!(form.files("documents").is_empty());
    }

    #[tokio::test]
    async fn test_json_body() {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "description": "We build stands",
                    "links": [{"additionalButtonTitle": "Web", "additionalButtonLink": "https://acme.example"}],
                    "sector": null
                })
                .to_string(),
            ))
            .unwrap();
        let form = UploadForm::from_request(request, &()).await.unwrap();

        assert_eq!(form.text("description"), Some("We build stands"));
        assert!(form.text("sector").is_none());
        let links: Vec<ButtonLinkInput> = form.json("links").unwrap().unwrap();
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_unsupported_content_type() {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "text/plain")
            .body(Body::from("hello"))
            .unwrap();
        let err = UploadForm::from_request(request, &()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_json_field_errors_and_blanks() {
        let mut form = UploadForm::default();
        form.insert_text("links", "not json");
        form.insert_text("empty", "  ");

        assert!(form.json::<Vec<ButtonLinkInput>>("links").is_err());
        assert!(form.json::<Vec<ButtonLinkInput>>("empty").unwrap().is_none());
        assert!(form.json::<Vec<ButtonLinkInput>>("missing").unwrap().is_none());
        assert_eq!(form.string("empty"), None);
    }
}
