//! Downloadable company files and the design's banner/poster.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use super::designs::replace_file;
use super::error::ApiError;
use super::upload::UploadForm;
use super::OptionalId;
use crate::auth::{Identity, SubjectPolicy};
use crate::db::{collections, DesignFilesRecord, Filter, Stored, UrlListRecord};
use crate::storage::folders;
use crate::AppState;

/// Outcome of appending to a per-company URL list.
pub(super) struct ListAppend {
    pub created: bool,
    pub id: String,
    pub urls: Vec<String>,
}

impl ListAppend {
    pub fn status(&self) -> StatusCode {
        if self.created {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        }
    }
}

/// How [`append_url`] treats a URL that is already listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum OnDuplicate {
    /// 409 with the given message
    Conflict(&'static str),
    Append,
}

/// Append `url` to the company's list in `collection`, creating the list on first use.
pub(super) async fn append_url(
    state: &AppState,
    collection: &str,
    company_id: &str,
    url: String,
    on_duplicate: OnDuplicate,
) -> Result<ListAppend, ApiError> {
    let existing = state
        .store
        .find_one_as::<UrlListRecord>(collection, "companyId", company_id)
        .await?;

    match existing {
        Some(mut list) => {
            match on_duplicate {
                OnDuplicate::Conflict(message) => {
                    if !list.data.push_unique(url) {
                        return Err(ApiError::conflict(message));
                    }
                }
                OnDuplicate::Append => list.data.urls.push(url),
            }
            state
                .store
                .update(
                    collection,
                    &list.id,
                    serde_json::json!({ "urls": list.data.urls }),
                )
                .await?;
            Ok(ListAppend {
                created: false,
                id: list.id,
                urls: list.data.urls,
            })
        }
        None => {
            let list = UrlListRecord {
                company_id: company_id.to_string(),
                urls: vec![url],
            };
            let id = state.store.add_as(collection, &list).await?;
            Ok(ListAppend {
                created: true,
                id,
                urls: list.urls,
            })
        }
    }
}

pub(super) async fn company_lists(
    state: &AppState,
    collection: &str,
    company_id: &str,
) -> Result<Vec<Stored<UrlListRecord>>, ApiError> {
    let by_company = [Filter::eq("companyId", company_id)];
    Ok(state
        .store
        .find_as::<UrlListRecord>(collection, &by_company)
        .await?)
}

pub async fn company_files(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
) -> Result<Json<Vec<Stored<UrlListRecord>>>, ApiError> {
    let company_id = super::subject(SubjectPolicy::SelfOrPublic, &identity, &id)?;
    let lists = company_lists(&state, collections::DOWNLOADS, &company_id).await?;
    Ok(Json(lists))
}

pub async fn add_file(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
    form: UploadForm,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    identity.deny_visitor("upload files")?;
    let company_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;

    let file = form
        .file("file")
        .ok_or_else(|| ApiError::validation("No file provided."))?;
    let stored = state.storage.upload(file, folders::FILES).await?;

    // Every upload gets a fresh URL, so a repeated file is listed again
    let appended = append_url(
        &state,
        collections::DOWNLOADS,
        &company_id,
        stored.url,
        OnDuplicate::Append,
    )
    .await?;

    tracing::info!(
        company_id = %company_id,
        list_id = %appended.id,
        file_name = %file.file_name,
        "Download file added"
    );

    Ok((
        appended.status(),
        Json(serde_json::json!({
            "message": "File uploaded successfully",
            "id": appended.id,
            "urls": appended.urls,
        })),
    ))
}

/// Replace the banner and/or poster of the company's design files.
pub async fn update_files(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
    form: UploadForm,
) -> Result<Json<Value>, ApiError> {
    identity.deny_visitor("update files")?;
    let company_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;

    let files = state
        .store
        .find_one_as::<DesignFilesRecord>(collections::DESIGN_FILES, "companyId", &company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Files not found for this company."))?;

    let banner = replace_file(&state, form.file("banner"), folders::BANNERS, files.data.banner).await?;
    let poster = replace_file(&state, form.file("poster"), folders::POSTERS, files.data.poster).await?;
    let updated = serde_json::json!({
        "banner": banner,
        "poster": poster,
        "updatedAt": Utc::now(),
    });
    state
        .store
        .update(collections::DESIGN_FILES, &files.id, updated.clone())
        .await?;

    tracing::info!(company_id = %company_id, files_id = %files.id, "Design files updated");

    Ok(Json(serde_json::json!({
        "message": "Files updated successfully",
        "updatedData": updated,
    })))
}
