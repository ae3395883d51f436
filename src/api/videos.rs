use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;
use std::sync::Arc;

use super::error::ApiError;
use super::files::{append_url, company_lists, OnDuplicate};
use super::validation::{required, validate_link};
use super::OptionalId;
use crate::auth::{Identity, SubjectPolicy};
use crate::db::{collections, Stored, UrlListRecord, VideoUrlRequest};
use crate::AppState;

pub async fn add_video(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
    Json(request): Json<VideoUrlRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    identity.deny_visitor("add videos")?;
    let company_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;

    let url = required(request.url.as_deref(), "url")?.to_string();
    validate_link(&url).map_err(ApiError::validation)?;

    let appended = append_url(
        &state,
        collections::VIDEOS,
        &company_id,
        url,
        OnDuplicate::Conflict("Video URL already exists for this company"),
    )
    .await?;

    tracing::info!(company_id = %company_id, list_id = %appended.id, "Video URL added");

    Ok((
        appended.status(),
        Json(serde_json::json!({
            "message": "Video URL added successfully",
            "id": appended.id,
            "urls": appended.urls,
        })),
    ))
}

pub async fn company_videos(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
) -> Result<Json<Vec<Stored<UrlListRecord>>>, ApiError> {
    let company_id = super::subject(SubjectPolicy::SelfOrPublic, &identity, &id)?;
    let lists = company_lists(&state, collections::VIDEOS, &company_id).await?;
    Ok(Json(lists))
}

pub async fn delete_video(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
    Json(request): Json<VideoUrlRequest>,
) -> Result<Json<Value>, ApiError> {
    identity.deny_visitor("delete video URLs")?;
    let company_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;
    let url = required(request.url.as_deref(), "url")?.to_string();

    let mut list = state
        .store
        .find_one_as::<UrlListRecord>(collections::VIDEOS, "companyId", &company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No videos found for this company"))?;

    if !list.data.remove(&url) {
        return Err(ApiError::not_found("Video URL not found"));
    }
    state
        .store
        .update(
            collections::VIDEOS,
            &list.id,
            serde_json::json!({ "urls": list.data.urls }),
        )
        .await?;

    tracing::info!(company_id = %company_id, list_id = %list.id, "Video URL removed");

    Ok(Json(serde_json::json!({
        "message": "Video URL deleted successfully",
        "removedUrl": url,
    })))
}
