//! Stand designs and the stand/model catalog.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::error::ApiError;
use super::upload::UploadForm;
use super::users::{logo_ref, patch_profile, CreatedResponse};
use super::validation::required;
use super::OptionalId;
use crate::auth::{Identity, SubjectPolicy};
use crate::db::{
    collections, CatalogItem, CreateCatalogItemRequest, DesignFilesRecord, DesignPatch,
    DesignRecord, DesignView, Filter, Stored, UserPatch,
};
use crate::storage::{folders, UploadedFile};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignCreatedResponse {
    pub message: &'static str,
    pub id_design: String,
}

/// The design of `company_id` with its stand, model and files resolved.
pub(super) async fn load_design_view(
    state: &AppState,
    company_id: &str,
) -> Result<Option<DesignView>, ApiError> {
    let Some(design) = state
        .store
        .find_one_as::<DesignRecord>(collections::DESIGNS, "companyId", company_id)
        .await?
    else {
        return Ok(None);
    };
    Ok(Some(resolve_view(state, design).await?))
}

async fn resolve_view(state: &AppState, design: Stored<DesignRecord>) -> Result<DesignView, ApiError> {
    let (stand, model, files) = tokio::try_join!(
        state
            .store
            .get_as::<CatalogItem>(collections::STANDS, &design.data.stand_id),
        state
            .store
            .get_as::<CatalogItem>(collections::MODELS, &design.data.model_id),
        state
            .store
            .get_as::<DesignFilesRecord>(collections::DESIGN_FILES, &design.data.file_id),
    )?;

    Ok(DesignView {
        design,
        stand,
        model,
        files,
    })
}

async fn upload_optional(
    state: &AppState,
    file: Option<&UploadedFile>,
    folder: &str,
) -> Result<Option<String>, ApiError> {
    match file {
        Some(file) => Ok(Some(state.storage.upload(file, folder).await?.url)),
        None => Ok(None),
    }
}

async fn set_design_flag(
    state: &AppState,
    jar: CookieJar,
    caller: &Identity,
    company_id: &str,
    complete: bool,
) -> Result<CookieJar, ApiError> {
    let patch = UserPatch {
        design_complete: Some(complete),
        ..Default::default()
    };
    patch_profile(state, jar, caller, company_id, &patch).await
}

pub async fn add_design(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    jar: CookieJar,
    id: OptionalId,
    form: UploadForm,
) -> Result<(StatusCode, CookieJar, Json<DesignCreatedResponse>), ApiError> {
    identity.deny_visitor("add designs")?;
    let company_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;

    let stand_id = required(form.text_any(&["standId", "standID"]), "standId")?.to_string();
    let model_id = required(form.text_any(&["modelId", "modelID"]), "modelId")?.to_string();

    if state
        .store
        .get(collections::USERS, &company_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("User not found"));
    }

    let by_company = [Filter::eq("companyId", company_id.as_str())];
    let (existing_design, existing_files) = tokio::try_join!(
        state.store.find(collections::DESIGNS, &by_company),
        state.store.find(collections::DESIGN_FILES, &by_company),
    )?;
    if !existing_design.is_empty() {
        return Err(ApiError::conflict("Design already exists for this company"));
    }
    if !existing_files.is_empty() {
        return Err(ApiError::conflict("Files already exist for this company."));
    }

    let banner = upload_optional(&state, form.file("banner"), folders::BANNERS).await?;
    let poster = upload_optional(&state, form.file("poster"), folders::POSTERS).await?;
    let now = Utc::now();

    let files = DesignFilesRecord {
        company_id: company_id.clone(),
        banner,
        poster,
        created_at: now,
        updated_at: None,
    };
    let file_id = state.store.add_as(collections::DESIGN_FILES, &files).await?;

    let design = DesignRecord {
        company_id: company_id.clone(),
        stand_id,
        model_id,
        logo: logo_ref(&state, &company_id).await?,
        file_id,
        created_at: now,
        updated_at: None,
    };
    let design_id = state.store.add_as(collections::DESIGNS, &design).await?;

    let jar = set_design_flag(&state, jar, &identity, &company_id, true).await?;

    tracing::info!(company_id = %company_id, design_id = %design_id, "Design created");

    Ok((
        StatusCode::CREATED,
        jar,
        Json(DesignCreatedResponse {
            message: "Design created successfully",
            id_design: design_id,
        }),
    ))
}

pub async fn get_design(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
) -> Result<Json<DesignView>, ApiError> {
    let company_id = super::subject(SubjectPolicy::SelfOrPublic, &identity, &id)?;
    load_design_view(&state, &company_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Design not found for this company."))
}

pub async fn all_designs(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DesignView>>, ApiError> {
    let designs = state
        .store
        .find_as::<DesignRecord>(collections::DESIGNS, &[])
        .await?;

    let mut views = Vec::with_capacity(designs.len());
    for design in designs {
        views.push(resolve_view(&state, design).await?);
    }
    Ok(Json(views))
}

/// Upload `file` if present and drop the object it replaces.
pub(super) async fn replace_file(
    state: &AppState,
    file: Option<&UploadedFile>,
    folder: &str,
    previous: Option<String>,
) -> Result<Option<String>, ApiError> {
    let Some(file) = file else {
        return Ok(previous);
    };
    let stored = state.storage.upload(file, folder).await?;
    if let Some(previous) = previous {
        state.storage.delete_url_best_effort(&previous).await;
    }
    Ok(Some(stored.url))
}

pub async fn update_design(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
    form: UploadForm,
) -> Result<Json<Value>, ApiError> {
    identity.deny_visitor("modify designs")?;
    let company_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;

    let design = state
        .store
        .find_one_as::<DesignRecord>(collections::DESIGNS, "companyId", &company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Design does not exist for this company."))?;
    let files = state
        .store
        .get_as::<DesignFilesRecord>(collections::DESIGN_FILES, &design.data.file_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Files do not exist for this company."))?;

    let now = Utc::now();
    let banner = replace_file(&state, form.file("banner"), folders::BANNERS, files.data.banner).await?;
    let poster = replace_file(&state, form.file("poster"), folders::POSTERS, files.data.poster).await?;
    state
        .store
        .update(
            collections::DESIGN_FILES,
            &files.id,
            serde_json::json!({ "banner": banner, "poster": poster, "updatedAt": now }),
        )
        .await?;

    let patch = DesignPatch {
        stand_id: form.string("standId").or_else(|| form.string("standID")),
        model_id: form.string("modelId").or_else(|| form.string("modelID")),
        updated_at: Some(now),
    };
    state
        .store
        .update_with(collections::DESIGNS, &design.id, &patch)
        .await?;

    tracing::info!(company_id = %company_id, design_id = %design.id, "Design updated");

    Ok(Json(serde_json::json!({
        "message": "Design updated successfully",
        "updatedDesign": {
            "standId": patch.stand_id.unwrap_or(design.data.stand_id),
            "modelId": patch.model_id.unwrap_or(design.data.model_id),
        },
    })))
}

/// Remove the design and its files, then clear `designComplete` so the
/// company can design its stand again. The caller's session is refreshed
/// when it belongs to the company.
pub async fn delete_design(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    jar: CookieJar,
    id: OptionalId,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    identity.deny_visitor("modify designs")?;
    let company_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;

    let design = state
        .store
        .find_one_as::<DesignRecord>(collections::DESIGNS, "companyId", &company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Design not found"))?;

    if let Some(files) = state
        .store
        .get_as::<DesignFilesRecord>(collections::DESIGN_FILES, &design.data.file_id)
        .await?
    {
        for url in [files.data.banner, files.data.poster].into_iter().flatten() {
            state.storage.delete_url_best_effort(&url).await;
        }
        state.store.delete(collections::DESIGN_FILES, &files.id).await?;
    }
    state.store.delete(collections::DESIGNS, &design.id).await?;

    let jar = set_design_flag(&state, jar, &identity, &company_id, false).await?;

    tracing::info!(company_id = %company_id, design_id = %design.id, "Design deleted");

    Ok((
        jar,
        Json(serde_json::json!({ "message": "Design deleted successfully" })),
    ))
}

pub async fn list_stands(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Stored<CatalogItem>>>, ApiError> {
    let stands = state
        .store
        .find_as::<CatalogItem>(collections::STANDS, &[])
        .await?;
    Ok(Json(stands))
}

pub async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Stored<CatalogItem>>>, ApiError> {
    let models = state
        .store
        .find_as::<CatalogItem>(collections::MODELS, &[])
        .await?;
    Ok(Json(models))
}

async fn add_catalog_item(
    state: &AppState,
    collection: &str,
    request: CreateCatalogItemRequest,
) -> Result<String, ApiError> {
    let name = required(request.name.as_deref(), "name")?.to_string();
    let file_url = required(request.file_url.as_deref(), "fileUrl")?.to_string();

    let item = CatalogItem {
        name,
        file_url,
        config: request.config,
        uploaded_at: Utc::now(),
    };
    let id = state.store.add_as(collection, &item).await?;
    tracing::info!(collection = %collection, id = %id, "Catalog item added");
    Ok(id)
}

pub async fn create_stand(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCatalogItemRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let id = add_catalog_item(&state, collections::STANDS, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Stand created successfully",
            id,
        }),
    ))
}

pub async fn create_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCatalogItemRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let id = add_catalog_item(&state, collections::MODELS, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Model created successfully",
            id,
        }),
    ))
}
