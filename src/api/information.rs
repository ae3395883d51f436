//! Company information page, its documents and the company calendar.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::error::ApiError;
use super::upload::UploadForm;
use super::users::{patch_profile, CreatedResponse};
use super::validation::{required, validate_link};
use super::OptionalId;
use crate::auth::{Identity, SubjectPolicy};
use crate::db::{
    collections, ButtonLink, ButtonLinkInput, CalendarEvent, CalendarEventRequest,
    CalendarRecord, CompanyDocument, CompanyInfoRecord, KeepDocumentsRequest, Stored,
    UpdateInfoRequest, UserPatch,
};
use crate::storage::{folders, FileStorage};
use crate::AppState;

fn validate_links(links: Vec<ButtonLinkInput>) -> Result<Vec<ButtonLink>, ApiError> {
    links
        .into_iter()
        .map(|link| {
            link.validate().ok_or_else(|| {
                ApiError::validation("Each link needs additionalButtonTitle and additionalButtonLink")
            })
        })
        .collect()
}

async fn upload_documents(state: &AppState, form: &UploadForm) -> Result<Vec<CompanyDocument>, ApiError> {
    let mut documents = Vec::new();
    for file in form.files("documents") {
        let stored = state.storage.upload(file, folders::COMPANY_DOCUMENTS).await?;
        documents.push(CompanyDocument {
            file_name: file.file_name.clone(),
            url: stored.url,
        });
    }
    Ok(documents)
}

async fn find_info(
    state: &AppState,
    company_id: &str,
) -> Result<Option<Stored<CompanyInfoRecord>>, ApiError> {
    Ok(state
        .store
        .find_one_as::<CompanyInfoRecord>(collections::COMPANY_INFO, "companyId", company_id)
        .await?)
}

/// Keep the documents named in `keep`, dropping the stored objects of the rest.
async fn retain_documents(
    storage: &dyn FileStorage,
    existing: Vec<CompanyDocument>,
    keep: &[CompanyDocument],
) -> Vec<CompanyDocument> {
    let (kept, removed): (Vec<_>, Vec<_>) = existing
        .into_iter()
        .partition(|doc| keep.iter().any(|k| k.file_name == doc.file_name));

    for doc in removed {
        storage.delete_url_best_effort(&doc.url).await;
    }
    kept
}

pub async fn add_info(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    jar: CookieJar,
    id: OptionalId,
    form: UploadForm,
) -> Result<(StatusCode, CookieJar, Json<CreatedResponse>), ApiError> {
    identity.deny_visitor("add company information")?;
    let company_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;

    let description = required(form.text("description"), "description")?.to_string();
    let links = validate_links(form.json::<Vec<ButtonLinkInput>>("links")?.unwrap_or_default())?;

    if state
        .store
        .get(collections::USERS, &company_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("Company not found"));
    }
    if find_info(&state, &company_id).await?.is_some() {
        return Err(ApiError::conflict("Information already exists for this company"));
    }

    let record = CompanyInfoRecord {
        company_id: company_id.clone(),
        description,
        additional_information: form.string("additionalInformation").unwrap_or_default(),
        links,
        documents: upload_documents(&state, &form).await?,
        sector: form.string("sector"),
        created_at: Utc::now(),
        updated_at: None,
    };
    let info_id = state.store.add_as(collections::COMPANY_INFO, &record).await?;

    let patch = UserPatch {
        information_complete: Some(true),
        ..Default::default()
    };
    let jar = patch_profile(&state, jar, &identity, &company_id, &patch).await?;

    tracing::info!(
        company_id = %company_id,
        info_id = %info_id,
        documents = record.documents.len(),
        "Company information added"
    );

    Ok((
        StatusCode::CREATED,
        jar,
        Json(CreatedResponse {
            message: "Information company added successfully",
            id: info_id,
        }),
    ))
}

pub async fn get_info(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
) -> Result<Json<Stored<CompanyInfoRecord>>, ApiError> {
    let company_id = super::subject(SubjectPolicy::SelfOrPublic, &identity, &id)?;
    find_info(&state, &company_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Company not found"))
}

/// Top-level fields to merge into the information document.
fn info_patch(request: UpdateInfoRequest) -> Result<Map<String, Value>, ApiError> {
    let mut fields = Map::new();
    if let Some(description) = request.description {
        fields.insert("description".into(), Value::String(description));
    }
    if let Some(additional) = request.additional_information {
        fields.insert("additionalInformation".into(), Value::String(additional));
    }
    if let Some(links) = request.links {
        let links = validate_links(links)?;
        fields.insert(
            "links".into(),
            serde_json::to_value(links).map_err(anyhow::Error::from)?,
        );
    }
    if let Some(sector) = request.sector {
        fields.insert("sector".into(), Value::String(sector));
    }
    fields.insert("updatedAt".into(), serde_json::json!(Utc::now()));
    Ok(fields)
}

pub async fn update_info(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
    form: UploadForm,
) -> Result<Json<Value>, ApiError> {
    identity.deny_visitor("update company information")?;
    let company_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;

    let request = UpdateInfoRequest {
        description: form.string("description"),
        additional_information: form.string("additionalInformation"),
        links: form.json("links")?,
        sector: form.string("sector"),
    };
    let updated = Value::Object(info_patch(request)?);

    let info = find_info(&state, &company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company information not found"))?;
    state
        .store
        .update(collections::COMPANY_INFO, &info.id, updated.clone())
        .await?;

    tracing::info!(company_id = %company_id, info_id = %info.id, "Company information updated");

    Ok(Json(serde_json::json!({
        "message": "Information updated successfully",
        "updatedData": updated,
    })))
}

pub async fn delete_documents(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
    Json(request): Json<KeepDocumentsRequest>,
) -> Result<Json<Value>, ApiError> {
    identity.deny_visitor("delete company documents")?;
    let company_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;

    let keep = request
        .documents_to_keep
        .ok_or_else(|| ApiError::validation("documentsToKeep is required"))?;

    let info = find_info(&state, &company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company information not found"))?;

    let documents = retain_documents(state.storage.as_ref(), info.data.documents, &keep).await;
    state
        .store
        .update(
            collections::COMPANY_INFO,
            &info.id,
            serde_json::json!({ "documents": documents, "updatedAt": Utc::now() }),
        )
        .await?;

    tracing::info!(company_id = %company_id, kept = documents.len(), "Company documents pruned");

    Ok(Json(serde_json::json!({
        "message": "Documents updated successfully",
        "updatedDocuments": documents,
    })))
}

/// Keep the listed documents and append the uploaded ones.
pub async fn update_documents(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
    form: UploadForm,
) -> Result<Json<Value>, ApiError> {
    identity.deny_visitor("update company documents")?;
    let company_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;

    let keep = form
        .json::<Vec<CompanyDocument>>("newDocuments")?
        .ok_or_else(|| ApiError::validation("newDocuments is required"))?;

    let info = find_info(&state, &company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company information not found"))?;

    let uploaded = upload_documents(&state, &form).await?;
    let mut documents = retain_documents(state.storage.as_ref(), info.data.documents, &keep).await;
    documents.extend(uploaded);

    state
        .store
        .update(
            collections::COMPANY_INFO,
            &info.id,
            serde_json::json!({ "documents": documents, "updatedAt": Utc::now() }),
        )
        .await?;

    tracing::info!(company_id = %company_id, total = documents.len(), "Company documents updated");

    Ok(Json(serde_json::json!({
        "message": "Documents updated successfully",
        "updatedDocuments": documents,
    })))
}

pub async fn add_event(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
    Json(request): Json<CalendarEventRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    identity.deny_visitor("add calendar events")?;
    let company_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;

    let event = CalendarEvent {
        name_date: required(request.name_date.as_deref(), "nameDate")?.to_string(),
        link_event: required(request.link_event.as_deref(), "linkEvent")?.to_string(),
        description: required(request.description.as_deref(), "description")?.to_string(),
    };
    validate_link(&event.link_event).map_err(ApiError::validation)?;

    // The calendar document shares the company's id
    let mut calendar = state
        .store
        .get_as::<CalendarRecord>(collections::CALENDAR_EVENTS, &company_id)
        .await?
        .map(|stored| stored.data)
        .unwrap_or_else(|| CalendarRecord {
            company_id: company_id.clone(),
            links_event: Vec::new(),
        });
    calendar.links_event.push(event);

    let value = serde_json::to_value(&calendar).map_err(anyhow::Error::from)?;
    state
        .store
        .set(collections::CALENDAR_EVENTS, &company_id, value)
        .await?;

    tracing::info!(company_id = %company_id, events = calendar.links_event.len(), "Calendar event added");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "Event added successfully" })),
    ))
}

pub async fn get_events(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
) -> Result<Json<Value>, ApiError> {
    let company_id = super::subject(SubjectPolicy::SelfOrPublic, &identity, &id)?;
    let events = state
        .store
        .get_as::<CalendarRecord>(collections::CALENDAR_EVENTS, &company_id)
        .await?
        .map(|stored| stored.data.links_event)
        .unwrap_or_default();
    Ok(Json(serde_json::json!({ "events": events })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, UploadedFile};

    fn link(title: &str, url: &str) -> ButtonLinkInput {
        ButtonLinkInput {
            additional_button_title: Some(title.into()),
            additional_button_link: Some(url.into()),
        }
    }

    #[test]
    fn test_validate_links_rejects_incomplete_entries() {
        let ok = validate_links(vec![link("Web", "https://acme.example")]).unwrap();
        assert_eq!(ok[0].additional_button_title, "Web");

        let err = validate_links(vec![link("Web", "https://acme.example"), link("", "x")]).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_info_patch_only_sets_given_fields() {
        let fields = info_patch(UpdateInfoRequest {
            description: Some("New".into()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(fields["description"], "New");
        assert!(fields.contains_key("updatedAt"));
        assert!(!fields.contains_key("links"));
        assert!(!fields.contains_key("sector"));
    }

    #[tokio::test]
    async fn test_retain_documents_drops_unlisted_objects() {
        let storage = MemoryStorage::new();
        let file = UploadedFile {
            file_name: "old.pdf".into(),
            content_type: "application/pdf".into(),
            data: bytes::Bytes::from_static(b"%PDF"),
        };
        let stored = storage.upload(&file, folders::COMPANY_DOCUMENTS).await.unwrap();

        let existing = vec![
            CompanyDocument {
                file_name: "old.pdf".into(),
                url: stored.url.clone(),
            },
            CompanyDocument {
                file_name: "brochure.pdf".into(),
                url: "https://drive.google.com/uc?id=keep".into(),
            },
        ];
        let keep = vec![CompanyDocument {
            file_name: "brochure.pdf".into(),
            url: String::new(),
        }];

        let kept = retain_documents(&storage, existing, &keep).await;
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].file_name, "brochure.pdf");
        assert!(!storage.contains(&stored.file_id));
    }
}
