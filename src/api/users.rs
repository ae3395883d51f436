use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::designs::load_design_view;
use super::error::ApiError;
use super::upload::UploadForm;
use super::validation::{non_empty, validate_email, validate_name};
use super::OptionalId;
use crate::auth::{clearing_cookie, hash_password, refresh_session, Identity, SubjectPolicy};
use crate::db::{
    collections, CompanyInfoRecord, DesignView, Filter, LogoRecord, LogoRef, OfferRecord, Role,
    Stored, UpdateUserRequest, UrlListRecord, UserPatch, UserRecord, UserView,
};
use crate::storage::folders;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub message: &'static str,
    pub id: String,
}

/// One company with everything the 3D fair client renders for it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyBundle {
    pub user: UserView,
    pub logo: Vec<Stored<LogoRecord>>,
    pub related_data: RelatedData,
}

#[derive(Debug, Serialize)]
pub struct RelatedData {
    pub offers: Vec<Stored<OfferRecord>>,
    pub videos: Vec<Stored<UrlListRecord>>,
    pub companies: Vec<Stored<CompanyInfoRecord>>,
    pub design: Option<DesignView>,
}

pub(super) fn hash(password: &str) -> Result<String, ApiError> {
    hash_password(password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("An internal error occurred")
    })
}

/// Logo document owned by `company_id`, if any.
pub(super) async fn find_logo(
    state: &AppState,
    company_id: &str,
) -> Result<Option<Stored<LogoRecord>>, ApiError> {
    Ok(state
        .store
        .find_one_as::<LogoRecord>(collections::LOGOS, "companyId", company_id)
        .await?)
}

/// Logo snapshot embedded into designs and offers.
pub(super) async fn logo_ref(state: &AppState, company_id: &str) -> Result<Option<LogoRef>, ApiError> {
    Ok(find_logo(state, company_id).await?.map(|logo| LogoRef {
        id: logo.id,
        url: logo.data.url,
    }))
}

/// Apply `patch` to a user, then refresh the caller's session from the stored record.
pub(super) async fn patch_profile(
    state: &AppState,
    jar: CookieJar,
    caller: &Identity,
    user_id: &str,
    patch: &UserPatch,
) -> Result<CookieJar, ApiError> {
    state
        .store
        .update_with(collections::USERS, user_id, patch)
        .await?;

    // Re-read so the new session carries the stored flags
    match state.store.get_as::<UserRecord>(collections::USERS, user_id).await? {
        Some(user) => refresh_session(state, jar, caller, &user),
        None => Ok(jar),
    }
}

async fn to_view(state: &AppState, user: Stored<UserRecord>) -> Result<UserView, ApiError> {
    let logo_url = match user.data.logo {
        Some(_) => find_logo(state, &user.id).await?.map(|logo| logo.data.url),
        None => None,
    };
    Ok(UserView::new(user, logo_url))
}

async fn list_views(state: &AppState, role: Option<Role>) -> Result<Vec<UserView>, ApiError> {
    let filters: Vec<Filter> = role
        .map(|role| Filter::eq("role", role.as_str()))
        .into_iter()
        .collect();
    let users = state
        .store
        .find_as::<UserRecord>(collections::USERS, &filters)
        .await?;

    let mut views = Vec::with_capacity(users.len());
    for user in users {
        views.push(to_view(state, user).await?);
    }
    Ok(views)
}

async fn ensure_unique(
    state: &AppState,
    name: Option<&str>,
    email: Option<&str>,
    except_id: Option<&str>,
) -> Result<(), ApiError> {
    let by_email = match email {
        Some(email) => state
            .store
            .find_as::<UserRecord>(collections::USERS, &[Filter::eq("email", email)])
            .await?,
        None => Vec::new(),
    };
    if by_email.iter().any(|u| Some(u.id.as_str()) != except_id) {
        return Err(ApiError::validation("Email already exists.").with_code("invalid_email"));
    }

    let by_name = match name {
        Some(name) => state
            .store
            .find_as::<UserRecord>(collections::USERS, &[Filter::eq("name", name)])
            .await?,
        None => Vec::new(),
    };
    if by_name.iter().any(|u| Some(u.id.as_str()) != except_id) {
        return Err(ApiError::validation("Name already exists.").with_code("invalid_name"));
    }

    Ok(())
}

/// Create an account. Does not log the new user in.
pub async fn register(
    State(state): State<Arc<AppState>>,
    form: UploadForm,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let (Some(name), Some(email), Some(password), Some(role)) = (
        form.string("name"),
        form.string("email"),
        form.text("password")
            .filter(|p| !p.trim().is_empty())
            .map(str::to_string),
        form.string("role").or_else(|| form.string("rol")),
    ) else {
        return Err(ApiError::validation("Invalid request."));
    };

    let role = Role::registrable(&role)
        .ok_or_else(|| ApiError::validation("Invalid role").with_code("invalid_role"))?;
    validate_email(&email).map_err(|e| ApiError::validation(e).with_code("invalid_email"))?;
    validate_name(&name).map_err(|e| ApiError::validation(e).with_code("invalid_name"))?;

    // Check-then-insert is not atomic; concurrent registrations may both pass
    ensure_unique(&state, Some(&name), Some(&email), None).await?;

    let password_hash = hash(&password)?;
    let now = Utc::now();

    let mut logo_id = None;
    if matches!(role, Role::Co | Role::Visitor) {
        if let Some(file) = form.file("logo") {
            let stored = state.storage.upload(file, folders::LOGOS).await?;
            let logo = LogoRecord {
                company_id: None,
                url: stored.url,
                uploaded_at: now,
            };
            logo_id = Some(state.store.add_as(collections::LOGOS, &logo).await?);
        }
    }

    let mut user = UserRecord {
        name,
        email,
        password_hash,
        role,
        created_at: now,
        design_complete: false,
        information_complete: false,
        cif: None,
        logo: logo_id.clone(),
        dni: None,
        subname: None,
        studies: None,
        image: None,
        cv: None,
        phone: None,
    };

    match role {
        Role::Co => {
            user.cif = form.string("cif");
        }
        Role::Visitor => {
            if let Some(file) = form.file("profileImagen") {
                user.image = Some(state.storage.upload(file, folders::PROFILE_IMAGES).await?.url);
            }
            if let Some(file) = form.file("cv") {
                user.cv = Some(state.storage.upload(file, folders::CV_FILES).await?.url);
            }
            user.dni = form.string("dni");
            user.subname = form.string("subname");
            user.studies = form.string("studies");
            user.phone = form.string("phone");
        }
        Role::Admin | Role::User => {}
    }

    let id = state.store.add_as(collections::USERS, &user).await?;

    if let Some(logo_id) = logo_id {
        state
            .store
            .update(collections::LOGOS, &logo_id, serde_json::json!({ "companyId": id }))
            .await?;
    }

    tracing::info!(user_id = %id, role = %role, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "User created successfully",
            id,
        }),
    ))
}

pub async fn list_companies(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let companies = list_views(&state, Some(Role::Co)).await?;
    Ok(Json(serde_json::json!({ "companies": companies })))
}

pub async fn list_visitors(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let visitors = list_views(&state, Some(Role::Visitor)).await?;
    Ok(Json(serde_json::json!({ "visitors": visitors })))
}

pub async fn list_admins(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let admins = list_views(&state, Some(Role::Admin)).await?;
    Ok(Json(serde_json::json!({ "admins": admins })))
}

pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let users = list_views(&state, None).await?;
    Ok(Json(serde_json::json!({ "users": users })))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
) -> Result<Json<Value>, ApiError> {
    let user_id = super::subject(SubjectPolicy::SelfOrPublic, &identity, &id)?;
    let user = state
        .store
        .get_as::<UserRecord>(collections::USERS, &user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let view = to_view(&state, user).await?;
    Ok(Json(serde_json::json!({ "user": view })))
}

fn ensure_self_or_admin(identity: &Identity, id: &str) -> Result<(), ApiError> {
    if identity.id != id && !identity.is_admin() {
        tracing::warn!(user_id = %identity.id, target_id = %id, "Denied access to another account");
        return Err(ApiError::forbidden("Access denied"));
    }
    Ok(())
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    jar: CookieJar,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<(CookieJar, Json<CreatedResponse>), ApiError> {
    ensure_self_or_admin(&identity, &id)?;

    let existing = state
        .store
        .get_as::<UserRecord>(collections::USERS, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let mut patch = UserPatch {
        name: non_empty(request.name),
        email: non_empty(request.email),
        cif: non_empty(request.cif),
        dni: non_empty(request.dni),
        subname: non_empty(request.subname),
        studies: non_empty(request.studies),
        phone: non_empty(request.phone),
        ..Default::default()
    };

    if let Some(role) = non_empty(request.role) {
        if !identity.is_admin() {
            return Err(ApiError::forbidden("Only administrators can change roles"));
        }
        let role = Role::registrable(&role)
            .ok_or_else(|| ApiError::validation("Invalid role").with_code("invalid_role"))?;

        match role {
            Role::Co if patch.cif.is_none() && existing.data.cif.is_none() => {
                return Err(
                    ApiError::validation("CIF is required for Company.").with_code("invalid_cif")
                );
            }
            Role::Visitor
                if patch.dni.as_ref().or(existing.data.dni.as_ref()).is_none()
                    || patch.studies.as_ref().or(existing.data.studies.as_ref()).is_none() =>
            {
                return Err(ApiError::validation("DNI and studies are required for Visitor.")
                    .with_code("invalid_dni"));
            }
            _ => {}
        }
        patch.role = Some(role);
    }

    if let Some(email) = &patch.email {
        validate_email(email).map_err(|e| ApiError::validation(e).with_code("invalid_email"))?;
    }
    if let Some(name) = &patch.name {
        validate_name(name).map_err(|e| ApiError::validation(e).with_code("invalid_name"))?;
    }
    ensure_unique(&state, patch.name.as_deref(), patch.email.as_deref(), Some(&id)).await?;

    if let Some(password) = non_empty(request.password) {
        patch.password_hash = Some(hash(&password)?);
    }

    let jar = patch_profile(&state, jar, &identity, &id, &patch).await?;

    tracing::info!(user_id = %id, updated_by = %identity.id, "User updated");

    Ok((
        jar,
        Json(CreatedResponse {
            message: "User updated successfully",
            id,
        }),
    ))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    ensure_self_or_admin(&identity, &id)?;

    if !state.store.delete(collections::USERS, &id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user_id = %id, deleted_by = %identity.id, "User deleted");

    let jar = if identity.id == id {
        jar.add(clearing_cookie(&state.config.auth.cookie_name))
    } else {
        jar
    };

    Ok((
        jar,
        Json(serde_json::json!({ "message": "User deleted successfully" })),
    ))
}

/// Every company with its logo, offers, videos, information and design.
pub async fn companies_with_related(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<CompanyBundle>>, ApiError> {
    if !identity.is_admin() {
        return Err(ApiError::forbidden(
            "Access denied: Only administrators can access this resource.",
        ));
    }

    let companies = state
        .store
        .find_as::<UserRecord>(collections::USERS, &[Filter::eq("role", Role::Co.as_str())])
        .await?;

    let mut bundles = Vec::with_capacity(companies.len());
    for company in companies {
        let by_company = [Filter::eq("companyId", company.id.as_str())];
        let (logo, offers, videos, infos) = tokio::try_join!(
            state.store.find_as::<LogoRecord>(collections::LOGOS, &by_company),
            state.store.find_as::<OfferRecord>(collections::OFFERS, &by_company),
            state.store.find_as::<UrlListRecord>(collections::VIDEOS, &by_company),
            state
                .store
                .find_as::<CompanyInfoRecord>(collections::COMPANY_INFO, &by_company),
        )?;
        let design = load_design_view(&state, &company.id).await?;
        let logo_url = logo.first().map(|l| l.data.url.clone());

        bundles.push(CompanyBundle {
            user: UserView::new(company, logo_url),
            logo,
            related_data: RelatedData {
                offers,
                videos,
                companies: infos,
                design,
            },
        });
    }

    Ok(Json(bundles))
}

/// Replace the logo of a company, or attach one if it has none.
pub async fn update_logo(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    id: OptionalId,
    form: UploadForm,
) -> Result<Json<Value>, ApiError> {
    let user_id = super::subject(SubjectPolicy::AdminOverride, &identity, &id)?;
    let file = form
        .file("logo")
        .ok_or_else(|| ApiError::validation("No logo file provided."))?;

    if state
        .store
        .get(collections::USERS, &user_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("User not found."));
    }

    let stored = state.storage.upload(file, folders::LOGOS).await?;
    let now = Utc::now();

    match find_logo(&state, &user_id).await? {
        Some(previous) => {
            state.storage.delete_url_best_effort(&previous.data.url).await;
            state
                .store
                .update(
                    collections::LOGOS,
                    &previous.id,
                    serde_json::json!({ "url": stored.url, "uploadedAt": now }),
                )
                .await?;
        }
        None => {
            let logo = LogoRecord {
                company_id: Some(user_id.clone()),
                url: stored.url.clone(),
                uploaded_at: now,
            };
            let logo_id = state.store.add_as(collections::LOGOS, &logo).await?;
            let patch = UserPatch {
                logo: Some(logo_id),
                ..Default::default()
            };
            state
                .store
                .update_with(collections::USERS, &user_id, &patch)
                .await?;
        }
    }

    tracing::info!(user_id = %user_id, "Logo updated");

    Ok(Json(serde_json::json!({
        "message": "Logo updated successfully",
        "newLogoUrl": stored.url,
    })))
}
