mod auth;
mod designs;
pub mod error;
mod files;
mod information;
mod offers;
mod upload;
mod users;
mod validation;
mod videos;

pub use upload::UploadForm;

use axum::{
    extract::{DefaultBodyLimit, Path},
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{require_role, require_session, Identity, RoleGate, SubjectPolicy};
use crate::config::CorsConfig;
use crate::db::Role;
use crate::AppState;
use error::ApiError;

/// Trailing `/:id` on routes registered both with and without it.
pub type OptionalId = Option<Path<String>>;

/// Whose resource the request touches, given the endpoint's policy.
pub(crate) fn subject(
    policy: SubjectPolicy,
    identity: &Identity,
    id: &OptionalId,
) -> Result<String, ApiError> {
    policy.resolve(identity, id.as_ref().map(|Path(id)| id.as_str()))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public routes
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/logging/unity", post(auth::unity_login))
        .route("/users/register", post(users::register))
        .route("/design/stand", get(designs::list_stands))
        .route("/design/model", get(designs::list_models));

    // Session from the Authorization header or the cookie
    let session_routes = Router::new()
        // Users
        .route("/users/companies", get(users::list_companies))
        .route("/users/companies/unity", get(users::companies_with_related))
        .route("/users/visitors", get(users::list_visitors))
        .route("/users/admins", get(users::list_admins))
        .route("/users/all", get(users::list_users))
        .route("/users/logo", put(users::update_logo))
        .route("/users/logo/:id", put(users::update_logo))
        .route("/users", get(users::get_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Design
        .route("/design/addDesign", post(designs::add_design))
        .route("/design/addDesign/:id", post(designs::add_design))
        .route("/design/getDesign", get(designs::get_design))
        .route("/design/getDesign/:id", get(designs::get_design))
        .route("/design/updateDesign", put(designs::update_design))
        .route("/design/updateDesign/:id", put(designs::update_design))
        .route("/design/deleteDesign", delete(designs::delete_design))
        .route("/design/deleteDesign/:id", delete(designs::delete_design))
        // Offers
        .route("/offers/add", post(offers::add_offer))
        .route("/offers/add/:id", post(offers::add_offer))
        .route("/offers/company", get(offers::company_offers))
        .route("/offers/company/:id", get(offers::company_offers))
        .route("/offers/update/:id", put(offers::update_offer))
        .route("/offers/delete/:id", delete(offers::delete_offer))
        .route("/offers/all", get(offers::all_offers))
        .route("/offers/search", get(offers::search_offers))
        // Downloadable files
        .route(
            "/file/company",
            get(files::company_files).post(files::add_file),
        )
        .route(
            "/file/company/:id",
            get(files::company_files).post(files::add_file),
        )
        .route("/file/update", put(files::update_files))
        .route("/file/update/:id", put(files::update_files))
        // Videos
        .route("/video/add", post(videos::add_video))
        .route("/video/add/:id", post(videos::add_video))
        .route("/video/company", get(videos::company_videos))
        .route("/video/company/:id", get(videos::company_videos))
        .route("/video/delete", delete(videos::delete_video))
        .route("/video/delete/:id", delete(videos::delete_video))
        // Company information
        .route("/information/addInfo", post(information::add_info))
        .route("/information/addInfo/:id", post(information::add_info))
        .route("/information/getInfo", get(information::get_info))
        .route("/information/getInfo/:id", get(information::get_info))
        .route("/information/updateInfo", put(information::update_info))
        .route("/information/updateInfo/:id", put(information::update_info))
        .route("/information/deleteDocuments", put(information::delete_documents))
        .route(
            "/information/deleteDocuments/:id",
            put(information::delete_documents),
        )
        .route("/information/updateDocuments", put(information::update_documents))
        .route(
            "/information/updateDocuments/:id",
            put(information::update_documents),
        )
        .route(
            "/information/events",
            get(information::get_events).post(information::add_event),
        )
        .route(
            "/information/events/:id",
            get(information::get_events).post(information::add_event),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_session));

    // Cookie session with the admin role
    let admin_routes = Router::new()
        .route("/design/allDesigns", get(designs::all_designs))
        .route("/design/stand", post(designs::create_stand))
        .route("/design/model", post(designs::create_model))
        .layer(middleware::from_fn_with_state(
            RoleGate::new(state.clone(), Role::Admin),
            require_role,
        ));

    let upload_limit = state.config.storage.max_upload_mb * 1024 * 1024;
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route("/health", get(health_check))
        .merge(public_routes)
        .merge(session_routes)
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(config.allow_credentials)
}

async fn health_check() -> &'static str {
    "OK"
}
