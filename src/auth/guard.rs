//! Middleware guarding authenticated routes.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use super::{extract_token, Carrier, Identity};
use crate::api::error::ApiError;
use crate::db::Role;
use crate::AppState;

fn authenticate(state: &AppState, headers: &HeaderMap, carrier: Carrier) -> Result<Identity, ApiError> {
    let token = extract_token(headers, &state.config.auth.cookie_name, carrier)
        .ok_or_else(|| ApiError::unauthorized("No token provided"))?;
    let claims = state.tokens.verify(&token)?;
    Ok(Identity::from(claims))
}

/// Accepts a token from the `Authorization` header or the session cookie.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = authenticate(&state, request.headers(), Carrier::HeaderOrCookie)?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// State for [`require_role`]: the role is fixed when the route is registered.
#[derive(Clone)]
pub struct RoleGate {
    pub state: Arc<AppState>,
    pub role: Role,
}

impl RoleGate {
    pub fn new(state: Arc<AppState>, role: Role) -> Self {
        Self { state, role }
    }
}

/// Cookie-only guard that additionally requires an exact role.
pub async fn require_role(
    State(gate): State<RoleGate>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = authenticate(&gate.state, request.headers(), Carrier::CookieOnly)?;
    if identity.role != gate.role {
        tracing::warn!(user_id = %identity.id, role = %identity.role, "Role check failed");
        return Err(ApiError::forbidden("Access denied: insufficient permissions"));
    }
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionClaims;
    use crate::config::{Config, StorageProvider};
    use crate::db::SqliteStore;
    use crate::storage::MemoryStorage;
    use axum::{
        http::{header, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn state() -> Arc<AppState> {
        let mut config = Config::default();
        config.auth.secret_key = Some("guard-test-secret".to_string());
        config.storage.provider = StorageProvider::Memory;
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        Arc::new(AppState::new(config, store, Arc::new(MemoryStorage::new())))
    }

    fn token(state: &AppState, id: &str, role: Role) -> String {
        state
            .tokens
            .issue(&SessionClaims {
                id: id.to_string(),
                name: id.to_string(),
                email: format!("{}@example.com", id),
                role,
                design_complete: false,
                information_complete: false,
            })
            .unwrap()
    }

    async fn whoami(identity: Identity) -> String {
        identity.id
    }

    fn session_router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/", get(whoami))
            .layer(middleware::from_fn_with_state(state, require_session))
    }

    fn role_router(state: Arc<AppState>, role: Role) -> Router {
        Router::new()
            .route("/", get(whoami))
            .layer(middleware::from_fn_with_state(
                RoleGate::new(state, role),
                require_role,
            ))
    }

    async fn call(router: Router, auth: Option<String>, cookie: Option<String>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", auth));
        }
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, format!("authToken={}", cookie));
        }
        let response = router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_missing_token() {
        let state = state().await;
        let (status, body) = call(session_router(state), None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("No token provided"));
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let state = state().await;
        let (status, body) = call(session_router(state), Some("garbage".into()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid or expired token"));
    }

    #[tokio::test]
    async fn test_header_token_wins_over_cookie() {
        let state = state().await;
        let header_token = token(&state, "from-header", Role::Co);
        let cookie_token = token(&state, "from-cookie", Role::Co);

        let (status, body) = call(
            session_router(state.clone()),
            Some(header_token),
            Some(cookie_token.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "from-header");

        let (status, body) = call(session_router(state), None, Some(cookie_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "from-cookie");
    }

    #[tokio::test]
    async fn test_role_gate_requires_exact_role() {
        let state = state().await;
        let company = token(&state, "co1", Role::Co);

        let (status, body) = call(role_router(state.clone(), Role::Admin), None, Some(company.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("Access denied: insufficient permissions"));

        let (status, body) = call(role_router(state, Role::Co), None, Some(company)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "co1");
    }

    #[tokio::test]
    async fn test_role_gate_ignores_header() {
        let state = state().await;
        let admin = token(&state, "admin1", Role::Admin);
        let (status, _) = call(role_router(state, Role::Admin), Some(admin), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
