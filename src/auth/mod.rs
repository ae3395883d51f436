//! Authentication and authorization.
//!
//! Session tokens are issued by [`TokenService`] and carried either in the
//! `Authorization` header or the session cookie ([`carrier`]). The guards in
//! [`guard`] verify them and attach an [`Identity`] to the request; handlers
//! then decide whose resource they touch through [`SubjectPolicy`].

pub mod carrier;
pub mod guard;
pub mod password;
pub mod policy;
pub mod token;

pub use carrier::{clearing_cookie, extract_token, session_cookie, Carrier};
pub use guard::{require_role, require_session, RoleGate};
pub use password::{hash_password, verify_password};
pub use policy::SubjectPolicy;
pub use token::{SessionClaims, TokenError, TokenService};

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;

use crate::api::error::ApiError;
use crate::db::{Role, Stored, UserRecord};
use crate::AppState;

/// The authenticated caller of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<SessionClaims> for Identity {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.id,
            name: claims.name,
            email: claims.email,
            role: claims.role,
        }
    }
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Reject visitors from owner-scoped writes, e.g. `deny_visitor("add offers")`.
    pub fn deny_visitor(&self, action: &str) -> Result<(), ApiError> {
        if self.role == Role::Visitor {
            return Err(ApiError::forbidden(format!(
                "Access denied: Visitors cannot {}.",
                action
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("No token provided"))
    }
}

/// Issue a session for `user` and set it as the session cookie.
pub fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: &Stored<UserRecord>,
) -> Result<CookieJar, ApiError> {
    let token = state.tokens.issue(&SessionClaims::from(user))?;
    Ok(jar.add(session_cookie(
        &state.config.auth.cookie_name,
        token,
        state.tokens.ttl(),
    )))
}

/// Replace the caller's session after a profile-completion flag changed on `user`.
///
/// Only the caller's own cookie is ever replaced: an admin acting on behalf of a
/// company keeps its own session.
pub fn refresh_session(
    state: &AppState,
    jar: CookieJar,
    caller: &Identity,
    user: &Stored<UserRecord>,
) -> Result<CookieJar, ApiError> {
    if caller.id != user.id {
        return Ok(jar);
    }
    tracing::debug!(user_id = %user.id, "Refreshing session claims");
    start_session(state, jar, user)
}
