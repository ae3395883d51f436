use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::sync::Arc;

use super::error::ApiError;
use super::validation::non_empty;
use crate::auth::{clearing_cookie, start_session, verify_password, SessionClaims};
use crate::db::{collections, LoginRequest, Role, Stored, UserRecord, UserSummary};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct TokenUser {
    pub name: String,
    pub role: Role,
}

/// Login response for clients that cannot hold cookies.
#[derive(Debug, Serialize)]
pub struct TokenLoginResponse {
    pub message: &'static str,
    pub token: String,
    pub user: TokenUser,
}

/// Look the account up by name or email and check the password.
async fn check_credentials(
    state: &AppState,
    request: LoginRequest,
) -> Result<Stored<UserRecord>, ApiError> {
    let (Some(name_or_email), Some(password)) =
        (non_empty(request.name_or_email), non_empty(request.password))
    else {
        return Err(ApiError::validation("Please enter both name and password"));
    };

    let (by_name, by_email) = tokio::try_join!(
        state
            .store
            .find_one_as::<UserRecord>(collections::USERS, "name", &name_or_email),
        state
            .store
            .find_one_as::<UserRecord>(collections::USERS, "email", &name_or_email),
    )?;

    // A name match wins over an email match
    let Some(user) = by_name.or(by_email) else {
        tracing::warn!("Login attempt for unknown account");
        return Err(ApiError::unauthorized("User not found").with_code("user_not_found"));
    };

    if !verify_password(&password, &user.data.password_hash) {
        tracing::warn!(user_id = %user.id, "Login failed: invalid password");
        return Err(ApiError::unauthorized("Password invalid.").with_code("invalid_password"));
    }

    Ok(user)
}

/// Login endpoint; the session travels in the cookie only.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let user = check_credentials(&state, request).await?;
    let jar = start_session(&state, jar, &user)?;

    tracing::info!(user_id = %user.id, role = %user.data.role, "User logged in");

    Ok((
        jar,
        Json(LoginResponse {
            message: "Login successful",
            user: UserSummary {
                id: user.id,
                name: user.data.name,
                role: user.data.role,
            },
        }),
    ))
}

/// Login endpoint for the 3D client: the token is returned in the body.
pub async fn unity_login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenLoginResponse>, ApiError> {
    let user = check_credentials(&state, request).await?;
    let token = state.tokens.issue(&SessionClaims::from(&user))?;

    tracing::info!(user_id = %user.id, "User logged in with body token");

    Ok(Json(TokenLoginResponse {
        message: "Login successful",
        token,
        user: TokenUser {
            name: user.data.name,
            role: user.data.role,
        },
    }))
}

/// Clear the session cookie. Tokens are stateless, so copies held elsewhere stay valid.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.add(clearing_cookie(&state.config.auth.cookie_name));
    (
        jar,
        Json(MessageResponse {
            message: "Logged out successfully",
        }),
    )
}
