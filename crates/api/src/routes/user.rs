//! Identity route handlers.
//!
//! Successful logins set the `accessToken` and `refreshToken` cookies; the
//! tokens never appear in response bodies.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::extract::ApiJson;
use crate::middleware::{REFRESH_COOKIE, RequireUser, SetCookies, read_cookie};
use crate::models::User;
use crate::routes::{ApiResponse, Message};
use crate::services::AuthService;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login request, used by both the storefront and the admin console.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Password change request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user: User,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create an account and sign it in.
#[instrument(skip_all, fields(email = %req.email))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let auth = AuthService::new(state.store(), state.tokens());
    let (user, pair) = auth.register(&req.name, &req.email, &req.password).await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    let cookies = SetCookies::for_pair(pair, state.tokens(), state.config().auth.cookie_secure);

    Ok((
        StatusCode::CREATED,
        cookies,
        ApiResponse::ok(UserBody { user }),
    ))
}

/// Sign in with email and password.
#[instrument(skip_all, fields(email = %req.email))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let auth = AuthService::new(state.store(), state.tokens());
    let (user, pair) = auth.login(&req.email, &req.password).await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "User logged in");
    let cookies = SetCookies::for_pair(pair, state.tokens(), state.config().auth.cookie_secure);

    Ok((cookies, ApiResponse::ok(UserBody { user })))
}

/// Sign in to the admin console. Only admin accounts pass.
#[instrument(skip_all, fields(email = %req.email))]
pub async fn admin_login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let auth = AuthService::new(state.store(), state.tokens());
    let (user, pair) = auth.admin_login(&req.email, &req.password).await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "Admin logged in");
    let cookies = SetCookies::for_pair(pair, state.tokens(), state.config().auth.cookie_secure);

    Ok((cookies, ApiResponse::ok(UserBody { user })))
}

/// Issue a new access cookie from the refresh cookie.
#[instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse> {
    let refresh_token = read_cookie(&headers, REFRESH_COOKIE);

    let auth = AuthService::new(state.store(), state.tokens());
    let access = auth.refresh(refresh_token.as_deref()).await?;

    let cookies = SetCookies::for_access(access, state.tokens(), state.config().auth.cookie_secure);

    Ok((
        cookies,
        ApiResponse::ok(Message {
            message: "Token refreshed",
        }),
    ))
}

/// Clear both auth cookies.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    clear_sentry_user();

    (
        SetCookies::cleared(state.config().auth.cookie_secure),
        ApiResponse::ok(Message {
            message: "Logged out",
        }),
    )
}

/// The signed-in user's profile.
pub async fn profile(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<impl IntoResponse> {
    let auth = AuthService::new(state.store(), state.tokens());
    let user = auth.get_user(current.id).await?;

    Ok(ApiResponse::ok(UserBody { user }))
}

/// Change the signed-in user's password.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse> {
    let auth = AuthService::new(state.store(), state.tokens());
    auth.change_password(current.id, &req.old_password, &req.new_password)
        .await?;

    Ok(ApiResponse::ok(Message {
        message: "Password updated",
    }))
}
