//! Authentication extractors.
//!
//! The caller is identified by the access token in the `accessToken` cookie.
//! Rejections are ordinary [`AppError`]s so they carry the JSON error body.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::{AppError, set_sentry_user};
use crate::middleware::cookies::{ACCESS_COOKIE, read_cookie};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = read_cookie(&parts.headers, ACCESS_COOKIE)
            .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))?;

        let user = state.tokens().authenticate(&token)?;

        set_sentry_user(&user.id, Some(&user.email));
        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        Ok(Self(user))
    }
}

/// Extractor that requires a valid access token with the admin role.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Admin route denied");
            return Err(AppError::Forbidden("Not authorized as admin".to_string()));
        }

        Ok(Self(user))
    }
}
