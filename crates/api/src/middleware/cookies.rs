//! Auth cookie helpers.
//!
//! Tokens travel in two `HttpOnly` cookies on path `/`. `Secure` follows
//! configuration; `SameSite=None` requires `Secure`, so insecure deployments
//! (local http) fall back to `Lax`.

use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponseParts, ResponseParts};
use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::{Cookie, SameSite};

use crate::error::AppError;
use crate::services::auth::{TokenPair, TokenService};

/// Cookie carrying the access token.
pub const ACCESS_COOKIE: &str = "accessToken";

/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Read a cookie value from the request headers.
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty())
}

fn base_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .path("/")
        .secure(secure)
        .same_site(if secure { SameSite::None } else { SameSite::Lax })
        .build()
}

/// A `Set-Cookie` header for a token.
#[must_use]
pub fn token_cookie(
    name: &'static str,
    token: String,
    max_age: chrono::Duration,
    secure: bool,
) -> Cookie<'static> {
    let mut cookie = base_cookie(name, token, secure);
    cookie.set_max_age(Duration::seconds(max_age.num_seconds()));
    cookie
}

/// A `Set-Cookie` header that deletes the cookie.
#[must_use]
pub fn removal_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(name, String::new(), secure);
    cookie.make_removal();
    cookie
}

/// Cookies to set on the response.
#[derive(Debug, Default)]
pub struct SetCookies(Vec<Cookie<'static>>);

impl SetCookies {
    /// Access and refresh cookies for a freshly issued pair.
    #[must_use]
    pub fn for_pair(pair: TokenPair, tokens: &TokenService, secure: bool) -> Self {
        Self(vec![
            token_cookie(ACCESS_COOKIE, pair.access, tokens.access_ttl(), secure),
            token_cookie(REFRESH_COOKIE, pair.refresh, tokens.refresh_ttl(), secure),
        ])
    }

    /// Just a new access cookie.
    #[must_use]
    pub fn for_access(access: String, tokens: &TokenService, secure: bool) -> Self {
        Self(vec![token_cookie(
            ACCESS_COOKIE,
            access,
            tokens.access_ttl(),
            secure,
        )])
    }

    /// Expire both auth cookies.
    #[must_use]
    pub fn cleared(secure: bool) -> Self {
        Self(vec![
            removal_cookie(ACCESS_COOKIE, secure),
            removal_cookie(REFRESH_COOKIE, secure),
        ])
    }
}

impl IntoResponseParts for SetCookies {
    type Error = AppError;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        for cookie in self.0 {
            let value = HeaderValue::from_str(&cookie.to_string())
                .map_err(|e| AppError::Internal(format!("cookie header: {e}")))?;
            res.headers_mut().append(header::SET_COOKIE, value);
        }
        Ok(res)
    }
}
