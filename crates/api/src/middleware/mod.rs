//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. CORS (credentialed, origin allow-list)
//! 3. `TraceLayer` (request span with `request_id` and `user_id` fields)
//! 4. Request ID (accept or create `x-request-id`)
//!
//! Authentication is per-route through the [`RequireUser`] and
//! [`RequireAdmin`] extractors.

pub mod auth;
pub mod cookies;
pub mod request_id;

pub use auth::{RequireAdmin, RequireUser};
pub use cookies::{ACCESS_COOKIE, REFRESH_COOKIE, SetCookies, read_cookie};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
