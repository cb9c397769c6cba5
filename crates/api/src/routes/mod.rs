//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Liveness
//! GET    /health/ready              - Readiness (store ping)
//!
//! # Identity
//! POST   /api/user/register         - Create account, set auth cookies (201)
//! POST   /api/user/login            - Password login, set auth cookies
//! POST   /api/user/admin            - Admin console login
//! POST   /api/user/refresh          - New access cookie from refresh cookie
//! POST   /api/user/logout           - Clear auth cookies
//! GET    /api/user/get-profile      - Current user (user)
//! POST   /api/user/change-password  - Change password (user)
//!
//! # Catalog
//! GET    /api/product               - Search with query filters
//! GET    /api/product/list          - All products
//! GET    /api/product/{id}          - One product
//! POST   /api/product/add           - Multipart create with image1..image4 (admin)
//! POST   /api/product/remove        - Delete by id (admin)
//!
//! # Cart (user)
//! GET    /api/cart                  - Current cart
//! POST   /api/cart                  - Add product
//! PATCH  /api/cart                  - Set quantity, 0 removes
//! DELETE /api/cart                  - Remove product
//!
//! # Orders
//! POST   /api/order/place           - Cash on delivery (user)
//! POST   /api/order/razorpay        - Online payment checkout (user)
//! POST   /api/order/verifyRazorpay  - Confirm online payment (user)
//! POST   /api/order/userorders      - Own orders (user)
//! POST   /api/order/list            - All orders (admin)
//! POST   /api/order/status          - Set fulfillment status (admin)
//! ```

pub mod cart;
pub mod orders;
pub mod products;
pub mod user;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Largest accepted product upload request (four images plus fields).
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Success envelope: `{"success": true, ...payload}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap a payload in a success envelope.
    pub const fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Payload carrying only a human-readable message.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

/// Create the identity routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(user::register))
        .route("/login", post(user::login))
        .route("/admin", post(user::admin_login))
        .route("/refresh", post(user::refresh))
        .route("/logout", post(user::logout))
        .route("/get-profile", get(user::profile))
        .route("/change-password", post(user::change_password))
}

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/list", get(products::list))
        .route(
            "/add",
            post(products::add).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/remove", post(products::remove))
        .route("/{id}", get(products::show))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/place", post(orders::place))
        .route("/razorpay", post(orders::place_razorpay))
        .route("/verifyRazorpay", post(orders::verify_razorpay))
        .route("/userorders", post(orders::user_orders))
        .route("/list", post(orders::list_all))
        .route("/status", post(orders::update_status))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/user", user_routes())
        .route("/api/product", get(products::search))
        .nest("/api/product", product_routes())
        .route(
            "/api/cart",
            get(cart::show)
                .post(cart::add)
                .patch(cart::update)
                .delete(cart::remove),
        )
        .nest("/api/order", order_routes())
}

/// Build the application with its middleware stack.
///
/// Sentry layers are added by the binary around this router.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config());

    routes()
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .layer(cors)
        .with_state(state)
}

/// Credentialed CORS for the configured origins.
fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| tracing::warn!(origin, "Ignoring invalid CORS origin"))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
