//! Cart route handlers. All require a signed-in user.

use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::extract::ApiJson;
use crate::middleware::RequireUser;
use crate::models::Cart;
use crate::routes::ApiResponse;
use crate::services::CartService;
use crate::state::AppState;

/// Add-to-cart request. `quantity` defaults to 1.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequest {
    #[serde(alias = "itemId")]
    pub product_id: String,
    pub quantity: Option<i64>,
}

/// Quantity update request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    #[serde(alias = "itemId")]
    pub product_id: String,
    pub quantity: i64,
}

/// Line removal request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveRequest {
    #[serde(alias = "itemId")]
    pub product_id: String,
}

#[derive(Debug, Serialize)]
pub struct CartBody {
    pub cart: Cart,
}

/// Current cart.
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<impl IntoResponse> {
    let cart = CartService::new(state.store()).get(user.id).await?;
    Ok(ApiResponse::ok(CartBody { cart }))
}

/// Add a product.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %req.product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(req): ApiJson<AddRequest>,
) -> Result<impl IntoResponse> {
    let cart = CartService::new(state.store())
        .add(user.id, &req.product_id, req.quantity)
        .await?;

    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", req.product_id.as_str())]));
    Ok(ApiResponse::ok(CartBody { cart }))
}

/// Overwrite a line's quantity.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %req.product_id))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(req): ApiJson<UpdateRequest>,
) -> Result<impl IntoResponse> {
    let cart = CartService::new(state.store())
        .update(user.id, &req.product_id, req.quantity)
        .await?;

    Ok(ApiResponse::ok(CartBody { cart }))
}

/// Remove a line.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %req.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(req): ApiJson<RemoveRequest>,
) -> Result<impl IntoResponse> {
    let cart = CartService::new(state.store())
        .remove(user.id, &req.product_id)
        .await?;

    Ok(ApiResponse::ok(CartBody { cart }))
}
