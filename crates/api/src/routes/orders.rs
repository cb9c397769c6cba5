//! Order route handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use toybox_core::OrderId;

use crate::error::{Result, add_breadcrumb};
use crate::extract::ApiJson;
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::{Order, ShippingAddress};
use crate::routes::ApiResponse;
use crate::services::{Checkout, GatewayOrder, OrderService};
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Checkout request. Line items are taken from the stored cart; any `items`
/// sent by the client are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRequest {
    #[serde(alias = "address")]
    pub shipping_address: ShippingAddress,
    #[serde(alias = "amount")]
    pub total_amount: Decimal,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl From<PlaceRequest> for Checkout {
    fn from(req: PlaceRequest) -> Self {
        Self {
            shipping_address: req.shipping_address,
            amount: req.total_amount,
            idempotency_key: req.idempotency_key,
        }
    }
}

/// Online payment confirmation request.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(alias = "razorpayOrderId")]
    pub razorpay_order_id: String,
}

/// Fulfillment status change.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub order_id: String,
    pub status: String,
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct OrderBody {
    pub message: &'static str,
    pub order: Order,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCheckoutBody {
    /// The gateway order the client pays against.
    pub order: GatewayOrder,
    pub order_id: OrderId,
}

#[derive(Debug, Serialize)]
pub struct OrdersBody {
    pub orders: Vec<Order>,
}

fn orders(state: &AppState) -> OrderService<'_> {
    OrderService::new(state.store(), state.gateway(), &state.config().currency)
}

// =============================================================================
// Handlers
// =============================================================================

/// Place a cash-on-delivery order from the cart.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(req): ApiJson<PlaceRequest>,
) -> Result<impl IntoResponse> {
    let placement = orders(&state).place_cod(user.id, req.into()).await?;

    let status = if placement.replayed {
        StatusCode::OK
    } else {
        add_breadcrumb("checkout", "Order placed", None);
        StatusCode::CREATED
    };

    Ok((
        status,
        ApiResponse::ok(OrderBody {
            message: "Order placed",
            order: placement.order,
        }),
    ))
}

/// Start an online payment checkout.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn place_razorpay(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(req): ApiJson<PlaceRequest>,
) -> Result<impl IntoResponse> {
    let checkout = orders(&state)
        .place_with_gateway(user.id, req.into())
        .await?;

    Ok(ApiResponse::ok(GatewayCheckoutBody {
        order: checkout.gateway_order,
        order_id: checkout.order.id,
    }))
}

/// Confirm an online payment with the gateway.
#[instrument(skip_all, fields(user_id = %user.id, gateway_order_id = %req.razorpay_order_id))]
pub async fn verify_razorpay(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(req): ApiJson<VerifyRequest>,
) -> Result<impl IntoResponse> {
    let order = orders(&state)
        .confirm_payment(user.id, &req.razorpay_order_id)
        .await?;

    Ok(ApiResponse::ok(OrderBody {
        message: "Payment successful",
        order,
    }))
}

/// The signed-in user's orders, newest first.
pub async fn user_orders(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<impl IntoResponse> {
    let orders = orders(&state).list_for_user(user.id).await?;
    Ok(ApiResponse::ok(OrdersBody { orders }))
}

/// Every order, newest first.
pub async fn list_all(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let orders = orders(&state).list_all().await?;
    Ok(ApiResponse::ok(OrdersBody { orders }))
}

/// Set an order's fulfillment status.
#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %req.order_id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<impl IntoResponse> {
    let order = orders(&state)
        .update_status(&req.order_id, &req.status)
        .await?;

    Ok(ApiResponse::ok(OrderBody {
        message: "Status updated",
        order,
    }))
}
