//! Checkout, payment confirmation, and fulfillment status.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use toybox_core::{OrderId, OrderStatus, PaymentMethod, Price, PriceError, UserId};

use crate::db::{RepositoryError, Store};
use crate::models::{NewOrder, Order, Placement, ShippingAddress};
use crate::services::payments::{GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway};

/// Longest accepted idempotency key.
const MAX_IDEMPOTENCY_KEY_LENGTH: usize = 255;

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0}")]
    Validation(String),

    #[error("Order not found")]
    NotFound,

    /// The gateway reports the order as not paid.
    #[error("payment fail")]
    PaymentFailed,

    /// Online payment was requested but no gateway is configured.
    #[error("payment gateway is not configured")]
    GatewayUnavailable,

    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// What the customer submits at checkout. Items come from their cart.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub shipping_address: ShippingAddress,
    pub amount: Decimal,
    pub idempotency_key: Option<String>,
}

/// A locally stored order together with its gateway counterpart.
#[derive(Debug, Clone)]
pub struct GatewayCheckout {
    pub order: Order,
    pub gateway_order: GatewayOrder,
}

/// Order service.
pub struct OrderService<'a> {
    store: &'a dyn Store,
    gateway: Option<&'a dyn PaymentGateway>,
    currency: &'a str,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        gateway: Option<&'a dyn PaymentGateway>,
        currency: &'a str,
    ) -> Self {
        Self {
            store,
            gateway,
            currency,
        }
    }

    /// Place a cash-on-delivery order from the user's cart.
    ///
    /// The order insert and the cart clear commit together.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for an empty cart, a bad address, or
    /// a non-positive amount.
    #[instrument(skip(self, checkout))]
    pub async fn place_cod(
        &self,
        user_id: UserId,
        checkout: Checkout,
    ) -> Result<Placement, OrderError> {
        let order = new_order(user_id, checkout, PaymentMethod::Cod)?;
        let placement = self.store.place_order(&order).await.map_err(placement_error)?;
        ensure_same_method(&placement, PaymentMethod::Cod)?;

        if placement.replayed {
            tracing::info!(order_id = %placement.order.id, "Order placement replayed");
        } else {
            tracing::info!(order_id = %placement.order.id, "Order placed");
        }
        Ok(placement)
    }

    /// Place an order paid through the gateway.
    ///
    /// The local order is stored unpaid and the cart is kept until payment is
    /// confirmed. If the gateway call fails the unpaid order remains.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::GatewayUnavailable` or `OrderError::Gateway` when
    /// the gateway cannot be used, plus the validation errors of
    /// [`Self::place_cod`].
    #[instrument(skip(self, checkout))]
    pub async fn place_with_gateway(
        &self,
        user_id: UserId,
        checkout: Checkout,
    ) -> Result<GatewayCheckout, OrderError> {
        let gateway = self.gateway.ok_or(OrderError::GatewayUnavailable)?;

        let order = new_order(user_id, checkout, PaymentMethod::Razorpay)?;
        let placement = self.store.place_order(&order).await.map_err(placement_error)?;
        ensure_same_method(&placement, PaymentMethod::Razorpay)?;
        let Placement { order, replayed } = placement;

        // A replay charges what was stored, not what this request sent
        let amount = order
            .total_amount
            .to_minor_units()
            .ok_or_else(|| OrderError::Validation("Amount is too large".to_string()))?;

        if replayed && let Some(existing) = &order.gateway_order_id {
            let gateway_order = gateway.fetch_order(existing).await?;
            return Ok(GatewayCheckout {
                order,
                gateway_order,
            });
        }

        let gateway_order = gateway
            .create_order(&GatewayOrderRequest {
                amount,
                currency: self.currency.to_owned(),
                receipt: order.id.to_string(),
            })
            .await
            .inspect_err(|e| {
                tracing::error!(order_id = %order.id, error = %e, "Gateway order creation failed");
            })?;

        self.store
            .set_gateway_order_id(order.id, &gateway_order.id)
            .await?;

        let order = Order {
            gateway_order_id: Some(gateway_order.id.clone()),
            ..order
        };

        tracing::info!(
            order_id = %order.id,
            gateway_order_id = %gateway_order.id,
            "Order awaiting online payment"
        );
        Ok(GatewayCheckout {
            order,
            gateway_order,
        })
    }

    /// Mark an order paid once the gateway reports it paid.
    ///
    /// Paying clears the user's cart in the same transaction. Nothing changes
    /// when the gateway order is unpaid.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::PaymentFailed` when unpaid, `OrderError::NotFound`
    /// if the receipt does not name an order of this user, and the gateway
    /// errors when it cannot be reached.
    #[instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        user_id: UserId,
        gateway_order_id: &str,
    ) -> Result<Order, OrderError> {
        let gateway = self.gateway.ok_or(OrderError::GatewayUnavailable)?;

        let gateway_order = gateway.fetch_order(gateway_order_id.trim()).await?;
        if !gateway_order.is_paid() {
            tracing::info!(gateway_order_id, status = %gateway_order.status, "Payment not completed");
            return Err(OrderError::PaymentFailed);
        }

        let order_id: OrderId = gateway_order
            .receipt
            .as_deref()
            .and_then(|receipt| receipt.parse().ok())
            .ok_or(OrderError::NotFound)?;

        let order = self
            .store
            .order_by_id(order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or(OrderError::NotFound)?;

        if order.gateway_order_id.as_deref() != Some(gateway_order.id.as_str()) {
            tracing::warn!(order_id = %order.id, gateway_order_id, "Gateway order does not match receipt");
            return Err(OrderError::NotFound);
        }

        let order = self
            .store
            .confirm_payment(user_id, order.id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => OrderError::NotFound,
                other => OrderError::Repository(other),
            })?;

        tracing::info!(order_id = %order.id, "Payment confirmed");
        Ok(order)
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.orders_for_user(user_id).await?)
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.all_orders().await?)
    }

    /// Set an order's fulfillment status.
    ///
    /// Any of the five statuses is accepted from any other. Moves backwards in
    /// the lifecycle are logged.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for an unknown status and
    /// `OrderError::NotFound` for an unknown order.
    #[instrument(skip(self))]
    pub async fn update_status(&self, order_id: &str, status: &str) -> Result<Order, OrderError> {
        let status: OrderStatus = status
            .parse()
            .map_err(|_| OrderError::Validation(format!("Invalid status: {status}")))?;
        let order_id: OrderId = order_id.parse().map_err(|_| OrderError::NotFound)?;

        let current = self
            .store
            .order_by_id(order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if current.status.is_backward_to(status) {
            tracing::warn!(
                order_id = %order_id,
                from = %current.status,
                to = %status,
                "Order status moved backwards"
            );
        }

        let order = self
            .store
            .update_order_status(order_id, status)
            .await?
            .ok_or(OrderError::NotFound)?;

        tracing::info!(order_id = %order_id, status = %status, "Order status updated");
        Ok(order)
    }
}

fn new_order(
    user_id: UserId,
    checkout: Checkout,
    payment_method: PaymentMethod,
) -> Result<NewOrder, OrderError> {
    checkout
        .shipping_address
        .validate()
        .map_err(OrderError::Validation)?;

    let total_amount = match Price::new(checkout.amount) {
        Ok(price) if price.is_positive() => price,
        Ok(_) | Err(PriceError::Negative | PriceError::NotANumber) => {
            return Err(OrderError::Validation(
                "Amount must be a positive number".to_string(),
            ));
        }
        Err(e) => return Err(OrderError::Validation(format!("Amount: {e}"))),
    };

    let idempotency_key = checkout
        .idempotency_key
        .map(|key| key.trim().to_owned())
        .filter(|key| !key.is_empty());
    if idempotency_key
        .as_ref()
        .is_some_and(|key| key.len() > MAX_IDEMPOTENCY_KEY_LENGTH)
    {
        return Err(OrderError::Validation(format!(
            "idempotencyKey cannot exceed {MAX_IDEMPOTENCY_KEY_LENGTH} characters"
        )));
    }

    Ok(NewOrder {
        user_id,
        shipping_address: checkout.shipping_address,
        total_amount,
        payment_method,
        idempotency_key,
        clear_cart: payment_method == PaymentMethod::Cod,
    })
}

/// Reject an idempotency key first used for the other payment method.
fn ensure_same_method(placement: &Placement, method: PaymentMethod) -> Result<(), OrderError> {
    if placement.replayed && placement.order.payment_method != method {
        tracing::warn!(
            order_id = %placement.order.id,
            stored = %placement.order.payment_method,
            requested = %method,
            "Idempotency key reused across payment methods"
        );
        return Err(OrderError::Validation(
            "idempotencyKey was already used with a different payment method".to_string(),
        ));
    }
    Ok(())
}

fn placement_error(e: RepositoryError) -> OrderError {
    match e {
        RepositoryError::EmptyCart => OrderError::Validation("items is empty".to_string()),
        other => OrderError::Repository(other),
    }
}
