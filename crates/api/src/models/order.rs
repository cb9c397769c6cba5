//! Order domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use toybox_core::{Email, OrderId, OrderStatus, PaymentMethod, Price, ProductId, UserId};

use super::cart::CartLine;

/// Product line frozen into an order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
    pub image: Option<String>,
    pub category: String,
}

impl From<CartLine> for OrderItem {
    fn from(line: CartLine) -> Self {
        Self {
            product_id: line.product_id,
            name: line.name,
            price: line.price,
            quantity: line.quantity,
            image: line.image,
            category: line.category,
        }
    }
}

/// Delivery address captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(alias = "street")]
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(alias = "zipcode")]
    pub pincode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl ShippingAddress {
    /// Check that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message naming the first bad field.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("pincode", &self.pincode),
        ];

        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(format!("Shipping address {field} is required"));
        }

        Email::parse(&self.email).map_err(|_| "Shipping address email is invalid".to_string())?;

        Ok(())
    }
}

/// A placed order.
///
/// `items` and `total_amount` never change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub total_amount: Price,
    pub payment_method: PaymentMethod,
    /// Whether the payment has been settled.
    pub payment: bool,
    pub status: OrderStatus,
    pub gateway_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for placing an order. Items come from the stored cart.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub shipping_address: ShippingAddress,
    pub total_amount: Price,
    pub payment_method: PaymentMethod,
    /// Client-chosen key that makes placement safe to retry.
    pub idempotency_key: Option<String>,
    /// Empty the cart in the same transaction as the insert.
    pub clear_cart: bool,
}

/// Outcome of a placement.
#[derive(Debug, Clone)]
pub struct Placement {
    pub order: Order,
    /// `true` when the idempotency key matched an earlier order.
    pub replayed: bool,
}
