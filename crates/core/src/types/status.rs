//! Status enums for various entities.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a status string is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

impl ParseStatusError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Role of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular shopper.
    #[default]
    Customer,
    /// May manage the catalog and all orders.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(ParseStatusError::new("role", s)),
        }
    }
}

/// Fulfillment status of an order.
///
/// The lifecycle runs `Placed -> Packing -> Shipped -> OutForDelivery -> Delivered`.
/// The labels shown in the admin console (`"Order Placed"`, `"Out for delivery"`)
/// are accepted when parsing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
pub enum OrderStatus {
    #[default]
    #[serde(alias = "Order Placed")]
    Placed,
    Packing,
    Shipped,
    #[serde(alias = "Out for delivery")]
    OutForDelivery,
    Delivered,
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Placed,
        Self::Packing,
        Self::Shipped,
        Self::OutForDelivery,
        Self::Delivered,
    ];

    /// Whether no further status follows this one.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Whether moving from `self` to `next` goes back in the lifecycle.
    #[must_use]
    pub fn is_backward_to(self, next: Self) -> bool {
        next < self
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placed => write!(f, "Placed"),
            Self::Packing => write!(f, "Packing"),
            Self::Shipped => write!(f, "Shipped"),
            Self::OutForDelivery => write!(f, "OutForDelivery"),
            Self::Delivered => write!(f, "Delivered"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Placed" | "Order Placed" => Ok(Self::Placed),
            "Packing" => Ok(Self::Packing),
            "Shipped" => Ok(Self::Shipped),
            "OutForDelivery" | "Out for delivery" => Ok(Self::OutForDelivery),
            "Delivered" => Ok(Self::Delivered),
            _ => Err(ParseStatusError::new("order status", s)),
        }
    }
}

/// How an order is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery; settled outside the system.
    #[serde(alias = "COD")]
    Cod,
    /// Online payment through Razorpay.
    #[serde(alias = "Razorpay")]
    Razorpay,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cod => write!(f, "cod"),
            Self::Razorpay => write!(f, "razorpay"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cod" => Ok(Self::Cod),
            "razorpay" => Ok(Self::Razorpay),
            _ => Err(ParseStatusError::new("payment method", s)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_accepts_console_labels() {
        assert_eq!(
            "Order Placed".parse::<OrderStatus>().unwrap(),
            OrderStatus::Placed
        );
        assert_eq!(
            "Out for delivery".parse::<OrderStatus>().unwrap(),
            OrderStatus::OutForDelivery
        );
        let parsed: OrderStatus = serde_json::from_str("\"Out for delivery\"").unwrap();
        assert_eq!(parsed, OrderStatus::OutForDelivery);
    }

    #[test]
    fn test_order_status_rejects_unknown() {
        assert!("Cancelled".parse::<OrderStatus>().is_err());
        assert!(serde_json::from_str::<OrderStatus>("\"Lost\"").is_err());
    }

    #[test]
    fn test_order_status_display_roundtrips() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_backward_transitions() {
        assert!(OrderStatus::Delivered.is_backward_to(OrderStatus::Placed));
        assert!(!OrderStatus::Placed.is_backward_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Packing.is_backward_to(OrderStatus::Packing));
        assert!(OrderStatus::Delivered.is_terminal());
    }

    #[test]
    fn test_payment_method() {
        assert_eq!("COD".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cod);
        let parsed: PaymentMethod = serde_json::from_str("\"razorpay\"").unwrap();
        assert_eq!(parsed, PaymentMethod::Razorpay);
        assert!("stripe".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_role() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::default(), Role::Customer);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}
