//! Cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use toybox_core::{Price, ProductId};

use super::product::Product;

/// One product in a user's cart.
///
/// Display fields are captured when the product is first added and are not
/// refreshed if the catalog entry changes later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: Option<String>,
    pub category: String,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

/// Product fields copied into a cart line on first add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: Option<String>,
    pub category: String,
}

impl From<&Product> for CartSnapshot {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            price: product.price,
            image: product.primary_image().map(String::from),
            category: product.category.clone(),
        }
    }
}

/// A user's cart as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// Lines in first-added order.
    pub items: Vec<CartLine>,
    pub total_quantity: u64,
    pub subtotal: Decimal,
}

impl Cart {
    /// Build the view from stored lines.
    ///
    /// Returns `None` if the totals overflow.
    #[must_use]
    pub fn from_lines(items: Vec<CartLine>) -> Option<Self> {
        let mut total_quantity: u64 = 0;
        let mut subtotal = Decimal::ZERO;
        for line in &items {
            total_quantity = total_quantity.checked_add(u64::from(line.quantity))?;
            subtotal = subtotal.checked_add(line.price.times(line.quantity)?)?;
        }

        Some(Self {
            items,
            total_quantity,
            subtotal,
        })
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(price: &str, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::generate(),
            name: "Plush Bunny".to_string(),
            price: Price::parse(price).unwrap(),
            image: None,
            category: "softtoys".to_string(),
            quantity,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_totals() {
        let cart = Cart::from_lines(vec![line("100", 2), line("12.5", 3)]).unwrap();
        assert_eq!(cart.total_quantity, 5);
        assert_eq!(cart.subtotal, Decimal::new(2375, 1));
    }

    #[test]
    fn test_empty() {
        let cart = Cart::from_lines(vec![]).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal, Decimal::ZERO);
    }

    #[test]
    fn test_totals_past_u32() {
        let max = u32::try_from(i32::MAX).unwrap();
        let lines = vec![line("9999999999.99", max), line("1", max), line("1", max)];
        let cart = Cart::from_lines(lines).unwrap();

        assert_eq!(cart.total_quantity, 3 * u64::from(max));
        assert_eq!(
            cart.subtotal,
            Price::MAX.amount() * Decimal::from(max) + Decimal::from(2 * u64::from(max))
        );
    }
}
