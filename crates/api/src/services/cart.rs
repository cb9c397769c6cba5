//! Per-user cart operations.

use thiserror::Error;
use tracing::instrument;

use toybox_core::{ProductId, UserId};

use crate::db::{MAX_LINE_QUANTITY, RepositoryError, Store};
use crate::models::{Cart, CartSnapshot};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("{0}")]
    Validation(String),

    #[error("Product not found")]
    ProductNotFound,

    #[error("Item not in cart")]
    LineNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

const MAX_QUANTITY: i64 = MAX_LINE_QUANTITY as i64;

/// Cart service.
pub struct CartService<'a> {
    store: &'a dyn Store,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// The user's cart. Empty if they never added anything.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the store fails.
    pub async fn get(&self, user_id: UserId) -> Result<Cart, CartError> {
        let lines = self.store.cart_lines(user_id).await?;
        Cart::from_lines(lines)
            .ok_or_else(|| CartError::Validation("Cart total is too large".to_string()))
    }

    /// Add `quantity` units (default 1) of a product.
    ///
    /// A product already in the cart accumulates; otherwise a new line is
    /// created from the product's current name, price, image, and category.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` for unknown products and
    /// `CartError::Validation` for a quantity below 1.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: &str,
        quantity: Option<i64>,
    ) -> Result<Cart, CartError> {
        let quantity = quantity.unwrap_or(1);
        if quantity < 1 {
            return Err(CartError::Validation(
                "Quantity must be at least 1".to_string(),
            ));
        }
        let quantity = checked_quantity(quantity)?;

        let product_id: ProductId = product_id
            .parse()
            .map_err(|_| CartError::ProductNotFound)?;
        let product = self
            .store
            .product_by_id(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;

        self.store
            .add_to_cart(user_id, &CartSnapshot::from(&product), quantity)
            .await
            .map_err(quantity_error)?;

        self.get(user_id).await
    }

    /// Overwrite a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the product is not in the cart
    /// and `CartError::Validation` for a negative quantity.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        user_id: UserId,
        product_id: &str,
        quantity: i64,
    ) -> Result<Cart, CartError> {
        if quantity < 0 {
            return Err(CartError::Validation(
                "Quantity cannot be negative".to_string(),
            ));
        }
        let quantity = checked_quantity(quantity)?;

        let product_id: ProductId = product_id.parse().map_err(|_| CartError::LineNotFound)?;
        if !self
            .store
            .set_cart_quantity(user_id, product_id, quantity)
            .await
            .map_err(quantity_error)?
        {
            return Err(CartError::LineNotFound);
        }

        self.get(user_id).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the product is not in the cart.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, product_id: &str) -> Result<Cart, CartError> {
        let product_id: ProductId = product_id.parse().map_err(|_| CartError::LineNotFound)?;
        if !self.store.remove_from_cart(user_id, product_id).await? {
            return Err(CartError::LineNotFound);
        }

        self.get(user_id).await
    }
}

fn quantity_error(e: RepositoryError) -> CartError {
    match e {
        RepositoryError::QuantityLimit => {
            CartError::Validation(format!("Quantity cannot exceed {MAX_QUANTITY}"))
        }
        other => CartError::Repository(other),
    }
}

fn checked_quantity(quantity: i64) -> Result<u32, CartError> {
    if quantity > MAX_QUANTITY {
        return Err(CartError::Validation(format!(
            "Quantity cannot exceed {MAX_QUANTITY}"
        )));
    }
    u32::try_from(quantity)
        .map_err(|_| CartError::Validation("Quantity cannot be negative".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use toybox_core::Price;

    use super::*;
    use crate::db::{MemoryStore, ProductStore};
    use crate::models::{NewProduct, Product};

    async fn product(store: &MemoryStore, name: &str, price: &str) -> Product {
        store
            .insert_product(&NewProduct {
                name: name.to_string(),
                description: String::new(),
                price: Price::parse(price).unwrap(),
                category: "softtoys".to_string(),
                sub_category: "animals".to_string(),
                bestseller: false,
                images: vec!["https://cdn.test/a.jpg".to_string()],
                sizes: vec![],
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_accumulates_then_update_to_zero_removes() {
        let store = MemoryStore::new();
        let p1 = product(&store, "Bunny", "100").await;
        let cart = CartService::new(&store);
        let user = UserId::generate();
        let id = p1.id.to_string();

        let after_first = cart.add(user, &id, Some(2)).await.unwrap();
        assert_eq!(after_first.items.len(), 1);
        assert_eq!(after_first.total_quantity, 2);

        let after_second = cart.add(user, &id, Some(3)).await.unwrap();
        assert_eq!(after_second.items.len(), 1);
        assert_eq!(after_second.items[0].quantity, 5);
        assert_eq!(
            after_second.items[0].image.as_deref(),
            Some("https://cdn.test/a.jpg")
        );

        let emptied = cart.update(user, &id, 0).await.unwrap();
        assert!(emptied.is_empty());
    }

    #[tokio::test]
    async fn test_add_defaults_to_one() {
        let store = MemoryStore::new();
        let p1 = product(&store, "Bunny", "100").await;
        let cart = CartService::new(&store);
        let user = UserId::generate();

        let result = cart.add(user, &p1.id.to_string(), None).await.unwrap();
        assert_eq!(result.total_quantity, 1);
    }

    #[tokio::test]
    async fn test_add_rejections() {
        let store = MemoryStore::new();
        let p1 = product(&store, "Bunny", "100").await;
        let cart = CartService::new(&store);
        let user = UserId::generate();

        assert!(matches!(
            cart.add(user, &ProductId::generate().to_string(), None).await,
            Err(CartError::ProductNotFound)
        ));
        assert!(matches!(
            cart.add(user, "garbage", None).await,
            Err(CartError::ProductNotFound)
        ));
        assert!(matches!(
            cart.add(user, &p1.id.to_string(), Some(0)).await,
            Err(CartError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_overwrites_and_requires_line() {
        let store = MemoryStore::new();
        let p1 = product(&store, "Bunny", "100").await;
        let cart = CartService::new(&store);
        let user = UserId::generate();
        let id = p1.id.to_string();

        assert!(matches!(
            cart.update(user, &id, 4).await,
            Err(CartError::LineNotFound)
        ));

        cart.add(user, &id, Some(2)).await.unwrap();
        let updated = cart.update(user, &id, 7).await.unwrap();
        assert_eq!(updated.total_quantity, 7);

        assert!(matches!(
            cart.update(user, &id, -1).await,
            Err(CartError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_accumulated_quantity_is_capped() {
        let store = MemoryStore::new();
        let p1 = product(&store, "Bunny", "100").await;
        let cart = CartService::new(&store);
        let user = UserId::generate();
        let id = p1.id.to_string();

        cart.add(user, &id, Some(MAX_QUANTITY)).await.unwrap();
        assert!(matches!(
            cart.add(user, &id, Some(MAX_QUANTITY)).await,
            Err(CartError::Validation(_))
        ));
        assert!(matches!(
            cart.add(user, &id, Some(1)).await,
            Err(CartError::Validation(_))
        ));
        assert!(matches!(
            cart.update(user, &id, MAX_QUANTITY + 1).await,
            Err(CartError::Validation(_))
        ));

        let current = cart.get(user).await.unwrap();
        assert_eq!(current.items[0].quantity, MAX_LINE_QUANTITY);
    }

    #[tokio::test]
    async fn test_totals_of_full_lines() {
        let store = MemoryStore::new();
        let cart = CartService::new(&store);
        let user = UserId::generate();

        for name in ["Bunny", "Bear", "Fox"] {
            let p = product(&store, name, "9999999999.99").await;
            cart.add(user, &p.id.to_string(), Some(MAX_QUANTITY))
                .await
                .unwrap();
        }

        let current = cart.get(user).await.unwrap();
        assert_eq!(current.total_quantity, 3 * u64::from(MAX_LINE_QUANTITY));
        assert_eq!(
            current.subtotal,
            Price::MAX.amount() * rust_decimal::Decimal::from(3 * u64::from(MAX_LINE_QUANTITY))
        );
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryStore::new();
        let p1 = product(&store, "Bunny", "100").await;
        let cart = CartService::new(&store);
        let user = UserId::generate();
        let id = p1.id.to_string();

        assert!(matches!(
            cart.remove(user, &id).await,
            Err(CartError::LineNotFound)
        ));
        cart.add(user, &id, None).await.unwrap();
        assert!(cart.remove(user, &id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_survives_catalog_removal() {
        let store = MemoryStore::new();
        let p1 = product(&store, "Bunny", "100").await;
        let cart = CartService::new(&store);
        let user = UserId::generate();

        cart.add(user, &p1.id.to_string(), Some(2)).await.unwrap();
        store.delete_product(p1.id).await.unwrap();

        let current = cart.get(user).await.unwrap();
        assert_eq!(current.items[0].name, "Bunny");
        assert_eq!(current.subtotal, Price::parse("200").unwrap().amount());
    }
}
