//! Storage for users, products, carts, and orders.
//!
//! Handlers and services talk to the [`Store`] trait; two backends implement it:
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx (production)
//! - [`MemoryStore`] - process-local, used by tests and `API_STORE=memory`
//!
//! ## Tables
//!
//! - `users` - Accounts with Argon2 password hashes and a role
//! - `products` - Catalog
//! - `cart_items` - One row per (user, product) line
//! - `orders` - Placed orders with item and address snapshots (JSONB)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p toybox-cli -- migrate
//! ```

mod carts;
pub mod memory;
mod orders;
mod products;
mod users;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use toybox_core::{Email, OrderId, OrderStatus, ProductId, Role, UserId};

use crate::models::{
    CartLine, CartSnapshot, NewOrder, NewProduct, NewUser, Order, Placement, Product,
    ProductFilter, User,
};

pub use memory::MemoryStore;

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in database is invalid or corrupted.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Record not found.
    #[error("record not found")]
    NotFound,

    /// Unique constraint violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An order was requested for a cart with no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// A cart line would exceed [`MAX_LINE_QUANTITY`].
    #[error("quantity cannot exceed {}", MAX_LINE_QUANTITY)]
    QuantityLimit,
}

/// Largest quantity a cart line can hold (the `INTEGER` column's range).
pub const MAX_LINE_QUANTITY: u32 = i32::MAX.unsigned_abs();

/// Account storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the email is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError>;

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Look up a user together with their password hash.
    async fn credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    async fn credentials_by_id(
        &self,
        id: UserId,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Replace a user's password hash. [`RepositoryError::NotFound`] if absent.
    async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError>;

    /// Change a user's role. [`RepositoryError::NotFound`] if absent.
    async fn set_role(&self, id: UserId, role: Role) -> Result<(), RepositoryError>;
}

/// Catalog storage.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError>;

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// All products in creation order.
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Products matching every constraint of `filter`.
    ///
    /// Without `sort_by`, results are in creation order.
    async fn search_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// Delete a product. Returns `false` if it did not exist.
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;
}

/// Per-user cart storage.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Add `quantity` units, creating the line from `snapshot` if absent.
    ///
    /// The increment is atomic: concurrent adds for the same line never lose
    /// units. Fails with [`RepositoryError::QuantityLimit`], leaving the line
    /// unchanged, if the result would exceed [`MAX_LINE_QUANTITY`].
    async fn add_to_cart(
        &self,
        user_id: UserId,
        snapshot: &CartSnapshot,
        quantity: u32,
    ) -> Result<(), RepositoryError>;

    /// Overwrite a line's quantity; zero deletes the line.
    ///
    /// Returns `false` if the line did not exist.
    /// [`RepositoryError::QuantityLimit`] above [`MAX_LINE_QUANTITY`].
    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, RepositoryError>;

    /// Delete a line. Returns `false` if it did not exist.
    async fn remove_from_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError>;

    /// Lines in first-added order.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError>;

    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError>;
}

/// Order storage.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Snapshot the user's cart into a new order, atomically.
    ///
    /// Fails with [`RepositoryError::EmptyCart`] if the cart has no lines.
    /// When `order.idempotency_key` matches an earlier order of the same user,
    /// that order is returned and nothing is written.
    async fn place_order(&self, order: &NewOrder) -> Result<Placement, RepositoryError>;

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn set_gateway_order_id(
        &self,
        id: OrderId,
        gateway_order_id: &str,
    ) -> Result<(), RepositoryError>;

    /// Mark the user's order paid and empty their cart in one transaction.
    ///
    /// An order that is already paid is returned unchanged and the cart is
    /// left alone. [`RepositoryError::NotFound`] if the order does not belong
    /// to the user.
    async fn confirm_payment(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Order, RepositoryError>;

    /// The user's orders, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Every order, newest first.
    async fn all_orders(&self) -> Result<Vec<Order>, RepositoryError>;

    /// Overwrite an order's status. Returns `None` if it does not exist.
    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError>;
}

/// Everything the API persists.
#[async_trait]
pub trait Store: UserStore + ProductStore + CartStore + OrderStore {
    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// `PostgreSQL`-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique violation to [`RepositoryError::Conflict`].
fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Convert a stored quantity back to the domain type.
fn quantity_from_db(value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative quantity {value}")))
}

/// Convert a domain quantity for storage.
fn quantity_to_db(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value).map_err(|_| RepositoryError::QuantityLimit)
}
