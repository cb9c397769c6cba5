//! `PostgreSQL` cart repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use toybox_core::{Price, ProductId, UserId};

use super::{CartStore, PgStore, RepositoryError, quantity_from_db, quantity_to_db};
use crate::models::{CartLine, CartSnapshot};

#[derive(sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    name: String,
    price: Price,
    image: Option<String>,
    category: String,
    quantity: i32,
    added_at: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: row.product_id,
            name: row.name,
            price: row.price,
            image: row.image,
            category: row.category,
            quantity: quantity_from_db(row.quantity)?,
            added_at: row.added_at,
        })
    }
}

/// Read a user's cart lines, oldest first.
///
/// Generic over the executor so order placement can read inside its transaction.
pub(super) async fn fetch_cart_lines<'e, E>(
    executor: E,
    user_id: UserId,
) -> Result<Vec<CartLine>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, CartLineRow>(
        r"
        SELECT product_id, name, price, image, category, quantity, added_at
        FROM cart_items
        WHERE user_id = $1
        ORDER BY added_at ASC, product_id ASC
        ",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?
    .into_iter()
    .map(CartLine::try_from)
    .collect()
}

/// Delete every line of a user's cart.
pub(super) async fn delete_cart_lines<'e, E>(
    executor: E,
    user_id: UserId,
) -> Result<(), RepositoryError>
where
    E: PgExecutor<'e>,
{
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(())
}

#[async_trait]
impl CartStore for PgStore {
    async fn add_to_cart(
        &self,
        user_id: UserId,
        snapshot: &CartSnapshot,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        // Single statement so concurrent adds cannot overwrite each other.
        // The sum is widened so the guard itself cannot overflow INTEGER.
        let result = sqlx::query(
            r"
            INSERT INTO cart_items (user_id, product_id, quantity, name, price, image, category)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, product_id) DO UPDATE
            SET quantity = cart_items.quantity + EXCLUDED.quantity,
                updated_at = now()
            WHERE cart_items.quantity::BIGINT + EXCLUDED.quantity <= 2147483647
            ",
        )
        .bind(user_id)
        .bind(snapshot.product_id)
        .bind(quantity_to_db(quantity)?)
        .bind(&snapshot.name)
        .bind(snapshot.price)
        .bind(snapshot.image.as_deref())
        .bind(&snapshot.category)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::QuantityLimit);
        }
        Ok(())
    }

    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        if quantity == 0 {
            return self.remove_from_cart(user_id, product_id).await;
        }

        let result = sqlx::query(
            r"
            UPDATE cart_items
            SET quantity = $3, updated_at = now()
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity_to_db(quantity)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_from_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        fetch_cart_lines(&self.pool, user_id).await
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError> {
        delete_cart_lines(&self.pool, user_id).await
    }
}
