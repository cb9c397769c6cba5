//! `PostgreSQL` order repository.
//!
//! Items and shipping address are stored as JSONB snapshots; the cart rows
//! they came from may change or disappear afterwards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use toybox_core::{OrderId, OrderStatus, PaymentMethod, Price, UserId};

use super::carts::{delete_cart_lines, fetch_cart_lines};
use super::{OrderStore, PgStore, RepositoryError};
use crate::models::{NewOrder, Order, OrderItem, Placement, ShippingAddress};

const ORDER_COLUMNS: &str = "id, user_id, items, shipping_address, amount, payment_method, \
                             payment, status, gateway_order_id, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    items: Json<Vec<OrderItem>>,
    shipping_address: Json<ShippingAddress>,
    amount: Price,
    payment_method: PaymentMethod,
    payment: bool,
    status: OrderStatus,
    gateway_order_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            items: row.items.0,
            shipping_address: row.shipping_address.0,
            total_amount: row.amount,
            payment_method: row.payment_method,
            payment: row.payment,
            status: row.status,
            gateway_order_id: row.gateway_order_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn place_order(&self, order: &NewOrder) -> Result<Placement, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(key) = &order.idempotency_key {
            let existing = sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND idempotency_key = $2"
            ))
            .bind(order.user_id)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(row) = existing {
                tx.commit().await?;
                return Ok(Placement {
                    order: row.into(),
                    replayed: true,
                });
            }
        }

        let lines = fetch_cart_lines(&mut *tx, order.user_id).await?;
        if lines.is_empty() {
            return Err(RepositoryError::EmptyCart);
        }
        let items: Vec<OrderItem> = lines.into_iter().map(OrderItem::from).collect();

        // A concurrent request with the same key wins the insert; we then return its order
        let inserted = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders
                (id, user_id, items, shipping_address, amount, payment_method, payment, status,
                 idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, $8)
            ON CONFLICT (user_id, idempotency_key) DO NOTHING
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(OrderId::generate())
        .bind(order.user_id)
        .bind(Json(&items))
        .bind(Json(&order.shipping_address))
        .bind(order.total_amount)
        .bind(order.payment_method)
        .bind(OrderStatus::Placed)
        .bind(order.idempotency_key.as_deref())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = inserted else {
            let existing = sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND idempotency_key = $2"
            ))
            .bind(order.user_id)
            .bind(order.idempotency_key.as_deref())
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(Placement {
                order: existing.into(),
                replayed: true,
            });
        };

        if order.clear_cart {
            delete_cart_lines(&mut *tx, order.user_id).await?;
        }

        tx.commit().await?;

        Ok(Placement {
            order: row.into(),
            replayed: false,
        })
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    async fn set_gateway_order_id(
        &self,
        id: OrderId,
        gateway_order_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET gateway_order_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(gateway_order_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn confirm_payment(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Only the unpaid-to-paid transition clears the cart
        let updated = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET payment = TRUE, updated_at = now()
            WHERE id = $1 AND user_id = $2 AND payment = FALSE
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = updated else {
            let existing = sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
            ))
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;
            tx.commit().await?;
            return Ok(existing.into());
        };

        delete_cart_lines(&mut *tx, user_id).await?;

        tx.commit().await?;

        Ok(row.into())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn all_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Order::from))
    }
}
