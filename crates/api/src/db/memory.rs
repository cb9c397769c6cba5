//! In-memory [`Store`] for tests and local development.
//!
//! All state sits behind one async mutex, so every operation is atomic with
//! respect to the others.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use toybox_core::{Email, OrderId, OrderStatus, ProductId, Role, UserId};

use super::{
    CartStore, MAX_LINE_QUANTITY, OrderStore, ProductStore, RepositoryError, Store, UserStore,
};
use crate::models::{
    CartLine, CartSnapshot, NewOrder, NewProduct, NewUser, Order, OrderItem, Placement, Product,
    ProductFilter, User,
};

#[derive(Default)]
struct State {
    users: HashMap<UserId, (User, String)>,
    /// Creation order.
    products: Vec<Product>,
    /// Lines per user in first-added order.
    carts: HashMap<UserId, Vec<CartLine>>,
    /// Creation order.
    orders: Vec<StoredOrder>,
}

struct StoredOrder {
    order: Order,
    idempotency_key: Option<String>,
}

/// Process-local store. Data is lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;

        if state.users.values().any(|(u, _)| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let now = Utc::now();
        let created = User {
            id: UserId::generate(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        state
            .users
            .insert(created.id, (created.clone(), user.password_hash.clone()));

        Ok(created)
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).map(|(user, _)| user.clone()))
    }

    async fn credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|(user, _)| user.email == *email)
            .cloned())
    }

    async fn credentials_by_id(
        &self,
        id: UserId,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let (user, hash) = state.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        password_hash.clone_into(hash);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let (user, _) = state.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let created = Product {
            id: ProductId::generate(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            category: product.category.clone(),
            sub_category: product.sub_category.clone(),
            bestseller: product.bestseller,
            images: product.images.clone(),
            sizes: product.sizes.clone(),
            created_at: Utc::now(),
        };
        self.state.lock().await.products.push(created.clone());
        Ok(created)
    }

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.state.lock().await.products.clone())
    }

    async fn search_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut products: Vec<Product> = {
            let state = self.state.lock().await;
            state
                .products
                .iter()
                .filter(|p| filter.matches(p))
                .cloned()
                .collect()
        };

        if let Some(sort_by) = filter.sort_by {
            sort_by.apply(&mut products);
        }

        Ok(products)
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let before = state.products.len();
        state.products.retain(|p| p.id != id);
        Ok(state.products.len() < before)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn add_to_cart(
        &self,
        user_id: UserId,
        snapshot: &CartSnapshot,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        if quantity > MAX_LINE_QUANTITY {
            return Err(RepositoryError::QuantityLimit);
        }

        let mut state = self.state.lock().await;
        let lines = state.carts.entry(user_id).or_default();

        if let Some(line) = lines
            .iter_mut()
            .find(|line| line.product_id == snapshot.product_id)
        {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .filter(|total| *total <= MAX_LINE_QUANTITY)
                .ok_or(RepositoryError::QuantityLimit)?;
        } else {
            lines.push(CartLine {
                product_id: snapshot.product_id,
                name: snapshot.name.clone(),
                price: snapshot.price,
                image: snapshot.image.clone(),
                category: snapshot.category.clone(),
                quantity,
                added_at: Utc::now(),
            });
        }

        Ok(())
    }

    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        if quantity > MAX_LINE_QUANTITY {
            return Err(RepositoryError::QuantityLimit);
        }

        let mut state = self.state.lock().await;
        let Some(lines) = state.carts.get_mut(&user_id) else {
            return Ok(false);
        };
        let Some(position) = lines.iter().position(|line| line.product_id == product_id) else {
            return Ok(false);
        };

        if quantity == 0 {
            lines.remove(position);
        } else if let Some(line) = lines.get_mut(position) {
            line.quantity = quantity;
        }

        Ok(true)
    }

    async fn remove_from_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        self.set_cart_quantity(user_id, product_id, 0).await
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError> {
        self.state.lock().await.carts.remove(&user_id);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn place_order(&self, order: &NewOrder) -> Result<Placement, RepositoryError> {
        let mut state = self.state.lock().await;

        if let Some(key) = &order.idempotency_key
            && let Some(existing) = state.orders.iter().find(|stored| {
                stored.order.user_id == order.user_id
                    && stored.idempotency_key.as_ref() == Some(key)
            })
        {
            return Ok(Placement {
                order: existing.order.clone(),
                replayed: true,
            });
        }

        let lines = state.carts.get(&order.user_id).cloned().unwrap_or_default();
        if lines.is_empty() {
            return Err(RepositoryError::EmptyCart);
        }

        let now = Utc::now();
        let created = Order {
            id: OrderId::generate(),
            user_id: order.user_id,
            items: lines.into_iter().map(OrderItem::from).collect(),
            shipping_address: order.shipping_address.clone(),
            total_amount: order.total_amount,
            payment_method: order.payment_method,
            payment: false,
            status: OrderStatus::Placed,
            gateway_order_id: None,
            created_at: now,
            updated_at: now,
        };

        state.orders.push(StoredOrder {
            order: created.clone(),
            idempotency_key: order.idempotency_key.clone(),
        });
        if order.clear_cart {
            state.carts.remove(&order.user_id);
        }

        Ok(Placement {
            order: created,
            replayed: false,
        })
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .find(|stored| stored.order.id == id)
            .map(|stored| stored.order.clone()))
    }

    async fn set_gateway_order_id(
        &self,
        id: OrderId,
        gateway_order_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let stored = state
            .orders
            .iter_mut()
            .find(|stored| stored.order.id == id)
            .ok_or(RepositoryError::NotFound)?;
        stored.order.gateway_order_id = Some(gateway_order_id.to_owned());
        stored.order.updated_at = Utc::now();
        Ok(())
    }

    async fn confirm_payment(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.state.lock().await;
        let stored = state
            .orders
            .iter_mut()
            .find(|stored| stored.order.id == id && stored.order.user_id == user_id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.order.payment {
            return Ok(stored.order.clone());
        }
        stored.order.payment = true;
        stored.order.updated_at = Utc::now();
        let order = stored.order.clone();

        state.carts.remove(&user_id);

        Ok(order)
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|stored| stored.order.user_id == user_id)
            .map(|stored| stored.order.clone())
            .collect())
    }

    async fn all_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .map(|stored| stored.order.clone())
            .collect())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state
            .orders
            .iter_mut()
            .find(|stored| stored.order.id == id)
            .map(|stored| {
                stored.order.status = status;
                stored.order.updated_at = Utc::now();
                stored.order.clone()
            }))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
