//! Domain models.
//!
//! These types represent validated domain objects separate from database row types.

pub mod cart;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{Cart, CartLine, CartSnapshot};
pub use order::{NewOrder, Order, OrderItem, Placement, ShippingAddress};
pub use product::{NewProduct, Product, ProductFilter, SortBy};
pub use user::{CurrentUser, NewUser, User};
