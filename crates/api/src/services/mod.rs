//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login, tokens, admin bootstrap
//! - `catalog` - Product reads and admin product management
//! - `cart` - Per-user cart
//! - `orders` - Checkout, payment confirmation, fulfillment status
//! - `payments` - Payment gateway client
//! - `assets` - Image hosting client
//!
//! Services borrow the store and collaborators from `AppState` for the
//! duration of a request.

pub mod assets;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod payments;

pub use assets::{AssetError, AssetHost, CloudinaryClient, TempUpload};
pub use auth::{AuthError, AuthService, TokenService};
pub use cart::{CartError, CartService};
pub use catalog::{CatalogError, CatalogService, ImageUpload, ProductForm, SearchParams};
pub use orders::{Checkout, GatewayCheckout, OrderError, OrderService};
pub use payments::{GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway, RazorpayClient};
