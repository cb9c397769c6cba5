//! Integration tests for Toybox.
//!
//! Each test builds a [`TestContext`]: the real router served on an
//! ephemeral port over an in-memory store, with in-process fakes for the
//! payment gateway and the image host. No database or network access is
//! needed.
//!
//! ```bash
//! cargo test -p toybox-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use toybox_api::config::ApiConfig;
use toybox_api::db::{MemoryStore, ProductStore};
use toybox_api::models::{NewProduct, Product};
use toybox_api::routes;
use toybox_api::services::{
    AssetError, AssetHost, AuthService, GatewayError, GatewayOrder, GatewayOrderRequest,
    PaymentGateway,
};
use toybox_api::state::AppState;
use toybox_core::Price;

pub const ADMIN_EMAIL: &str = "admin@toybox.test";
pub const ADMIN_PASSWORD: &str = "admin-passphrase-42";

const JWT_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";
const JWT_REFRESH_SECRET: &str = "Zq8!vN2@wE5#tR7$yU1%iO3^pA6&sD9*";

// =============================================================================
// Fakes
// =============================================================================

/// Payment gateway kept in process. Orders are paid only when [`Self::pay`]
/// is called.
#[derive(Default)]
pub struct FakeGateway {
    orders: Mutex<HashMap<String, GatewayOrder>>,
    created: AtomicUsize,
    down: AtomicBool,
}

impl FakeGateway {
    /// Mark a gateway order as paid.
    pub fn pay(&self, gateway_order_id: &str) {
        if let Some(order) = self
            .orders
            .lock()
            .expect("gateway lock poisoned")
            .get_mut(gateway_order_id)
        {
            order.status = "paid".to_string();
        }
    }

    /// Make every call fail as if the gateway were unreachable.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Number of gateway orders opened so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn check_up(&self) -> Result<(), GatewayError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                status: 503,
                message: "gateway down".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        request: &GatewayOrderRequest,
    ) -> Result<GatewayOrder, GatewayError> {
        self.check_up()?;
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let order = GatewayOrder {
            id: format!("order_test{n}"),
            amount: request.amount,
            currency: request.currency.clone(),
            receipt: Some(request.receipt.clone()),
            status: "created".to_string(),
        };
        self.orders
            .lock()
            .expect("gateway lock poisoned")
            .insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, gateway_order_id: &str) -> Result<GatewayOrder, GatewayError> {
        self.check_up()?;
        self.orders
            .lock()
            .expect("gateway lock poisoned")
            .get(gateway_order_id)
            .cloned()
            .ok_or_else(|| GatewayError::Api {
                status: 400,
                message: "The id provided does not exist".to_string(),
            })
    }
}

/// Image host that checks the scratch file exists and returns a fake URL.
#[derive(Default)]
pub struct FakeAssetHost {
    uploads: Mutex<Vec<usize>>,
}

impl FakeAssetHost {
    /// Sizes in bytes of every uploaded file.
    pub fn uploaded_sizes(&self) -> Vec<usize> {
        self.uploads.lock().expect("asset lock poisoned").clone()
    }
}

#[async_trait]
impl AssetHost for FakeAssetHost {
    async fn upload_image(&self, path: &Path) -> Result<String, AssetError> {
        let bytes = tokio::fs::read(path).await?;
        let mut uploads = self.uploads.lock().expect("asset lock poisoned");
        uploads.push(bytes.len());
        Ok(format!("https://assets.test/image{}.jpg", uploads.len()))
    }
}

// =============================================================================
// Test Context
// =============================================================================

/// A running API server plus handles on its collaborators.
pub struct TestContext {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<FakeGateway>,
    pub assets: Arc<FakeAssetHost>,
    server: JoinHandle<()>,
}

impl TestContext {
    /// Start a server with a seeded admin account.
    pub async fn new() -> Self {
        let vars: HashMap<String, String> = [
            ("API_STORE", "memory"),
            ("JWT_SECRET", JWT_SECRET),
            ("JWT_REFRESH_SECRET", JWT_REFRESH_SECRET),
            ("COOKIE_SECURE", "false"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let config = ApiConfig::from_map(&vars).expect("test config is valid");

        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::default());
        let assets = Arc::new(FakeAssetHost::default());

        let state = AppState::with_collaborators(
            config,
            store.clone(),
            Some(gateway.clone() as Arc<dyn PaymentGateway>),
            Some(assets.clone() as Arc<dyn AssetHost>),
        );

        AuthService::new(state.store(), state.tokens())
            .ensure_admin("Admin", ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .expect("admin bootstrap");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let app = routes::app(state);

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            store,
            gateway,
            assets,
            server,
        }
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A fresh client with its own cookie jar.
    pub fn client() -> Client {
        Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client")
    }

    /// Register a customer and return a client signed in as them.
    pub async fn customer(&self, email: &str) -> Client {
        let client = Self::client();
        let resp = client
            .post(self.url("/api/user/register"))
            .json(&json!({
                "name": "Test Customer",
                "email": email,
                "password": "correct-horse-1",
            }))
            .send()
            .await
            .expect("register request");
        assert_eq!(resp.status(), StatusCode::CREATED);
        client
    }

    /// A client signed in through the admin console login.
    pub async fn admin(&self) -> Client {
        let client = Self::client();
        let resp = client
            .post(self.url("/api/user/admin"))
            .json(&json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
            .send()
            .await
            .expect("admin login request");
        assert_eq!(resp.status(), StatusCode::OK);
        client
    }

    /// Insert a product straight into the store.
    pub async fn seed_product(&self, name: &str, price: &str, category: &str) -> Product {
        self.store
            .insert_product(&NewProduct {
                name: name.to_string(),
                description: format!("{name} description"),
                price: Price::parse(price).expect("valid price"),
                category: category.to_string(),
                sub_category: "Topwear".to_string(),
                bestseller: false,
                images: vec![format!("https://assets.test/{name}.jpg")],
                sizes: vec!["S".to_string(), "M".to_string()],
            })
            .await
            .expect("insert product")
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A complete shipping address.
pub fn address() -> Value {
    json!({
        "firstName": "Asha",
        "lastName": "Rao",
        "email": "asha@example.com",
        "phone": "9999999999",
        "street": "12 MG Road",
        "city": "Bengaluru",
        "state": "KA",
        "zipcode": "560001",
        "country": "IN",
    })
}

/// Assert the status and return the JSON body.
pub async fn expect_json(resp: Response, status: StatusCode) -> Value {
    let actual = resp.status();
    let body: Value = resp.json().await.expect("JSON body");
    assert_eq!(actual, status, "unexpected status, body: {body}");
    body
}

/// Assert an error response with the given status and message.
pub async fn expect_error(resp: Response, status: StatusCode, message: &str) {
    let body = expect_json(resp, status).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], message);
}
