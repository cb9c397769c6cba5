//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::db::Store;
use crate::services::assets::{AssetError, AssetHost, CloudinaryClient};
use crate::services::auth::TokenService;
use crate::services::payments::{GatewayError, PaymentGateway, RazorpayClient};

/// Error building the external service clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway client: {0}")]
    Gateway(#[from] GatewayError),
    #[error("asset host client: {0}")]
    Assets(#[from] AssetError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the store, token keys, configuration, and external collaborators.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    store: Arc<dyn Store>,
    tokens: TokenService,
    gateway: Option<Arc<dyn PaymentGateway>>,
    assets: Option<Arc<dyn AssetHost>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Razorpay and Cloudinary clients are built when their credentials are
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: ApiConfig, store: Arc<dyn Store>) -> Result<Self, StateError> {
        let gateway = config
            .razorpay
            .as_ref()
            .map(RazorpayClient::new)
            .transpose()?
            .map(|client| Arc::new(client) as Arc<dyn PaymentGateway>);

        let assets = config
            .cloudinary
            .as_ref()
            .map(CloudinaryClient::new)
            .transpose()?
            .map(|client| Arc::new(client) as Arc<dyn AssetHost>);

        Ok(Self::with_collaborators(config, store, gateway, assets))
    }

    /// Create state with explicit collaborators.
    #[must_use]
    pub fn with_collaborators(
        config: ApiConfig,
        store: Arc<dyn Store>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        assets: Option<Arc<dyn AssetHost>>,
    ) -> Self {
        let tokens = TokenService::new(&config.auth);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
                gateway,
                assets,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the token service.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Payment gateway, if configured.
    #[must_use]
    pub fn gateway(&self) -> Option<&dyn PaymentGateway> {
        self.inner.gateway.as_deref()
    }

    /// Asset host, if configured.
    #[must_use]
    pub fn assets(&self) -> Option<&dyn AssetHost> {
        self.inner.assets.as_deref()
    }
}
