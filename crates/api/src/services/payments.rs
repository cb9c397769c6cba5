//! Payment gateway client.
//!
//! Checkout with online payment creates an order on the gateway, the client
//! pays against it, and the server later fetches the gateway order to see
//! whether it was paid. Only the two order endpoints are used.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RazorpayConfig;

/// Razorpay API base URL.
const BASE_URL: &str = "https://api.razorpay.com/v1";

/// Gateway order status once the payment has been captured.
pub const STATUS_PAID: &str = "paid";

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Request to open a gateway order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayOrderRequest {
    /// Amount in minor units (paise for INR).
    pub amount: i64,
    pub currency: String,
    /// Our order id, echoed back for reconciliation.
    pub receipt: String,
}

/// An order as the gateway reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    /// `created`, `attempted`, or `paid`.
    pub status: String,
}

impl GatewayOrder {
    /// Whether the gateway has captured payment for this order.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == STATUS_PAID
    }
}

/// An online payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open an order the client can pay against.
    async fn create_order(&self, request: &GatewayOrderRequest)
    -> Result<GatewayOrder, GatewayError>;

    /// Fetch an order's current state.
    async fn fetch_order(&self, gateway_order_id: &str) -> Result<GatewayOrder, GatewayError>;
}

/// Razorpay Orders API client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: SecretString,
}

impl RazorpayClient {
    /// Create a new Razorpay client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &RazorpayConfig) -> Result<Self, GatewayError> {
        Self::with_base_url(config, BASE_URL)
    }

    /// Create a client against a different API root.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_base_url(config: &RazorpayConfig, base_url: &str) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    async fn parse_response(response: reqwest::Response) -> Result<GatewayOrder, GatewayError> {
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[tracing::instrument(skip(self), fields(receipt = %request.receipt))]
    async fn create_order(
        &self,
        request: &GatewayOrderRequest,
    ) -> Result<GatewayOrder, GatewayError> {
        let url = format!("{}/orders", self.base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(request)
            .send()
            .await?;

        let order = Self::parse_response(response).await?;
        tracing::info!(gateway_order_id = %order.id, "Gateway order created");
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_order(&self, gateway_order_id: &str) -> Result<GatewayOrder, GatewayError> {
        if gateway_order_id.is_empty()
            || !gateway_order_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(GatewayError::Api {
                status: 400,
                message: "malformed gateway order id".to_string(),
            });
        }

        let url = format!("{}/orders/{gateway_order_id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .send()
            .await?;

        Self::parse_response(response).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gateway_order() {
        let body = r#"{
            "id": "order_IluGWxBm9U8zJ8",
            "entity": "order",
            "amount": 20000,
            "amount_paid": 20000,
            "amount_due": 0,
            "currency": "INR",
            "receipt": "5f1c3c1e-9b8e-4a53-8f0e-3f3c1d3b2a10",
            "status": "paid",
            "attempts": 1,
            "created_at": 1642662092
        }"#;

        let order: GatewayOrder = serde_json::from_str(body).unwrap();
        assert_eq!(order.amount, 20000);
        assert!(order.is_paid());
        assert_eq!(
            order.receipt.as_deref(),
            Some("5f1c3c1e-9b8e-4a53-8f0e-3f3c1d3b2a10")
        );
    }

    #[test]
    fn test_unpaid_statuses() {
        for status in ["created", "attempted"] {
            let order = GatewayOrder {
                id: "order_1".to_string(),
                amount: 100,
                currency: "INR".to_string(),
                receipt: None,
                status: status.to_string(),
            };
            assert!(!order.is_paid());
        }
    }

    #[test]
    fn test_request_body() {
        let request = GatewayOrderRequest {
            amount: 19_950,
            currency: "INR".to_string(),
            receipt: "r1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"amount": 19950, "currency": "INR", "receipt": "r1"})
        );
    }

    #[tokio::test]
    async fn test_malformed_id_rejected_without_request() {
        let client = RazorpayClient::with_base_url(
            &RazorpayConfig {
                key_id: "rzp_test_key".to_string(),
                key_secret: SecretString::from("not-used"),
            },
            "http://127.0.0.1:9",
        )
        .unwrap();

        assert!(matches!(
            client.fetch_order("../users").await,
            Err(GatewayError::Api { status: 400, .. })
        ));
    }
}
