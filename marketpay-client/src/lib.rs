//! # Marketpay Client SDK
//!
//! A typed Rust client for the order payment API.

use marketpay_types::{
    CardNetwork, CashRequest, CashResponse, ChargeRequest, ChargeResponse, HistoryResponse,
    InitiateSessionRequest, OrderId, PaymentMethodInfo, RefundRequest, RefundResponse,
    SessionResponse, StatusResponse,
};
use reqwest::Client;
use serde::de::DeserializeOwned;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message} ({code})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Order payment API client.
pub struct MarketpayClient {
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

impl MarketpayClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            http: Client::new(),
        }
    }

    /// Sets the API key for authentication.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Bootstraps the first API key. Only works on a fresh deployment.
    pub async fn bootstrap(&self, name: &str) -> Result<String, ClientError> {
        let value: serde_json::Value = self
            .post("/api/bootstrap", &serde_json::json!({ "name": name }))
            .await?;
        Ok(value["api_key"].as_str().unwrap_or_default().to_string())
    }

    /// Opens a redirect payment session for an order.
    pub async fn initiate_session(
        &self,
        order_id: OrderId,
        card_network: CardNetwork,
        return_url: &str,
    ) -> Result<SessionResponse, ClientError> {
        let req = InitiateSessionRequest {
            order_id,
            card_network,
            return_url: return_url.to_string(),
        };
        self.post("/api/payments/initiate", &req).await
    }

    /// Charges a card directly against an order.
    pub async fn charge(&self, req: &ChargeRequest) -> Result<ChargeResponse, ClientError> {
        self.post("/api/payments/charge", req).await
    }

    /// Routes an order to cash-on-delivery collection.
    pub async fn confirm_cash(&self, order: &str) -> Result<CashResponse, ClientError> {
        let req = CashRequest {
            order: order.to_string(),
        };
        self.post("/api/payments/cash", &req).await
    }

    /// Fetches the merged local + remote status of a transaction.
    pub async fn status(&self, transaction_id: &str) -> Result<StatusResponse, ClientError> {
        self.get(&format!("/api/payments/status/{}", transaction_id))
            .await
    }

    /// Fetches a page of the caller's payment history.
    pub async fn history(&self, page: u32, limit: u32) -> Result<HistoryResponse, ClientError> {
        self.get(&format!("/api/payments/history?page={page}&limit={limit}"))
            .await
    }

    /// Refunds a settled order (requires an admin key).
    pub async fn refund(&self, req: &RefundRequest) -> Result<RefundResponse, ClientError> {
        self.post("/api/payments/refund", req).await
    }

    /// Lists the configured payment methods.
    pub async fn payment_methods(&self) -> Result<Vec<PaymentMethodInfo>, ClientError> {
        self.get("/api/payments/methods").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let mut req = self.http.get(format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let mut req = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<serde_json::Value>(&body).ok();
            let field = |name: &str| {
                parsed
                    .as_ref()
                    .and_then(|v| v.get(name))
                    .and_then(|e| e.as_str())
                    .map(String::from)
            };
            Err(ClientError::Api {
                status: status.as_u16(),
                code: field("code").unwrap_or_else(|| "UNKNOWN".to_string()),
                message: field("error").unwrap_or(body),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = MarketpayClient::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_trailing_slash() {
        let client = MarketpayClient::new("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_api_key() {
        let client = MarketpayClient::new("http://localhost:3000").with_api_key("test-key");
        assert_eq!(client.api_key, Some("test-key".to_string()));
    }
}
