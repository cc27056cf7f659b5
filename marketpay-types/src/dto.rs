//! Data Transfer Objects (DTOs) for requests and responses.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Amount, CardNetwork, OrderId, PaymentMode, PaymentStatus, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Order seam DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Payload the order-placement collaborator hands over when an order is
/// created. The payment core only reads it through the repository port.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewOrder {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<UserId>,
    /// Order total in DZD
    #[schema(value_type = String, example = "1200.00")]
    pub total: Amount,
    pub payment_mode: PaymentMode,
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment operation DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to open a redirect payment session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InitiateSessionRequest {
    pub order_id: OrderId,
    pub card_network: CardNetwork,
    /// Where the gateway sends the payer after the hosted form
    #[schema(example = "https://app.example.dz/payment/return")]
    pub return_url: String,
}

/// A freshly opened payment session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub session_id: String,
    pub order_number: String,
    pub payment_url: String,
    #[schema(value_type = String, example = "2024-01-01T00:15:00Z")]
    pub expires_at: DateTime<Utc>,
    #[schema(value_type = String, example = "1200.00")]
    pub amount: Amount,
    pub card_network: CardNetwork,
}

/// Request to charge a card directly, without a redirect.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChargeRequest {
    /// External order number or internal order id
    #[schema(example = "ORD-8F3A21D0C4B2")]
    pub order: String,
    pub card_network: CardNetwork,
    pub card_number: String,
    pub cardholder_name: String,
    #[schema(example = 6)]
    pub expiry_month: u32,
    /// Two-digit year
    #[schema(example = 28)]
    pub expiry_year: u32,
    pub cvv: String,
    /// Optional echo of the order total; must match when present
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "1200.00")]
    pub amount: Option<Amount>,
}

/// A completed direct charge.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChargeResponse {
    pub transaction_id: String,
    pub authorization_code: String,
    pub card_last4: String,
    pub card_network: CardNetwork,
    #[schema(value_type = String, example = "1200.00")]
    pub amount: Amount,
    pub response_code: String,
}

/// Request to route an order to cash-on-delivery collection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CashRequest {
    /// External order number or internal order id
    pub order: String,
}

/// Cash confirmation with collection instructions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CashResponse {
    pub instructions: Vec<String>,
    pub order_id: OrderId,
    pub order_number: String,
    #[schema(value_type = String, example = "1200.00")]
    pub amount: Amount,
}

/// Merged local + remote view of a transaction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub transaction_id: String,
    pub local_status: PaymentStatus,
    /// Remote gateway view; absent when the gateway could not be reached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_status: Option<String>,
    #[schema(value_type = String, example = "1200.00")]
    pub amount: Amount,
    pub payment_mode: PaymentMode,
    #[schema(value_type = String, example = "2024-01-01T00:00:00Z")]
    pub timestamp: DateTime<Utc>,
}

/// Admin request to refund a settled order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefundRequest {
    pub order_id: OrderId,
    /// Defaults to the order's stored total
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "1200.00")]
    pub amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// An accepted refund.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefundResponse {
    pub refund_id: String,
    #[schema(value_type = String, example = "1200.00")]
    pub amount: Amount,
    pub status: String,
    #[schema(example = "5-7 business days")]
    pub estimated_delay: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Webhook DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Callback payload delivered by the gateway.
///
/// The signature is an HMAC over every other present field; see
/// [`GatewayWebhookPayload::signature_fields`] for the exact base.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GatewayWebhookPayload {
    /// Gateway-assigned transaction id (`mdOrder`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Merchant-side order number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[schema(value_type = String, example = "1200.00")]
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Numeric action code, e.g. "00" for approved
    #[schema(example = "00")]
    pub action_code: String,
    pub signature: String,
}

impl GatewayWebhookPayload {
    /// The key/value base the signature is computed over: every field
    /// except `signature`, keys sorted lexicographically, absent fields
    /// omitted. Amounts use their canonical decimal string form.
    pub fn signature_fields(&self) -> BTreeMap<&'static str, String> {
        let mut fields = BTreeMap::new();
        fields.insert("action_code", self.action_code.clone());
        fields.insert("amount", self.amount.to_string());
        if let Some(tx) = &self.transaction_id {
            fields.insert("transaction_id", tx.clone());
        }
        if let Some(number) = &self.order_number {
            fields.insert("order_number", number.clone());
        }
        if let Some(status) = &self.status {
            fields.insert("status", status.clone());
        }
        fields
    }
}

/// Webhook acknowledgment. Always returned with HTTP 200 so the
/// gateway stops retrying; `processed` distinguishes the internal
/// outcome for observability.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog & history DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// One entry of the payment-method catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethodInfo {
    #[schema(example = "cib")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub limits: MethodLimits,
}

/// Per-method amount bounds.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MethodLimits {
    #[schema(value_type = String, example = "100.00")]
    pub min: Amount,
    #[schema(value_type = String, example = "500000.00")]
    pub max: Amount,
}

/// One row of a user's payment history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub order_number: String,
    #[schema(value_type = String, example = "1200.00")]
    pub amount: Amount,
    pub payment_mode: PaymentMode,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[schema(value_type = String, example = "2024-01-01T00:00:00Z")]
    pub created_at: DateTime<Utc>,
}

/// Pagination envelope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

/// Paginated payment history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub items: Vec<OrderSummary>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_fields_sorted_and_complete() {
        let payload = GatewayWebhookPayload {
            transaction_id: Some("txn_1".to_string()),
            order_number: Some("ORD-AA".to_string()),
            amount: "1200.00".parse().unwrap(),
            status: None,
            action_code: "00".to_string(),
            signature: "ignored".to_string(),
        };
        let fields = payload.signature_fields();
        let keys: Vec<_> = fields.keys().copied().collect();
        assert_eq!(
            keys,
            vec!["action_code", "amount", "order_number", "transaction_id"]
        );
        assert_eq!(fields["amount"], "1200.00");
    }
}
