//! Structured payment detail attached to an order.
//!
//! Each operation records its outcome in its own sub-record; updates
//! replace only the relevant sub-record and leave the others untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::Amount;
use super::card::CardNetwork;

/// Outcome of a successful card charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRecord {
    pub card_last4: String,
    pub card_network: CardNetwork,
    pub authorization_code: String,
    pub response_code: String,
    pub completed_at: DateTime<Utc>,
}

/// Outcome of a failed charge or session attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub error: String,
    pub code: String,
    /// Transaction id, when the gateway assigned one before declining
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub failed_at: DateTime<Utc>,
}

/// Refund metadata, nested under the detail after a successful refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub refund_id: String,
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub status: String,
    pub estimated_delay: String,
    pub requested_at: DateTime<Utc>,
}

/// Receipt of a gateway webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookReceipt {
    pub received: bool,
    pub action_code: String,
    pub received_at: DateTime<Utc>,
}

/// The full detail blob persisted on the order.
///
/// Always written as a whole after merging in-memory, so a sub-record
/// set by an earlier operation survives later ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge: Option<ChargeRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<RefundRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookReceipt>,
}

impl PaymentDetail {
    pub fn with_charge(mut self, charge: ChargeRecord) -> Self {
        self.charge = Some(charge);
        self
    }

    pub fn with_failure(mut self, failure: FailureRecord) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn with_refund(mut self, refund: RefundRecord) -> Self {
        self.refund = Some(refund);
        self
    }

    pub fn with_webhook(mut self, receipt: WebhookReceipt) -> Self {
        self.webhook = Some(receipt);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.charge.is_none()
            && self.failure.is_none()
            && self.refund.is_none()
            && self.webhook.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charge() -> ChargeRecord {
        ChargeRecord {
            card_last4: "1111".to_string(),
            card_network: CardNetwork::Cib,
            authorization_code: "A1B2C3".to_string(),
            response_code: "00".to_string(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_merge_preserves_existing_sub_records() {
        let detail = PaymentDetail::default().with_charge(charge());

        let merged = detail.clone().with_refund(RefundRecord {
            refund_id: "ref_1".to_string(),
            amount: Amount::from_dinars(1200).unwrap(),
            reason: Some("customer request".to_string()),
            status: "PROCESSED".to_string(),
            estimated_delay: "5-7 business days".to_string(),
            requested_at: Utc::now(),
        });

        assert_eq!(merged.charge, detail.charge);
        assert!(merged.refund.is_some());
        assert!(merged.failure.is_none());
    }

    #[test]
    fn test_serde_skips_absent_sub_records() {
        let detail = PaymentDetail::default().with_charge(charge());
        let json = serde_json::to_value(&detail).unwrap();
        assert!(json.get("charge").is_some());
        assert!(json.get("refund").is_none());
        assert!(json.get("failure").is_none());
    }

    #[test]
    fn test_default_is_empty() {
        assert!(PaymentDetail::default().is_empty());
        assert!(!PaymentDetail::default().with_charge(charge()).is_empty());
    }
}
