//! Card gateway port.
//!
//! The adapter owns everything network-facing: request signing, the
//! action-code translation table, minor-unit conversion, and the
//! simulated/sandbox/production mode split. The orchestrator only ever
//! sees this trait and its normalized results, so it never branches on
//! mode.

use chrono::{DateTime, Utc};

use crate::domain::{Amount, CardDetails, CardNetwork, PaymentLimits};
use crate::dto::GatewayWebhookPayload;

/// A payment session obtained from the gateway for redirect flows.
#[derive(Debug, Clone)]
pub struct SessionInit {
    pub session_id: String,
    pub payment_url: String,
    pub expires_at: DateTime<Utc>,
}

/// An approved direct charge.
#[derive(Debug, Clone)]
pub struct ChargeApproval {
    pub transaction_id: String,
    pub authorization_code: String,
    pub response_code: String,
}

/// Remote view of a transaction, advisory only.
#[derive(Debug, Clone)]
pub struct RemoteStatus {
    pub status: String,
    pub action_code: Option<String>,
}

/// An accepted refund request.
#[derive(Debug, Clone)]
pub struct RefundApproval {
    pub refund_id: String,
    pub status: String,
}

/// A verified, decoded webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    pub approved: bool,
    pub action_code: String,
    pub message: String,
}

/// Normalized gateway failures.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Declined: {message} (code {code})")]
    Declined {
        code: String,
        message: String,
        transaction_id: Option<String>,
    },

    #[error("Amount below the configured minimum of {min} DZD")]
    BelowMinimum { min: Amount },

    #[error("Amount above the configured maximum of {max} DZD")]
    AboveMaximum { max: Amount },

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

/// The gateway adapter port.
#[async_trait::async_trait]
pub trait CardGateway: Send + Sync + 'static {
    /// The configured per-transaction bounds.
    fn limits(&self) -> PaymentLimits;

    /// Local amount-range check. Violations never reach the network.
    fn check_amount(&self, amount: Amount) -> Result<(), GatewayError> {
        let limits = self.limits();
        if amount < limits.min {
            return Err(GatewayError::BelowMinimum { min: limits.min });
        }
        if amount > limits.max {
            return Err(GatewayError::AboveMaximum { max: limits.max });
        }
        Ok(())
    }

    /// Registers a payment session for a redirect flow.
    async fn init_session(
        &self,
        order_number: &str,
        amount: Amount,
        network: CardNetwork,
        return_url: &str,
    ) -> Result<SessionInit, GatewayError>;

    /// Charges a card directly, without a redirect.
    async fn confirm_direct(
        &self,
        order_number: &str,
        card: &CardDetails,
        amount: Amount,
    ) -> Result<ChargeApproval, GatewayError>;

    /// Queries the remote status of an earlier transaction.
    async fn query_status(&self, transaction_id: &str) -> Result<RemoteStatus, GatewayError>;

    /// Requests a (possibly partial) refund of a settled transaction.
    async fn refund(
        &self,
        transaction_id: &str,
        amount: Amount,
    ) -> Result<RefundApproval, GatewayError>;

    /// Verifies a webhook's signature and decodes its action code.
    /// `InvalidSignature` when authenticity cannot be established.
    fn decode_webhook(
        &self,
        payload: &GatewayWebhookPayload,
    ) -> Result<WebhookOutcome, GatewayError>;
}
