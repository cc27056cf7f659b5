//! # Marketpay Gateway
//!
//! Card gateway adapter for the national acquirer (CIB / EDAHABIA).
//! One type, three operating modes behind an identical contract:
//!
//! - **Simulated** - no network, deterministic card-suffix hooks, seeded
//!   outcome distribution. Used whenever no credentials are configured.
//! - **Sandbox / Production** - signed HTTP calls against the acquirer
//!   REST surface.
//!
//! Amount limits are enforced here, before any network attempt, and all
//! amounts cross the wire as integer centimes.

pub mod codes;
pub mod config;
pub mod signature;

mod remote;
mod simulated;

use marketpay_types::domain::{Amount, CardDetails, CardNetwork, PaymentLimits};
use marketpay_types::dto::GatewayWebhookPayload;
use marketpay_types::ports::gateway::{
    CardGateway, ChargeApproval, GatewayError, RefundApproval, RemoteStatus, SessionInit,
    WebhookOutcome,
};

pub use config::{GatewayConfig, GatewayMode, SimSuccessRates};
pub use simulated::{APPROVE_SUFFIX, DECLINE_SUFFIX};

use remote::RemoteGateway;
use simulated::SimulatedGateway;

enum Inner {
    Simulated(SimulatedGateway),
    Remote(RemoteGateway),
}

/// The gateway adapter. Construct once from config and share.
pub struct SatimGateway {
    limits: PaymentLimits,
    secret_key: String,
    inner: Inner,
}

impl SatimGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let secret_key = config.secret_key.clone();
        let inner = match config.mode {
            GatewayMode::Simulated => Inner::Simulated(SimulatedGateway::new(
                config.sim_delay_ms,
                config.sim_success_rates,
                config.sim_seed,
            )),
            GatewayMode::Sandbox | GatewayMode::Production => Inner::Remote(RemoteGateway::new(
                config.base_url,
                config.merchant_id,
                config.terminal_id,
                config.secret_key,
                config.timeout,
            )),
        };
        Self {
            limits: config.limits,
            secret_key,
            inner,
        }
    }
}

#[async_trait::async_trait]
impl CardGateway for SatimGateway {
    fn limits(&self) -> PaymentLimits {
        self.limits
    }

    async fn init_session(
        &self,
        order_number: &str,
        amount: Amount,
        network: CardNetwork,
        return_url: &str,
    ) -> Result<SessionInit, GatewayError> {
        self.check_amount(amount)?;
        match &self.inner {
            Inner::Simulated(gateway) => {
                gateway.init_session(order_number, network, return_url).await
            }
            Inner::Remote(gateway) => {
                gateway
                    .init_session(order_number, amount, network, return_url)
                    .await
            }
        }
    }

    async fn confirm_direct(
        &self,
        order_number: &str,
        card: &CardDetails,
        amount: Amount,
    ) -> Result<ChargeApproval, GatewayError> {
        self.check_amount(amount)?;
        match &self.inner {
            Inner::Simulated(gateway) => gateway.confirm_direct(order_number, card).await,
            Inner::Remote(gateway) => gateway.confirm_direct(order_number, card, amount).await,
        }
    }

    async fn query_status(&self, transaction_id: &str) -> Result<RemoteStatus, GatewayError> {
        match &self.inner {
            Inner::Simulated(gateway) => gateway.query_status(transaction_id).await,
            Inner::Remote(gateway) => gateway.query_status(transaction_id).await,
        }
    }

    async fn refund(
        &self,
        transaction_id: &str,
        amount: Amount,
    ) -> Result<RefundApproval, GatewayError> {
        self.check_amount(amount)?;
        match &self.inner {
            Inner::Simulated(gateway) => gateway.refund(transaction_id).await,
            Inner::Remote(gateway) => gateway.refund(transaction_id, amount).await,
        }
    }

    fn decode_webhook(
        &self,
        payload: &GatewayWebhookPayload,
    ) -> Result<WebhookOutcome, GatewayError> {
        let fields = payload.signature_fields();
        if !signature::verify_fields(&fields, &payload.signature, &self.secret_key) {
            return Err(GatewayError::InvalidSignature);
        }
        let outcome = codes::action_code_outcome(&payload.action_code);
        Ok(WebhookOutcome {
            approved: outcome.approved,
            action_code: payload.action_code.clone(),
            message: outcome.message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketpay_types::domain::card::current_two_digit_year;

    fn simulated() -> SatimGateway {
        SatimGateway::new(GatewayConfig::simulated_for_tests(42))
    }

    fn card(suffix: &str) -> CardDetails {
        CardDetails {
            network: CardNetwork::Cib,
            number: format!("622222222222222{suffix}"),
            holder_name: "TEST HOLDER".to_string(),
            expiry_month: 6,
            expiry_year: current_two_digit_year() + 2,
            cvv: "123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_below_minimum_fails_without_network() {
        let gateway = simulated();
        let amount = Amount::from_dinars(50).unwrap();
        let result = gateway
            .init_session("ORD-1", amount, CardNetwork::Cib, "https://app/return")
            .await;
        assert!(matches!(result, Err(GatewayError::BelowMinimum { .. })));
    }

    #[tokio::test]
    async fn test_above_maximum_fails_without_network() {
        let gateway = simulated();
        let amount = Amount::from_dinars(1_000_000).unwrap();
        let result = gateway
            .confirm_direct("ORD-1", &card(APPROVE_SUFFIX), amount)
            .await;
        assert!(matches!(result, Err(GatewayError::AboveMaximum { .. })));
    }

    #[tokio::test]
    async fn test_in_range_charge_approves_with_suffix() {
        let gateway = simulated();
        let amount = Amount::from_dinars(1200).unwrap();
        let approval = gateway
            .confirm_direct("ORD-1", &card(APPROVE_SUFFIX), amount)
            .await
            .unwrap();
        assert_eq!(approval.response_code, "00");
    }

    fn webhook_payload(secret: &str) -> GatewayWebhookPayload {
        let mut payload = GatewayWebhookPayload {
            transaction_id: Some("txn_1".to_string()),
            order_number: Some("ORD-AA11BB22CC33".to_string()),
            amount: "1200.00".parse().unwrap(),
            status: None,
            action_code: "00".to_string(),
            signature: String::new(),
        };
        payload.signature = signature::sign_fields(&payload.signature_fields(), secret);
        payload
    }

    #[test]
    fn test_decode_webhook_verifies_and_maps_code() {
        let gateway = simulated();
        let payload = webhook_payload("simulated_secret");

        let outcome = gateway.decode_webhook(&payload).unwrap();
        assert!(outcome.approved);
        assert_eq!(outcome.action_code, "00");
    }

    #[test]
    fn test_decode_webhook_rejects_bad_signature() {
        let gateway = simulated();
        let mut payload = webhook_payload("simulated_secret");
        payload.amount = "9999.00".parse().unwrap();

        let result = gateway.decode_webhook(&payload);
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));
    }
}
