//! Simulated gateway mode.
//!
//! No network calls. Card numbers ending in the fixed suffixes force a
//! deterministic outcome regardless of the seed; everything else draws
//! from the seeded distribution so tests can pin every branch.

use std::sync::Mutex;

use chrono::{Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use marketpay_types::domain::card::normalize_card_number;
use marketpay_types::domain::{CardDetails, CardNetwork};
use marketpay_types::ports::gateway::{
    ChargeApproval, GatewayError, RefundApproval, RemoteStatus, SessionInit,
};

use crate::codes::action_code_outcome;

use crate::config::SimSuccessRates;

/// Card suffix that always declines with the bank-decline code.
pub const DECLINE_SUFFIX: &str = "0000";
/// Card suffix that always approves.
pub const APPROVE_SUFFIX: &str = "1111";

const SESSION_TTL_MINUTES: i64 = 15;

// Realistic decline reasons for the residual failure draw.
const FAILURE_POOL: &[&str] = &["05", "51", "54", "61"];

pub struct SimulatedGateway {
    delay_ms: (u64, u64),
    rates: SimSuccessRates,
    rng: Mutex<StdRng>,
}

impl SimulatedGateway {
    pub fn new(delay_ms: (u64, u64), rates: SimSuccessRates, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            delay_ms,
            rates,
            rng: Mutex::new(rng),
        }
    }

    /// Bounded artificial latency to model the real acquirer.
    async fn latency(&self) {
        let (min, max) = self.delay_ms;
        if max == 0 {
            return;
        }
        let ms = {
            let mut rng = self.rng.lock().expect("rng lock");
            rng.random_range(min..=max)
        };
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }

    fn draw_success(&self, rate: f64) -> bool {
        let mut rng = self.rng.lock().expect("rng lock");
        rng.random_bool(rate)
    }

    fn draw_failure_code(&self) -> &'static str {
        let mut rng = self.rng.lock().expect("rng lock");
        FAILURE_POOL[rng.random_range(0..FAILURE_POOL.len())]
    }

    fn draw_auth_code(&self) -> String {
        let mut rng = self.rng.lock().expect("rng lock");
        format!("{:06}", rng.random_range(0..1_000_000u32))
    }

    fn new_transaction_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    fn declined(code: &str, transaction_id: Option<String>) -> GatewayError {
        GatewayError::Declined {
            code: code.to_string(),
            message: action_code_outcome(code).message.to_string(),
            transaction_id,
        }
    }

    pub async fn init_session(
        &self,
        order_number: &str,
        _network: CardNetwork,
        _return_url: &str,
    ) -> Result<SessionInit, GatewayError> {
        self.latency().await;
        if !self.draw_success(self.rates.session) {
            let code = self.draw_failure_code();
            tracing::debug!(order_number, code, "simulated session init declined");
            return Err(Self::declined(code, None));
        }
        let session_id = Self::new_transaction_id();
        Ok(SessionInit {
            payment_url: format!(
                "https://simulated.satim.local/payform?mdOrder={session_id}"
            ),
            expires_at: Utc::now() + ChronoDuration::minutes(SESSION_TTL_MINUTES),
            session_id,
        })
    }

    pub async fn confirm_direct(
        &self,
        order_number: &str,
        card: &CardDetails,
    ) -> Result<ChargeApproval, GatewayError> {
        self.latency().await;

        let digits = normalize_card_number(&card.number);
        let transaction_id = Self::new_transaction_id();

        if digits.ends_with(DECLINE_SUFFIX) {
            tracing::debug!(order_number, "simulated charge hit the decline suffix");
            return Err(Self::declined("05", Some(transaction_id)));
        }

        let approved = digits.ends_with(APPROVE_SUFFIX) || self.draw_success(self.rates.charge);
        if !approved {
            let code = self.draw_failure_code();
            tracing::debug!(order_number, code, "simulated charge declined");
            return Err(Self::declined(code, Some(transaction_id)));
        }

        Ok(ChargeApproval {
            transaction_id,
            authorization_code: self.draw_auth_code(),
            response_code: "00".to_string(),
        })
    }

    pub async fn query_status(&self, transaction_id: &str) -> Result<RemoteStatus, GatewayError> {
        self.latency().await;
        tracing::debug!(transaction_id, "simulated status query");
        Ok(RemoteStatus {
            status: "DEPOSITED".to_string(),
            action_code: Some("00".to_string()),
        })
    }

    pub async fn refund(&self, transaction_id: &str) -> Result<RefundApproval, GatewayError> {
        self.latency().await;
        if !self.draw_success(self.rates.refund) {
            let code = self.draw_failure_code();
            tracing::debug!(transaction_id, code, "simulated refund declined");
            return Err(Self::declined(code, Some(transaction_id.to_string())));
        }
        Ok(RefundApproval {
            refund_id: format!("rf_{}", Uuid::new_v4().simple()),
            status: "PROCESSED".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketpay_types::domain::card::current_two_digit_year;

    fn gateway(seed: u64) -> SimulatedGateway {
        SimulatedGateway::new((0, 0), SimSuccessRates::always(), Some(seed))
    }

    fn declining_gateway(seed: u64) -> SimulatedGateway {
        SimulatedGateway::new((0, 0), SimSuccessRates::never(), Some(seed))
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
    async fn test_decline_suffix_always_declines() {
        // Sweep seeds: the suffix hook must win over the distribution.
        for seed in 0..20 {
            let result = gateway(seed).confirm_direct("ORD-1", &card(DECLINE_SUFFIX)).await;
            match result {
                Err(GatewayError::Declined {
                    code,
                    transaction_id,
                    ..
                }) => {
                    assert_eq!(code, "05");
                    assert!(transaction_id.is_some());
                }
                other => panic!("expected decline, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_approve_suffix_always_approves() {
        for seed in 0..20 {
            let approval = gateway(seed)
                .confirm_direct("ORD-1", &card(APPROVE_SUFFIX))
                .await
                .expect("approve suffix must succeed");
            assert_eq!(approval.response_code, "00");
            assert_eq!(approval.authorization_code.len(), 6);
        }
    }

    #[tokio::test]
    async fn test_approve_suffix_wins_over_failing_rates() {
        let approval = declining_gateway(1)
            .confirm_direct("ORD-1", &card(APPROVE_SUFFIX))
            .await
            .expect("suffix hook must override the distribution");
        assert_eq!(approval.response_code, "00");
    }

    #[tokio::test]
    async fn test_residual_failures_draw_from_the_fixed_pool() {
        let result = declining_gateway(9).confirm_direct("ORD-1", &card("2222")).await;
        match result {
            Err(GatewayError::Declined { code, message, .. }) => {
                assert!(FAILURE_POOL.contains(&code.as_str()));
                assert!(!message.is_empty());
            }
            other => panic!("expected decline, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_seeded_outcomes_are_reproducible() {
        let rates = SimSuccessRates {
            session: 0.5,
            charge: 0.5,
            refund: 0.5,
        };
        let first = SimulatedGateway::new((0, 0), rates, Some(7))
            .confirm_direct("ORD-1", &card("2222"))
            .await;
        let second = SimulatedGateway::new((0, 0), rates, Some(7))
            .confirm_direct("ORD-1", &card("2222"))
            .await;
        assert_eq!(first.is_ok(), second.is_ok());
    }

    #[tokio::test]
    async fn test_session_init_returns_url_and_expiry() {
        let session = gateway(1)
            .init_session("ORD-1", CardNetwork::Cib, "https://app/return")
            .await
            .unwrap();
        assert!(session.payment_url.contains(&session.session_id));
        assert!(session.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_refund_returns_refund_id() {
        let refund = gateway(1).refund("txn_1").await.unwrap();
        assert!(refund.refund_id.starts_with("rf_"));
        assert_eq!(refund.status, "PROCESSED");
    }
}
