//! Payment Orchestrator
//!
//! Drives the order payment state machine through the repository and
//! gateway ports. Contains NO infrastructure logic - pure business
//! orchestration.
//!
//! State machine: pending → processing → {success | failed};
//! success → refunded; a failed order may retry into processing. The
//! pending/failed → processing edge is a compare-and-set in the
//! repository, which is what serializes racing attempts on one order.

use chrono::Utc;

use marketpay_types::{
    Amount, CardDetails, CardGateway, CashResponse, ChargeRecord, ChargeRequest, ChargeResponse,
    FailureRecord, GatewayWebhookPayload, HistoryResponse, InitiateSessionRequest, MethodLimits,
    Order, OrderRepository, OrderSummary, Pagination, PaymentError, PaymentMethodInfo,
    PaymentStatus, RefundRecord, RefundRequest, RefundResponse, SessionResponse, StatusResponse,
    UserId, WebhookAck, WebhookReceipt,
};

/// How long a card refund takes to land back on the payer's account.
const REFUND_DELAY: &str = "5-7 business days";

const CASH_INSTRUCTIONS: &[&str] = &[
    "Payment is collected in cash when the courier delivers the order.",
    "Keep the exact amount ready; couriers carry limited change.",
    "The order is confirmed once the courier registers the collection.",
];

/// Application service for payment operations.
///
/// Generic over the repository and gateway ports - adapters are injected
/// at compile time, which keeps every operation testable with an
/// in-memory repository and the simulated gateway.
pub struct PaymentService<R: OrderRepository, G: CardGateway> {
    repo: R,
    gateway: G,
}

impl<R: OrderRepository, G: CardGateway> PaymentService<R, G> {
    /// Creates a new payment service over the given adapters.
    pub fn new(repo: R, gateway: G) -> Self {
        Self { repo, gateway }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Returns a reference to the underlying gateway adapter.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Guards
    // ─────────────────────────────────────────────────────────────────────────────

    /// Loads an order through the user-scoped resolver (order number
    /// first, internal id as fallback). "Not yours" and "does not
    /// exist" are indistinguishable on purpose.
    async fn resolve_order(
        &self,
        user_id: UserId,
        identifier: &str,
    ) -> Result<Order, PaymentError> {
        self.repo
            .find_for_user(user_id, identifier)
            .await?
            .ok_or(PaymentError::OrderNotFound)
    }

    /// Common pre-charge guards plus the compare-and-set into
    /// PROCESSING. Amount limits are checked before any state change so
    /// local validation failures leave the order untouched.
    async fn guard_and_begin(&self, order: &Order) -> Result<(), PaymentError> {
        if order.payment_status == PaymentStatus::Success {
            return Err(PaymentError::AlreadyPaid);
        }
        self.gateway.check_amount(order.total)?;

        if !self.repo.begin_processing(order.id).await? {
            // Lost the race or the stored status moved on; re-read to
            // report the accurate reason.
            let current = self
                .repo
                .get_order(order.id)
                .await?
                .ok_or(PaymentError::OrderNotFound)?;
            return Err(match current.payment_status {
                PaymentStatus::Success => PaymentError::AlreadyPaid,
                _ => PaymentError::PaymentInProgress,
            });
        }
        Ok(())
    }

    fn failure_record(err: &PaymentError) -> FailureRecord {
        let (code, transaction_id) = match err {
            PaymentError::Declined {
                code,
                transaction_id,
                ..
            } => (code.clone(), transaction_id.clone()),
            other => (other.code().to_string(), None),
        };
        FailureRecord {
            error: err.to_string(),
            code,
            transaction_id,
            failed_at: Utc::now(),
        }
    }

    /// Records a failed attempt. Best-effort by design: the original
    /// error is what the caller must see.
    async fn record_failure(&self, order: &Order, err: &PaymentError) {
        let detail = order
            .payment_detail
            .clone()
            .with_failure(Self::failure_record(err));
        if let Err(repo_err) = self
            .repo
            .record_outcome(order.id, PaymentStatus::Failed, None, &detail)
            .await
        {
            tracing::error!(order_id = %order.id, error = %repo_err, "failed to record payment failure");
        }
    }

    async fn notify_payment_success(&self, order: &Order, transaction_id: &str) {
        let payload = serde_json::json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "amount": order.total,
            "transaction_id": transaction_id,
        });
        if let Err(e) = self
            .repo
            .enqueue_notification(order.user_id, "payment.success", payload.clone())
            .await
        {
            tracing::error!(order_id = %order.id, error = %e, "failed to enqueue payer notification");
        }
        if let Some(provider_id) = order.provider_id {
            if let Err(e) = self
                .repo
                .enqueue_notification(provider_id, "order.paid", payload)
                .await
            {
                tracing::error!(order_id = %order.id, error = %e, "failed to enqueue provider notification");
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Opens a redirect payment session for an order the caller owns.
    pub async fn initiate_session(
        &self,
        user_id: UserId,
        req: InitiateSessionRequest,
    ) -> Result<SessionResponse, PaymentError> {
        let order = self.resolve_order(user_id, &req.order_id.to_string()).await?;

        let network = order.payment_mode.card_network().ok_or(PaymentError::InvalidMode)?;
        if req.card_network != network {
            return Err(PaymentError::Validation(format!(
                "order is payable with {network}, not {}",
                req.card_network
            )));
        }

        self.guard_and_begin(&order).await?;

        match self
            .gateway
            .init_session(&order.order_number, order.total, network, &req.return_url)
            .await
        {
            Ok(session) => {
                self.repo
                    .store_transaction_id(order.id, &session.session_id)
                    .await?;
                Ok(SessionResponse {
                    session_id: session.session_id,
                    order_number: order.order_number,
                    payment_url: session.payment_url,
                    expires_at: session.expires_at,
                    amount: order.total,
                    card_network: network,
                })
            }
            Err(err) => {
                let err: PaymentError = err.into();
                self.record_failure(&order, &err).await;
                Err(err)
            }
        }
    }

    /// Charges a card directly against an order the caller owns.
    ///
    /// The order is marked PROCESSING before the gateway call, so a
    /// crash mid-call leaves a recoverable, non-final state.
    pub async fn charge_direct(
        &self,
        user_id: UserId,
        req: ChargeRequest,
    ) -> Result<ChargeResponse, PaymentError> {
        let order = self.resolve_order(user_id, &req.order).await?;

        if order.payment_status == PaymentStatus::Success {
            return Err(PaymentError::AlreadyPaid);
        }
        let network = order.payment_mode.card_network().ok_or(PaymentError::InvalidMode)?;
        if req.card_network != network {
            return Err(PaymentError::Validation(format!(
                "order is payable with {network}, not {}",
                req.card_network
            )));
        }

        let card = CardDetails {
            network,
            number: req.card_number,
            holder_name: req.cardholder_name,
            expiry_month: req.expiry_month,
            expiry_year: req.expiry_year,
            cvv: req.cvv,
        };
        card.validate()
            .map_err(|e| PaymentError::Validation(e.to_string()))?;

        if let Some(amount) = req.amount {
            if amount != order.total {
                return Err(PaymentError::Validation(format!(
                    "amount {amount} does not match the order total {}",
                    order.total
                )));
            }
        }

        self.guard_and_begin(&order).await?;

        match self
            .gateway
            .confirm_direct(&order.order_number, &card, order.total)
            .await
        {
            Ok(approval) => {
                let detail = order.payment_detail.clone().with_charge(ChargeRecord {
                    card_last4: card.last4(),
                    card_network: network,
                    authorization_code: approval.authorization_code.clone(),
                    response_code: approval.response_code.clone(),
                    completed_at: Utc::now(),
                });
                self.repo
                    .record_outcome(
                        order.id,
                        PaymentStatus::Success,
                        Some(&approval.transaction_id),
                        &detail,
                    )
                    .await?;
                self.notify_payment_success(&order, &approval.transaction_id)
                    .await;

                Ok(ChargeResponse {
                    transaction_id: approval.transaction_id,
                    authorization_code: approval.authorization_code,
                    card_last4: card.last4(),
                    card_network: network,
                    amount: order.total,
                    response_code: approval.response_code,
                })
            }
            Err(err) => {
                let err: PaymentError = err.into();
                self.record_failure(&order, &err).await;
                Err(err)
            }
        }
    }

    /// Routes an order to cash-on-delivery collection. No gateway
    /// interaction and no pass through PROCESSING.
    pub async fn confirm_cash(
        &self,
        user_id: UserId,
        identifier: &str,
    ) -> Result<CashResponse, PaymentError> {
        let order = self.resolve_order(user_id, identifier).await?;

        if order.payment_status == PaymentStatus::Success {
            return Err(PaymentError::AlreadyPaid);
        }
        if order.payment_status == PaymentStatus::Refunded {
            return Err(PaymentError::Validation(
                "a refunded order cannot be reopened for cash collection".to_string(),
            ));
        }

        self.repo.confirm_cash(order.id).await?;

        Ok(CashResponse {
            instructions: CASH_INSTRUCTIONS.iter().map(|s| s.to_string()).collect(),
            order_id: order.id,
            order_number: order.order_number,
            amount: order.total,
        })
    }

    /// Merged local + remote view of one of the caller's transactions.
    /// The remote view is advisory; local state is never mutated here.
    pub async fn check_status(
        &self,
        user_id: UserId,
        transaction_id: &str,
    ) -> Result<StatusResponse, PaymentError> {
        let order = self
            .repo
            .find_by_transaction_for_user(user_id, transaction_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        let remote_status = match self.gateway.query_status(transaction_id).await {
            Ok(remote) => Some(remote.status),
            Err(e) => {
                tracing::warn!(transaction_id, error = %e, "remote status query failed");
                None
            }
        };

        Ok(StatusResponse {
            transaction_id: transaction_id.to_string(),
            local_status: order.payment_status,
            remote_status,
            amount: order.total,
            payment_mode: order.payment_mode,
            timestamp: Utc::now(),
        })
    }

    /// Refunds a settled card payment. Authorization (admin-only) is
    /// enforced by the HTTP layer.
    pub async fn refund(&self, req: RefundRequest) -> Result<RefundResponse, PaymentError> {
        let order = self
            .repo
            .get_order(req.order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        let transaction_id = match (&order.transaction_id, order.payment_status, order.payment_mode.card_network()) {
            (Some(tx), PaymentStatus::Success, Some(_)) => tx.clone(),
            _ => return Err(PaymentError::NotRefundable),
        };

        let amount = req.amount.unwrap_or(order.total);
        if amount.is_zero() || amount > order.total {
            return Err(PaymentError::Validation(format!(
                "refund amount {amount} must be positive and at most the order total {}",
                order.total
            )));
        }

        let approval = self.gateway.refund(&transaction_id, amount).await?;

        let detail = order.payment_detail.clone().with_refund(RefundRecord {
            refund_id: approval.refund_id.clone(),
            amount,
            reason: req.reason,
            status: approval.status.clone(),
            estimated_delay: REFUND_DELAY.to_string(),
            requested_at: Utc::now(),
        });
        self.repo
            .record_outcome(order.id, PaymentStatus::Refunded, None, &detail)
            .await?;

        let payload = serde_json::json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "refund_id": approval.refund_id,
            "amount": amount,
            "estimated_delay": REFUND_DELAY,
        });
        if let Err(e) = self
            .repo
            .enqueue_notification(order.user_id, "payment.refunded", payload)
            .await
        {
            tracing::error!(order_id = %order.id, error = %e, "failed to enqueue refund notification");
        }

        Ok(RefundResponse {
            refund_id: approval.refund_id,
            amount,
            status: approval.status,
            estimated_delay: REFUND_DELAY.to_string(),
        })
    }

    /// Processes a gateway callback. Never errors outward: the HTTP
    /// layer always acknowledges with 200, and `processed` carries the
    /// internal outcome for observability.
    pub async fn handle_webhook(&self, payload: GatewayWebhookPayload) -> WebhookAck {
        let outcome = match self.gateway.decode_webhook(&payload) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "webhook rejected");
                return WebhookAck {
                    received: true,
                    processed: false,
                    order_id: None,
                };
            }
        };

        let order = match self
            .repo
            .find_by_transaction_or_number(
                payload.transaction_id.as_deref(),
                payload.order_number.as_deref(),
            )
            .await
        {
            Ok(Some(order)) => order,
            Ok(None) => {
                tracing::warn!(
                    transaction_id = ?payload.transaction_id,
                    order_number = ?payload.order_number,
                    "webhook matched no order"
                );
                return WebhookAck {
                    received: true,
                    processed: false,
                    order_id: None,
                };
            }
            Err(e) => {
                tracing::error!(error = %e, "webhook order lookup failed");
                return WebhookAck {
                    received: true,
                    processed: false,
                    order_id: None,
                };
            }
        };

        // Redelivery against a settled order is a no-op; anything else
        // would duplicate notifications or clobber the detail blob.
        if order.payment_status.is_terminal() {
            let matches = payload
                .transaction_id
                .as_deref()
                .map(|tx| order.transaction_id.as_deref() == Some(tx))
                .unwrap_or(true);
            if !matches {
                tracing::warn!(order_id = %order.id, "webhook transaction id mismatch on terminal order");
            }
            return WebhookAck {
                received: true,
                processed: matches,
                order_id: Some(order.id),
            };
        }

        let receipt = WebhookReceipt {
            received: true,
            action_code: outcome.action_code.clone(),
            received_at: Utc::now(),
        };

        let result = if outcome.approved {
            let detail = order.payment_detail.clone().with_webhook(receipt);
            let transaction_id = payload
                .transaction_id
                .clone()
                .or_else(|| order.transaction_id.clone());
            self.repo
                .record_outcome(
                    order.id,
                    PaymentStatus::Success,
                    transaction_id.as_deref(),
                    &detail,
                )
                .await
        } else {
            let detail = order
                .payment_detail
                .clone()
                .with_webhook(receipt)
                .with_failure(FailureRecord {
                    error: outcome.message.clone(),
                    code: outcome.action_code.clone(),
                    transaction_id: payload.transaction_id.clone(),
                    failed_at: Utc::now(),
                });
            self.repo
                .record_outcome(order.id, PaymentStatus::Failed, None, &detail)
                .await
        };

        match result {
            Ok(()) => {
                if outcome.approved {
                    let transaction_id = payload
                        .transaction_id
                        .clone()
                        .or_else(|| order.transaction_id.clone())
                        .unwrap_or_default();
                    self.notify_payment_success(&order, &transaction_id).await;
                }
                WebhookAck {
                    received: true,
                    processed: true,
                    order_id: Some(order.id),
                }
            }
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "webhook state write failed");
                WebhookAck {
                    received: true,
                    processed: false,
                    order_id: Some(order.id),
                }
            }
        }
    }

    /// Paginated payment history for the caller.
    pub async fn history(
        &self,
        user_id: UserId,
        page: u32,
        limit: u32,
    ) -> Result<HistoryResponse, PaymentError> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);

        let (orders, total) = self.repo.list_for_user(user_id, page, limit).await?;
        let items = orders
            .into_iter()
            .map(|order| OrderSummary {
                order_id: order.id,
                order_number: order.order_number,
                amount: order.total,
                payment_mode: order.payment_mode,
                payment_status: order.payment_status,
                transaction_id: order.transaction_id,
                created_at: order.created_at,
            })
            .collect();

        Ok(HistoryResponse {
            items,
            pagination: Pagination { page, limit, total },
        })
    }

    /// The configured payment-method catalog, cash included.
    pub fn payment_methods(&self) -> Vec<PaymentMethodInfo> {
        let limits = self.gateway.limits();
        let card_limits = MethodLimits {
            min: limits.min,
            max: limits.max,
        };
        vec![
            PaymentMethodInfo {
                id: "cib".to_string(),
                name: "CIB card".to_string(),
                description: "Interbank CIB card payment through the national gateway".to_string(),
                enabled: true,
                limits: card_limits.clone(),
            },
            PaymentMethodInfo {
                id: "edahabia".to_string(),
                name: "EDAHABIA card".to_string(),
                description: "Algerie Poste EDAHABIA card payment".to_string(),
                enabled: true,
                limits: card_limits,
            },
            PaymentMethodInfo {
                id: "cash".to_string(),
                name: "Cash on delivery".to_string(),
                description: "Pay the courier in cash when the order arrives".to_string(),
                enabled: true,
                limits: MethodLimits {
                    min: Amount::ZERO,
                    max: limits.max,
                },
            },
        ]
    }
}
