//! Remote gateway mode (sandbox and production).
//!
//! Issues signed HTTP calls against the acquirer REST surface and
//! translates its numeric action codes into the normalized result.
//! Network and decode failures become `Unavailable`, never a fault.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;

use marketpay_types::domain::{Amount, CardDetails, CardNetwork};
use marketpay_types::ports::gateway::{
    ChargeApproval, GatewayError, RefundApproval, RemoteStatus, SessionInit,
};

use crate::codes::action_code_outcome;
use crate::signature::sign_fields;

const SESSION_TTL_MINUTES: i64 = 15;

// ISO 4217 numeric code for the Algerian dinar.
const CURRENCY_CODE: &str = "012";

pub struct RemoteGateway {
    base_url: String,
    merchant_id: String,
    terminal_id: String,
    secret_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

/// Union of the fields the acquirer returns across endpoints.
#[derive(Debug, Deserialize)]
struct RemoteResponse {
    #[serde(alias = "actionCode")]
    action_code: Option<String>,
    #[serde(alias = "errorCode")]
    error_code: Option<String>,
    #[serde(alias = "errorMessage")]
    error_message: Option<String>,
    #[serde(alias = "mdOrder", alias = "orderId")]
    transaction_id: Option<String>,
    #[serde(alias = "authCode")]
    auth_code: Option<String>,
    #[serde(alias = "formUrl")]
    form_url: Option<String>,
    #[serde(alias = "orderStatus")]
    status: Option<String>,
    #[serde(alias = "refundId")]
    refund_id: Option<String>,
}

impl RemoteGateway {
    pub fn new(
        base_url: String,
        merchant_id: String,
        terminal_id: String,
        secret_key: String,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url,
            merchant_id,
            terminal_id,
            secret_key,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Adds merchant identification and the trailing signature, then
    /// renders the body as JSON.
    fn signed_body(&self, mut fields: BTreeMap<&str, String>) -> serde_json::Value {
        fields.insert("merchant_id", self.merchant_id.clone());
        fields.insert("terminal_id", self.terminal_id.clone());
        let signature = sign_fields(&fields, &self.secret_key);

        let mut body = serde_json::Map::new();
        for (key, value) in &fields {
            body.insert((*key).to_string(), serde_json::Value::String(value.clone()));
        }
        body.insert("signature".to_string(), serde_json::Value::String(signature));
        serde_json::Value::Object(body)
    }

    async fn call(
        &self,
        endpoint: &str,
        fields: BTreeMap<&str, String>,
    ) -> Result<RemoteResponse, GatewayError> {
        let url = format!("{}/payment/rest/{endpoint}", self.base_url);
        let body = self.signed_body(fields);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Unavailable("gateway timeout".to_string())
                } else {
                    GatewayError::Unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::Unavailable(format!(
                "gateway returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<RemoteResponse>()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("invalid gateway response: {e}")))
    }

    /// Extracts the effective action code and maps declines.
    fn check_approved(response: &RemoteResponse) -> Result<String, GatewayError> {
        let code = response
            .action_code
            .clone()
            .or_else(|| response.error_code.clone())
            .unwrap_or_else(|| "96".to_string());

        let outcome = action_code_outcome(&code);
        if outcome.approved {
            return Ok(code);
        }
        Err(GatewayError::Declined {
            message: response
                .error_message
                .clone()
                .unwrap_or_else(|| outcome.message.to_string()),
            code,
            transaction_id: response.transaction_id.clone(),
        })
    }

    pub async fn init_session(
        &self,
        order_number: &str,
        amount: Amount,
        network: CardNetwork,
        return_url: &str,
    ) -> Result<SessionInit, GatewayError> {
        let mut fields = BTreeMap::new();
        fields.insert("order_number", order_number.to_string());
        fields.insert("amount", amount.centimes().to_string());
        fields.insert("currency", CURRENCY_CODE.to_string());
        fields.insert("network", network.to_string());
        fields.insert("return_url", return_url.to_string());

        let response = self.call("register.do", fields).await?;
        Self::check_approved(&response)?;

        let session_id = response.transaction_id.ok_or_else(|| {
            GatewayError::Unavailable("gateway response missing session id".to_string())
        })?;
        let payment_url = response.form_url.ok_or_else(|| {
            GatewayError::Unavailable("gateway response missing form url".to_string())
        })?;

        Ok(SessionInit {
            session_id,
            payment_url,
            expires_at: Utc::now() + ChronoDuration::minutes(SESSION_TTL_MINUTES),
        })
    }

    pub async fn confirm_direct(
        &self,
        order_number: &str,
        card: &CardDetails,
        amount: Amount,
    ) -> Result<ChargeApproval, GatewayError> {
        let mut fields = BTreeMap::new();
        fields.insert("order_number", order_number.to_string());
        fields.insert("amount", amount.centimes().to_string());
        fields.insert("currency", CURRENCY_CODE.to_string());
        fields.insert("network", card.network.to_string());
        fields.insert("pan", card.number.clone());
        fields.insert("cardholder", card.holder_name.clone());
        fields.insert(
            "expiry",
            format!("{:02}{:02}", card.expiry_year, card.expiry_month),
        );
        fields.insert("cvc", card.cvv.clone());

        let response = self.call("confirm.do", fields).await?;
        let code = Self::check_approved(&response)?;

        let transaction_id = response.transaction_id.ok_or_else(|| {
            GatewayError::Unavailable("gateway response missing transaction id".to_string())
        })?;

        Ok(ChargeApproval {
            transaction_id,
            authorization_code: response.auth_code.unwrap_or_default(),
            response_code: code,
        })
    }

    pub async fn query_status(&self, transaction_id: &str) -> Result<RemoteStatus, GatewayError> {
        let mut fields = BTreeMap::new();
        fields.insert("transaction_id", transaction_id.to_string());

        let response = self.call("getStatus.do", fields).await?;
        Ok(RemoteStatus {
            status: response.status.unwrap_or_else(|| "UNKNOWN".to_string()),
            action_code: response.action_code,
        })
    }

    pub async fn refund(
        &self,
        transaction_id: &str,
        amount: Amount,
    ) -> Result<RefundApproval, GatewayError> {
        let mut fields = BTreeMap::new();
        fields.insert("transaction_id", transaction_id.to_string());
        fields.insert("amount", amount.centimes().to_string());
        fields.insert("currency", CURRENCY_CODE.to_string());

        let response = self.call("refund.do", fields).await?;
        Self::check_approved(&response)?;

        Ok(RefundApproval {
            refund_id: response
                .refund_id
                .unwrap_or_else(|| format!("rf_{transaction_id}")),
            status: "PROCESSED".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> RemoteGateway {
        RemoteGateway::new(
            "https://test.satim.dz".to_string(),
            "MERCH001".to_string(),
            "TERM001".to_string(),
            "secret".to_string(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_signed_body_has_trailing_signature_and_merchant_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("amount", "120000".to_string());
        let body = gateway().signed_body(fields);

        let object = body.as_object().unwrap();
        assert_eq!(object["merchant_id"], "MERCH001");
        assert_eq!(object["terminal_id"], "TERM001");
        assert!(object.contains_key("signature"));
    }

    #[test]
    fn test_decline_maps_action_code() {
        let response = RemoteResponse {
            action_code: Some("51".to_string()),
            error_code: None,
            error_message: None,
            transaction_id: Some("txn_9".to_string()),
            auth_code: None,
            form_url: None,
            status: None,
            refund_id: None,
        };
        match RemoteGateway::check_approved(&response) {
            Err(GatewayError::Declined {
                code,
                message,
                transaction_id,
            }) => {
                assert_eq!(code, "51");
                assert_eq!(message, "Insufficient funds");
                assert_eq!(transaction_id.as_deref(), Some("txn_9"));
            }
            other => panic!("expected decline, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_code_defaults_to_system_error() {
        let response = RemoteResponse {
            action_code: None,
            error_code: None,
            error_message: None,
            transaction_id: None,
            auth_code: None,
            form_url: None,
            status: None,
            refund_id: None,
        };
        match RemoteGateway::check_approved(&response) {
            Err(GatewayError::Declined { code, .. }) => assert_eq!(code, "96"),
            other => panic!("expected decline, got {other:?}"),
        }
    }
}
