//! Error types for the order payment service.

use crate::domain::Amount;
use crate::ports::gateway::GatewayError;

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Outcomes of payment operations, each with a stable machine-readable
/// code rendered to HTTP clients alongside the message.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Order is already paid")]
    AlreadyPaid,

    #[error("A payment attempt for this order is already in progress")]
    PaymentInProgress,

    #[error("Cash orders cannot be paid through the card gateway")]
    InvalidMode,

    #[error("Order is not refundable")]
    NotRefundable,

    #[error("Payment declined by the gateway: {message} (code {code})")]
    Declined {
        code: String,
        message: String,
        transaction_id: Option<String>,
    },

    #[error("Amount is below the configured minimum of {min} DZD")]
    MinAmount { min: Amount },

    #[error("Amount is above the configured maximum of {max} DZD")]
    MaxAmount { max: Amount },

    #[error("Payment gateway unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl PaymentError {
    /// Machine-readable code surfaced in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::Validation(_) => "VALIDATION_ERROR",
            PaymentError::OrderNotFound => "ORDER_NOT_FOUND",
            PaymentError::AlreadyPaid => "ALREADY_PAID",
            PaymentError::PaymentInProgress => "PAYMENT_IN_PROGRESS",
            PaymentError::InvalidMode => "INVALID_PAYMENT_MODE",
            PaymentError::NotRefundable => "NOT_REFUNDABLE",
            PaymentError::Declined { .. } => "PAYMENT_DECLINED",
            PaymentError::MinAmount { .. } => "MIN_AMOUNT_ERROR",
            PaymentError::MaxAmount { .. } => "MAX_AMOUNT_ERROR",
            PaymentError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            PaymentError::InvalidSignature => "INVALID_SIGNATURE",
            PaymentError::Repo(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Declined {
                code,
                message,
                transaction_id,
            } => PaymentError::Declined {
                code,
                message,
                transaction_id,
            },
            GatewayError::BelowMinimum { min } => PaymentError::MinAmount { min },
            GatewayError::AboveMaximum { max } => PaymentError::MaxAmount { max },
            GatewayError::InvalidSignature => PaymentError::InvalidSignature,
            GatewayError::Unavailable(msg) => PaymentError::ServiceUnavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(PaymentError::OrderNotFound.code(), "ORDER_NOT_FOUND");
        assert_eq!(PaymentError::AlreadyPaid.code(), "ALREADY_PAID");
        assert_eq!(
            PaymentError::MinAmount {
                min: Amount::from_dinars(100).unwrap()
            }
            .code(),
            "MIN_AMOUNT_ERROR"
        );
    }

    #[test]
    fn test_gateway_error_conversion() {
        let err: PaymentError = GatewayError::Declined {
            code: "05".to_string(),
            message: "Authorization refused".to_string(),
            transaction_id: Some("txn_1".to_string()),
        }
        .into();
        assert_eq!(err.code(), "PAYMENT_DECLINED");
    }
}
