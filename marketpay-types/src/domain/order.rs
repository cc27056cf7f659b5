//! Order payment slice: the fields of an order this service owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::amount::Amount;
use super::card::CardNetwork;
use super::detail::PaymentDetail;

/// Unique identifier for an Order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Creates a new random OrderId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an OrderId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OrderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier of the user who placed (or fulfils) an order.
///
/// Accounts themselves live in the out-of-scope user service; this core
/// only needs a stable id to scope lookups and address notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// How the order is paid. Fixed at order creation; cash orders never
/// enter the gateway path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMode {
    Cash,
    Cib,
    Edahabia,
}

impl PaymentMode {
    /// The card network behind this mode, if any.
    pub fn card_network(&self) -> Option<CardNetwork> {
        match self {
            PaymentMode::Cash => None,
            PaymentMode::Cib => Some(CardNetwork::Cib),
            PaymentMode::Edahabia => Some(CardNetwork::Edahabia),
        }
    }
}

impl AsRef<str> for PaymentMode {
    fn as_ref(&self) -> &str {
        match self {
            PaymentMode::Cash => "CASH",
            PaymentMode::Cib => "CIB",
            PaymentMode::Edahabia => "EDAHABIA",
        }
    }
}

impl std::fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl std::str::FromStr for PaymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(PaymentMode::Cash),
            "CIB" => Ok(PaymentMode::Cib),
            "EDAHABIA" => Ok(PaymentMode::Edahabia),
            other => Err(format!("unknown payment mode: {other}")),
        }
    }
}

/// Payment lifecycle of a single order.
///
/// pending → processing → {success | failed}; success → refunded.
/// A failed order may re-enter processing on a fresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// States a fresh charge or session attempt may start from.
    pub fn can_begin_processing(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Failed)
    }

    /// States that end the payment lifecycle for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Refunded)
    }
}

impl AsRef<str> for PaymentStatus {
    fn as_ref(&self) -> &str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PROCESSING" => Ok(PaymentStatus::Processing),
            "SUCCESS" => Ok(PaymentStatus::Success),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// The payment-relevant slice of an order.
///
/// Order creation and fulfilment live in the out-of-scope marketplace
/// service; once an order exists, this core is the only writer of
/// `payment_status`, `transaction_id`, and `payment_detail`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier
    pub id: OrderId,
    /// External-facing order number, assigned at creation, immutable
    pub order_number: String,
    /// The paying user
    pub user_id: UserId,
    /// The fulfilling provider, once one is assigned
    pub provider_id: Option<UserId>,
    /// Order total in DZD
    pub total: Amount,
    pub payment_mode: PaymentMode,
    pub payment_status: PaymentStatus,
    /// Gateway-assigned identifier; set once a session or charge is attempted
    pub transaction_id: Option<String>,
    /// Last-operation metadata, merged sub-record by sub-record
    pub payment_detail: PaymentDetail,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new order awaiting payment.
    pub fn new(
        user_id: UserId,
        provider_id: Option<UserId>,
        total: Amount,
        payment_mode: PaymentMode,
    ) -> Self {
        let id = OrderId::new();
        let now = Utc::now();
        Self {
            id,
            order_number: Self::derive_order_number(&id),
            user_id,
            provider_id,
            total,
            payment_mode,
            payment_status: PaymentStatus::Pending,
            transaction_id: None,
            payment_detail: PaymentDetail::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs an order from database fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: OrderId,
        order_number: String,
        user_id: UserId,
        provider_id: Option<UserId>,
        total: Amount,
        payment_mode: PaymentMode,
        payment_status: PaymentStatus,
        transaction_id: Option<String>,
        payment_detail: PaymentDetail,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_number,
            user_id,
            provider_id,
            total,
            payment_mode,
            payment_status,
            transaction_id,
            payment_detail,
            created_at,
            updated_at,
        }
    }

    fn derive_order_number(id: &OrderId) -> String {
        let simple = id.as_uuid().simple().to_string();
        format!("ORD-{}", &simple[..12].to_uppercase())
    }
}
