//! Domain models for the order payment service.

pub mod amount;
pub mod api_key;
pub mod card;
pub mod detail;
pub mod notification;
pub mod order;

pub use amount::{Amount, AmountError, PaymentLimits};
pub use api_key::{ApiKey, ApiKeyId};
pub use card::{CardDetails, CardError, CardNetwork};
pub use detail::{ChargeRecord, FailureRecord, PaymentDetail, RefundRecord, WebhookReceipt};
pub use notification::{NotificationEvent, NotificationStatus};
pub use order::{Order, OrderId, PaymentMode, PaymentStatus, UserId};
