//! # Marketpay Types
//!
//! Domain types and port traits for the order payment service.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Amount, Order, PaymentDetail, card rules)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    Amount, ApiKey, ApiKeyId, CardDetails, CardNetwork, ChargeRecord, FailureRecord,
    NotificationEvent, NotificationStatus, Order, OrderId, PaymentDetail, PaymentLimits,
    PaymentMode, PaymentStatus, RefundRecord, UserId, WebhookReceipt,
};
pub use dto::*;
pub use error::{PaymentError, RepoError};
pub use ports::{
    CardGateway, ChargeApproval, GatewayError, OrderRepository, RefundApproval, RemoteStatus,
    SessionInit, WebhookOutcome,
};
