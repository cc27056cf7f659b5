//! Port traits implemented by adapters.

pub mod gateway;
pub mod repository;

pub use gateway::{
    CardGateway, ChargeApproval, GatewayError, RefundApproval, RemoteStatus, SessionInit,
    WebhookOutcome,
};
pub use repository::OrderRepository;
