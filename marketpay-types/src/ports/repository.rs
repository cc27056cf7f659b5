//! Repository port trait.
//!
//! This is the primary port in our hexagonal architecture.
//! Adapters (Postgres, SQLite, InMemory) will implement this trait.

use crate::domain::{ApiKey, ApiKeyId, Order, OrderId, PaymentDetail, PaymentStatus, UserId};
use crate::dto::NewOrder;
use crate::error::RepoError;

/// The main repository port for order payment state.
///
/// The payment fields of an order (`payment_status`, `transaction_id`,
/// `payment_detail`) are written ONLY through this port; the
/// `begin_processing` transition MUST be a compare-and-set so racing
/// charge attempts serialize at the data layer.
#[async_trait::async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Order lookup (collaborator seam: orders are created upstream)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Inserts an order awaiting payment. This is the order-placement
    /// collaborator's seam; the payment core itself never creates orders.
    async fn insert_order(&self, req: NewOrder) -> Result<Order, RepoError>;

    /// Gets an order by internal id, unscoped (admin/refund path).
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepoError>;

    /// Resolves an order for a user by external order number first,
    /// falling back to internal id.
    async fn find_for_user(
        &self,
        user_id: UserId,
        identifier: &str,
    ) -> Result<Option<Order>, RepoError>;

    /// Finds a user's order by its gateway transaction id.
    async fn find_by_transaction_for_user(
        &self,
        user_id: UserId,
        transaction_id: &str,
    ) -> Result<Option<Order>, RepoError>;

    /// Webhook-side lookup: transaction id first, then order number.
    /// Never scoped to a user and never creates anything.
    async fn find_by_transaction_or_number(
        &self,
        transaction_id: Option<&str>,
        order_number: Option<&str>,
    ) -> Result<Option<Order>, RepoError>;

    /// Lists a user's orders newest-first with a total count.
    async fn list_for_user(
        &self,
        user_id: UserId,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Order>, u64), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Payment state transitions (MUST be atomic)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Compare-and-set PENDING/FAILED → PROCESSING. Returns `false`
    /// when the stored status is anything else, so two racing attempts
    /// cannot both proceed.
    async fn begin_processing(&self, id: OrderId) -> Result<bool, RepoError>;

    /// Stores the gateway-assigned transaction/session id.
    async fn store_transaction_id(
        &self,
        id: OrderId,
        transaction_id: &str,
    ) -> Result<(), RepoError>;

    /// Writes the outcome of an attempt: new status, optionally a
    /// transaction id, and the merged detail blob as a whole.
    async fn record_outcome(
        &self,
        id: OrderId,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        detail: &PaymentDetail,
    ) -> Result<(), RepoError>;

    /// Forces the order onto the cash path: mode CASH, status PENDING.
    async fn confirm_cash(&self, id: OrderId) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Notification fan-out
    // ─────────────────────────────────────────────────────────────────────────────

    /// Enqueues a payment-outcome event for delivery to a user.
    async fn enqueue_notification(
        &self,
        user_id: UserId,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // API keys (auth collaborator)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Looks up an active API key by its SHA-256 hash.
    async fn verify_api_key_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, RepoError>;

    /// Creates an API key, returning the record and the raw key
    /// (shown only once).
    async fn create_api_key(
        &self,
        name: &str,
        user_id: UserId,
        is_admin: bool,
    ) -> Result<(ApiKey, String), RepoError>;

    /// Counts all API keys, active or not.
    async fn count_api_keys(&self) -> Result<i64, RepoError>;

    /// Lists all active API keys.
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, RepoError>;

    /// Deactivates an API key.
    async fn delete_api_key(&self, id: ApiKeyId) -> Result<bool, RepoError>;
}
