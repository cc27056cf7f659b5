//! Shared database types with feature-gated fields for SQLite and PostgreSQL.

use std::str::FromStr;

use sqlx::FromRow;

use marketpay_types::{
    Amount, ApiKey, ApiKeyId, NotificationEvent, NotificationStatus, Order, OrderId,
    PaymentDetail, PaymentMode, PaymentStatus, RepoError, UserId,
};

// ─────────────────────────────────────────────────────────────────────────────
// Feature-gated imports
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(not(feature = "sqlite"))]
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[cfg(feature = "sqlite")]
fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>, RepoError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| RepoError::Database(format!("bad timestamp {value}: {e}")))
}

#[cfg(feature = "sqlite")]
fn parse_uuid(value: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(value).map_err(|e| RepoError::Database(format!("bad uuid {value}: {e}")))
}

fn bad(field: &str, err: impl std::fmt::Display) -> RepoError {
    RepoError::Database(format!("bad {field}: {err}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs (derive FromRow for automatic mapping)
// ─────────────────────────────────────────────────────────────────────────────

/// Order row from database.
#[derive(FromRow)]
pub struct DbOrder {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    pub order_number: String,

    #[cfg(not(feature = "sqlite"))]
    pub user_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub user_id: String,

    #[cfg(not(feature = "sqlite"))]
    pub provider_id: Option<Uuid>,
    #[cfg(feature = "sqlite")]
    pub provider_id: Option<String>,

    pub total_centimes: i64,
    pub payment_mode: String,
    pub payment_status: String,
    pub transaction_id: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub payment_detail: serde_json::Value,
    #[cfg(feature = "sqlite")]
    pub payment_detail: String,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,

    #[cfg(not(feature = "sqlite"))]
    pub updated_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub updated_at: String,
}

impl DbOrder {
    pub fn into_domain(self) -> Result<Order, RepoError> {
        let payment_mode =
            PaymentMode::from_str(&self.payment_mode).map_err(|e| bad("payment_mode", e))?;
        let payment_status =
            PaymentStatus::from_str(&self.payment_status).map_err(|e| bad("payment_status", e))?;
        let total = Amount::from_centimes(self.total_centimes)
            .map_err(|e| bad("total_centimes", e))?;

        #[cfg(feature = "sqlite")]
        let (id, user_id, provider_id, detail, created_at, updated_at) = (
            parse_uuid(&self.id)?,
            parse_uuid(&self.user_id)?,
            self.provider_id.as_deref().map(parse_uuid).transpose()?,
            serde_json::from_str::<PaymentDetail>(&self.payment_detail)
                .map_err(|e| bad("payment_detail", e))?,
            parse_timestamp(&self.created_at)?,
            parse_timestamp(&self.updated_at)?,
        );

        #[cfg(not(feature = "sqlite"))]
        let (id, user_id, provider_id, detail, created_at, updated_at) = (
            self.id,
            self.user_id,
            self.provider_id,
            serde_json::from_value::<PaymentDetail>(self.payment_detail)
                .map_err(|e| bad("payment_detail", e))?,
            self.created_at,
            self.updated_at,
        );

        Ok(Order::from_parts(
            OrderId::from_uuid(id),
            self.order_number,
            UserId::from_uuid(user_id),
            provider_id.map(UserId::from_uuid),
            total,
            payment_mode,
            payment_status,
            self.transaction_id,
            detail,
            created_at,
            updated_at,
        ))
    }
}

/// Notification event row from database.
#[derive(FromRow)]
pub struct DbNotificationEvent {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    #[cfg(not(feature = "sqlite"))]
    pub user_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub user_id: String,

    pub event_type: String,

    #[cfg(not(feature = "sqlite"))]
    pub payload: serde_json::Value,
    #[cfg(feature = "sqlite")]
    pub payload: String,

    pub status: String,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,

    #[cfg(not(feature = "sqlite"))]
    pub processed_at: Option<DateTime<Utc>>,
    #[cfg(feature = "sqlite")]
    pub processed_at: Option<String>,

    pub attempts: i32,
    pub last_error: Option<String>,
}

impl DbNotificationEvent {
    pub fn into_domain(self) -> Result<NotificationEvent, RepoError> {
        let status = match self.status.as_str() {
            "PENDING" => NotificationStatus::Pending,
            "PROCESSING" => NotificationStatus::Processing,
            "COMPLETED" => NotificationStatus::Completed,
            "FAILED" => NotificationStatus::Failed,
            _ => NotificationStatus::Pending,
        };

        #[cfg(feature = "sqlite")]
        let (id, user_id, payload, created_at, processed_at) = (
            parse_uuid(&self.id)?,
            parse_uuid(&self.user_id)?,
            serde_json::from_str(&self.payload).map_err(|e| bad("payload", e))?,
            parse_timestamp(&self.created_at)?,
            self.processed_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
        );

        #[cfg(not(feature = "sqlite"))]
        let (id, user_id, payload, created_at, processed_at) = (
            self.id,
            self.user_id,
            self.payload,
            self.created_at,
            self.processed_at,
        );

        Ok(NotificationEvent {
            id,
            user_id: UserId::from_uuid(user_id),
            event_type: self.event_type,
            payload,
            status,
            created_at,
            processed_at,
            attempts: self.attempts,
            last_error: self.last_error,
        })
    }
}

/// API key row from database.
#[derive(FromRow)]
pub struct DbApiKey {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    pub name: String,
    pub key_hash: String,

    #[cfg(not(feature = "sqlite"))]
    pub user_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub user_id: String,

    #[cfg(not(feature = "sqlite"))]
    pub is_admin: bool,
    #[cfg(feature = "sqlite")]
    pub is_admin: i64,

    #[cfg(not(feature = "sqlite"))]
    pub is_active: bool,
    #[cfg(feature = "sqlite")]
    pub is_active: i64,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,

    #[cfg(not(feature = "sqlite"))]
    pub last_used_at: Option<DateTime<Utc>>,
    #[cfg(feature = "sqlite")]
    pub last_used_at: Option<String>,
}

impl DbApiKey {
    pub fn into_domain(self) -> Result<ApiKey, RepoError> {
        #[cfg(feature = "sqlite")]
        let (id, user_id, is_admin, is_active, created_at, last_used_at) = (
            parse_uuid(&self.id)?,
            parse_uuid(&self.user_id)?,
            self.is_admin != 0,
            self.is_active != 0,
            parse_timestamp(&self.created_at)?,
            self.last_used_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
        );

        #[cfg(not(feature = "sqlite"))]
        let (id, user_id, is_admin, is_active, created_at, last_used_at) = (
            self.id,
            self.user_id,
            self.is_admin,
            self.is_active,
            self.created_at,
            self.last_used_at,
        );

        Ok(ApiKey {
            id: ApiKeyId::from_uuid(id),
            name: self.name,
            key_hash: self.key_hash,
            user_id: UserId::from_uuid(user_id),
            is_admin,
            is_active,
            created_at,
            last_used_at,
        })
    }
}
