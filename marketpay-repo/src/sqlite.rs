//! SQLite repository adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;
use uuid::Uuid;

use marketpay_types::{
    ApiKey, ApiKeyId, NewOrder, NotificationEvent, NotificationStatus, Order, OrderId,
    OrderRepository, PaymentDetail, PaymentStatus, RepoError, UserId,
};

use crate::security::{generate_api_key, hash_api_key};
use crate::types::{DbApiKey, DbNotificationEvent, DbOrder};

const ORDER_COLUMNS: &str = "id, order_number, user_id, provider_id, total_centimes, \
     payment_mode, payment_status, transaction_id, payment_detail, created_at, updated_at";

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            // Remove query parameters
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let repo = Self { pool };
        repo.create_schema().await?;
        Ok(repo)
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the database schema (for testing with existing pool).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        for ddl in [
            include_str!("../migrations/0001_create_orders.sql"),
            include_str!("../migrations/0002_create_notification_events.sql"),
            include_str!("../migrations/0003_create_api_keys.sql"),
        ] {
            for statement in ddl.split(';') {
                let stmt = statement.trim();
                if !stmt.is_empty() {
                    sqlx::query(stmt)
                        .execute(&self.pool)
                        .await
                        .map_err(|e| RepoError::Database(e.to_string()))?;
                }
            }
        }
        Ok(())
    }

    async fn fetch_order_where(
        &self,
        clause: &str,
        binds: &[&str],
    ) -> Result<Option<Order>, RepoError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {clause}");
        let mut query = sqlx::query_as::<_, DbOrder>(&sql);
        for bind in binds {
            query = query.bind(*bind);
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;
        row.map(DbOrder::into_domain).transpose()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl OrderRepository for SqliteRepo {
    async fn insert_order(&self, req: NewOrder) -> Result<Order, RepoError> {
        let order = Order::new(req.user_id, req.provider_id, req.total, req.payment_mode);
        let detail = serde_json::to_string(&order.payment_detail)
            .map_err(|e| RepoError::Database(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO orders (id, order_number, user_id, provider_id, total_centimes, payment_mode, payment_status, transaction_id, payment_detail, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)"#,
        )
        .bind(order.id.to_string())
        .bind(&order.order_number)
        .bind(order.user_id.to_string())
        .bind(order.provider_id.map(|id| id.to_string()))
        .bind(order.total.centimes())
        .bind(order.payment_mode.as_ref())
        .bind(order.payment_status.as_ref())
        .bind(&detail)
        .bind(order.created_at.to_rfc3339())
        .bind(order.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepoError> {
        let id_str = id.to_string();
        self.fetch_order_where("id = ?", &[&id_str]).await
    }

    async fn find_for_user(
        &self,
        user_id: UserId,
        identifier: &str,
    ) -> Result<Option<Order>, RepoError> {
        let user_str = user_id.to_string();

        // External order number first, internal id as the fallback.
        if let Some(order) = self
            .fetch_order_where("order_number = ? AND user_id = ?", &[identifier, &user_str])
            .await?
        {
            return Ok(Some(order));
        }

        if Uuid::parse_str(identifier).is_ok() {
            return self
                .fetch_order_where("id = ? AND user_id = ?", &[identifier, &user_str])
                .await;
        }

        Ok(None)
    }

    async fn find_by_transaction_for_user(
        &self,
        user_id: UserId,
        transaction_id: &str,
    ) -> Result<Option<Order>, RepoError> {
        let user_str = user_id.to_string();
        self.fetch_order_where(
            "transaction_id = ? AND user_id = ?",
            &[transaction_id, &user_str],
        )
        .await
    }

    async fn find_by_transaction_or_number(
        &self,
        transaction_id: Option<&str>,
        order_number: Option<&str>,
    ) -> Result<Option<Order>, RepoError> {
        if let Some(tx) = transaction_id {
            if let Some(order) = self.fetch_order_where("transaction_id = ?", &[tx]).await? {
                return Ok(Some(order));
            }
        }
        if let Some(number) = order_number {
            return self.fetch_order_where("order_number = ?", &[number]).await;
        }
        Ok(None)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Order>, u64), RepoError> {
        let user_str = user_id.to_string();
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);

        let (total,): (i64,) =
            sqlx::query_as(r#"SELECT COUNT(*) FROM orders WHERE user_id = ?"#)
                .bind(&user_str)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ? \
             ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );
        let rows: Vec<DbOrder> = sqlx::query_as(&sql)
            .bind(&user_str)
            .bind(i64::from(limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        let orders = rows
            .into_iter()
            .map(DbOrder::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((orders, total as u64))
    }

    async fn begin_processing(&self, id: OrderId) -> Result<bool, RepoError> {
        // Compare-and-set: only PENDING/FAILED orders may enter
        // PROCESSING, so racing attempts serialize here.
        let result = sqlx::query(
            r#"UPDATE orders SET payment_status = 'PROCESSING', updated_at = ?
               WHERE id = ? AND payment_status IN ('PENDING', 'FAILED')"#,
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn store_transaction_id(
        &self,
        id: OrderId,
        transaction_id: &str,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"UPDATE orders SET transaction_id = ?, updated_at = ? WHERE id = ?"#,
        )
        .bind(transaction_id)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn record_outcome(
        &self,
        id: OrderId,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        detail: &PaymentDetail,
    ) -> Result<(), RepoError> {
        let detail_json =
            serde_json::to_string(detail).map_err(|e| RepoError::Database(e.to_string()))?;
        let now = chrono::Utc::now().to_rfc3339();

        let result = match transaction_id {
            Some(tx) => sqlx::query(
                r#"UPDATE orders SET payment_status = ?, transaction_id = ?, payment_detail = ?, updated_at = ?
                   WHERE id = ?"#,
            )
            .bind(status.as_ref())
            .bind(tx)
            .bind(&detail_json)
            .bind(&now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await,
            None => sqlx::query(
                r#"UPDATE orders SET payment_status = ?, payment_detail = ?, updated_at = ?
                   WHERE id = ?"#,
            )
            .bind(status.as_ref())
            .bind(&detail_json)
            .bind(&now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await,
        }
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn confirm_cash(&self, id: OrderId) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"UPDATE orders SET payment_mode = 'CASH', payment_status = 'PENDING', updated_at = ?
               WHERE id = ?"#,
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn enqueue_notification(
        &self,
        user_id: UserId,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO notification_events (id, user_id, event_type, payload, status, created_at)
               VALUES (?, ?, ?, ?, 'PENDING', ?)"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id.to_string())
        .bind(event_type)
        .bind(payload.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn verify_api_key_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, RepoError> {
        let row: Option<DbApiKey> = sqlx::query_as(
            r#"SELECT id, name, key_hash, user_id, is_admin, is_active, created_at, last_used_at
               FROM api_keys WHERE key_hash = ? AND is_active = 1"#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        let key = row.into_domain()?;

        sqlx::query(r#"UPDATE api_keys SET last_used_at = ? WHERE id = ?"#)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(key.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(Some(key))
    }

    async fn create_api_key(
        &self,
        name: &str,
        user_id: UserId,
        is_admin: bool,
    ) -> Result<(ApiKey, String), RepoError> {
        let raw_key = generate_api_key();
        let key = ApiKey::new(
            name.to_string(),
            hash_api_key(&raw_key),
            user_id,
            is_admin,
        );

        sqlx::query(
            r#"INSERT INTO api_keys (id, name, key_hash, user_id, is_admin, is_active, created_at, last_used_at)
               VALUES (?, ?, ?, ?, ?, 1, ?, NULL)"#,
        )
        .bind(key.id.to_string())
        .bind(&key.name)
        .bind(&key.key_hash)
        .bind(key.user_id.to_string())
        .bind(i64::from(key.is_admin))
        .bind(key.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok((key, raw_key))
    }

    async fn count_api_keys(&self) -> Result<i64, RepoError> {
        let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM api_keys"#)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;
        Ok(count)
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, RepoError> {
        let rows: Vec<DbApiKey> = sqlx::query_as(
            r#"SELECT id, name, key_hash, user_id, is_admin, is_active, created_at, last_used_at
               FROM api_keys WHERE is_active = 1 ORDER BY created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbApiKey::into_domain).collect()
    }

    async fn delete_api_key(&self, id: ApiKeyId) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE api_keys SET is_active = 0 WHERE id = ? AND is_active = 1"#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Notification queue extension (worker-facing)
// ─────────────────────────────────────────────────────────────────────────────

impl SqliteRepo {
    pub async fn get_pending_notifications(
        &self,
        limit: i64,
    ) -> Result<Vec<NotificationEvent>, RepoError> {
        let rows = sqlx::query_as::<_, DbNotificationEvent>(
            r#"
            SELECT id, user_id, event_type, payload, status, created_at, processed_at, attempts, last_error
            FROM notification_events
            WHERE status = 'PENDING'
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(|row| row.into_domain()).collect()
    }

    pub async fn update_notification_status(
        &self,
        id: Uuid,
        status: NotificationStatus,
        last_error: Option<String>,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            UPDATE notification_events
            SET status = ?, processed_at = ?, last_error = ?, attempts = attempts + 1
            WHERE id = ?
            "#,
        )
        .bind(status.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(last_error)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }
}
