//! PostgreSQL repository adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
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
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository with row-level locking on status transitions.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_orders_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_notification_events_pg.sql"),
        "0002",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0003_create_api_keys_pg.sql"),
        "0003",
    )
    .await?;

    Ok(())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the database schema (for testing with existing pool).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl OrderRepository for PostgresRepo {
    async fn insert_order(&self, req: NewOrder) -> Result<Order, RepoError> {
        let order = Order::new(req.user_id, req.provider_id, req.total, req.payment_mode);
        let detail = serde_json::to_value(&order.payment_detail)
            .map_err(|e| RepoError::Database(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO orders (id, order_number, user_id, provider_id, total_centimes, payment_mode, payment_status, transaction_id, payment_detail, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8, $9, $10)"#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.order_number)
        .bind(order.user_id.as_uuid())
        .bind(order.provider_id.map(|id| *id.as_uuid()))
        .bind(order.total.centimes())
        .bind(order.payment_mode.as_ref())
        .bind(order.payment_status.as_ref())
        .bind(&detail)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepoError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row: Option<DbOrder> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;
        row.map(DbOrder::into_domain).transpose()
    }

    async fn find_for_user(
        &self,
        user_id: UserId,
        identifier: &str,
    ) -> Result<Option<Order>, RepoError> {
        // External order number first, internal id as the fallback.
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1 AND user_id = $2"
        );
        let row: Option<DbOrder> = sqlx::query_as(&sql)
            .bind(identifier)
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;
        if let Some(row) = row {
            return Ok(Some(row.into_domain()?));
        }

        if let Ok(id) = Uuid::parse_str(identifier) {
            let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2");
            let row: Option<DbOrder> = sqlx::query_as(&sql)
                .bind(id)
                .bind(user_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;
            return row.map(DbOrder::into_domain).transpose();
        }

        Ok(None)
    }

    async fn find_by_transaction_for_user(
        &self,
        user_id: UserId,
        transaction_id: &str,
    ) -> Result<Option<Order>, RepoError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE transaction_id = $1 AND user_id = $2"
        );
        let row: Option<DbOrder> = sqlx::query_as(&sql)
            .bind(transaction_id)
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;
        row.map(DbOrder::into_domain).transpose()
    }

    async fn find_by_transaction_or_number(
        &self,
        transaction_id: Option<&str>,
        order_number: Option<&str>,
    ) -> Result<Option<Order>, RepoError> {
        if let Some(tx) = transaction_id {
            let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE transaction_id = $1");
            let row: Option<DbOrder> = sqlx::query_as(&sql)
                .bind(tx)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;
            if let Some(row) = row {
                return Ok(Some(row.into_domain()?));
            }
        }
        if let Some(number) = order_number {
            let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1");
            let row: Option<DbOrder> = sqlx::query_as(&sql)
                .bind(number)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;
            return row.map(DbOrder::into_domain).transpose();
        }
        Ok(None)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Order>, u64), RepoError> {
        let user = *user_id.as_uuid();
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);

        let (total,): (i64,) =
            sqlx::query_as(r#"SELECT COUNT(*) FROM orders WHERE user_id = $1"#)
                .bind(user)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        let rows: Vec<DbOrder> = sqlx::query_as(&sql)
            .bind(user)
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
        // Compare-and-set under Postgres row locking: only PENDING or
        // FAILED orders may enter PROCESSING.
        let result = sqlx::query(
            r#"UPDATE orders SET payment_status = 'PROCESSING', updated_at = $1
               WHERE id = $2 AND payment_status IN ('PENDING', 'FAILED')"#,
        )
        .bind(Utc::now())
        .bind(id.as_uuid())
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
            r#"UPDATE orders SET transaction_id = $1, updated_at = $2 WHERE id = $3"#,
        )
        .bind(transaction_id)
        .bind(Utc::now())
        .bind(id.as_uuid())
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
            serde_json::to_value(detail).map_err(|e| RepoError::Database(e.to_string()))?;
        let now = Utc::now();

        let result = match transaction_id {
            Some(tx) => sqlx::query(
                r#"UPDATE orders SET payment_status = $1, transaction_id = $2, payment_detail = $3, updated_at = $4
                   WHERE id = $5"#,
            )
            .bind(status.as_ref())
            .bind(tx)
            .bind(&detail_json)
            .bind(now)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await,
            None => sqlx::query(
                r#"UPDATE orders SET payment_status = $1, payment_detail = $2, updated_at = $3
                   WHERE id = $4"#,
            )
            .bind(status.as_ref())
            .bind(&detail_json)
            .bind(now)
            .bind(id.as_uuid())
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
            r#"UPDATE orders SET payment_mode = 'CASH', payment_status = 'PENDING', updated_at = $1
               WHERE id = $2"#,
        )
        .bind(Utc::now())
        .bind(id.as_uuid())
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
               VALUES ($1, $2, $3, $4, 'PENDING', $5)"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(event_type)
        .bind(&payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }

    async fn verify_api_key_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, RepoError> {
        let row: Option<DbApiKey> = sqlx::query_as(
            r#"SELECT id, name, key_hash, user_id, is_admin, is_active, created_at, last_used_at
               FROM api_keys WHERE key_hash = $1 AND is_active = TRUE"#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        let key = row.into_domain()?;

        sqlx::query(r#"UPDATE api_keys SET last_used_at = $1 WHERE id = $2"#)
            .bind(Utc::now())
            .bind(key.id.as_uuid())
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
               VALUES ($1, $2, $3, $4, $5, TRUE, $6, NULL)"#,
        )
        .bind(key.id.as_uuid())
        .bind(&key.name)
        .bind(&key.key_hash)
        .bind(key.user_id.as_uuid())
        .bind(key.is_admin)
        .bind(key.created_at)
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
               FROM api_keys WHERE is_active = TRUE ORDER BY created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbApiKey::into_domain).collect()
    }

    async fn delete_api_key(&self, id: ApiKeyId) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE api_keys SET is_active = FALSE WHERE id = $1 AND is_active = TRUE"#,
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Notification queue extension (worker-facing)
// ─────────────────────────────────────────────────────────────────────────────

impl PostgresRepo {
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
            LIMIT $1
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
            SET status = $1, processed_at = $2, last_error = $3, attempts = attempts + 1
            WHERE id = $4
            "#,
        )
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(())
    }
}
