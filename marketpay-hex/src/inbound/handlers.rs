//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use marketpay_types::{
    CardGateway, CashRequest, ChargeRequest, GatewayWebhookPayload, InitiateSessionRequest,
    OrderRepository, PaymentError, RefundRequest, UserId,
};

use crate::PaymentService;

/// Application state shared across handlers.
pub struct AppState<R: OrderRepository, G: CardGateway> {
    pub service: PaymentService<R, G>,
}

/// The verified caller, attached by the auth middleware.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: UserId,
    pub is_admin: bool,
}

/// Wrapper to implement IntoResponse for PaymentError (orphan rule workaround).
pub struct ApiError(pub PaymentError);

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PaymentError::OrderNotFound => StatusCode::NOT_FOUND,
            PaymentError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PaymentError::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        // Database details never leave the service.
        let message = match &self.0 {
            PaymentError::Repo(e) => {
                tracing::error!(error = %e, "repository failure");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = serde_json::json!({
            "error": message,
            "code": self.0.code(),
        });
        if let PaymentError::Declined {
            transaction_id: Some(tx),
            ..
        } = &self.0
        {
            body["transaction_id"] = serde_json::Value::String(tx.clone());
        }

        (status, Json(body)).into_response()
    }
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({
            "error": "Administrator privileges required",
            "code": "FORBIDDEN"
        })),
    )
        .into_response()
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Payments
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, ctx, req), fields(user_id = %ctx.user_id, order_id = %req.order_id))]
pub async fn initiate_session<R: OrderRepository, G: CardGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(ctx): Extension<UserContext>,
    Json(req): Json<InitiateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.service.initiate_session(ctx.user_id, req).await?;
    Ok(Json(session))
}

#[tracing::instrument(skip(state, ctx, req), fields(user_id = %ctx.user_id, order = %req.order))]
pub async fn charge<R: OrderRepository, G: CardGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(ctx): Extension<UserContext>,
    Json(req): Json<ChargeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.service.charge_direct(ctx.user_id, req).await?;
    Ok(Json(outcome))
}

#[tracing::instrument(skip(state, ctx, req), fields(user_id = %ctx.user_id, order = %req.order))]
pub async fn confirm_cash<R: OrderRepository, G: CardGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(ctx): Extension<UserContext>,
    Json(req): Json<CashRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let confirmation = state.service.confirm_cash(ctx.user_id, &req.order).await?;
    Ok(Json(confirmation))
}

#[tracing::instrument(skip(state, ctx), fields(user_id = %ctx.user_id, transaction_id = %transaction_id))]
pub async fn check_status<R: OrderRepository, G: CardGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(ctx): Extension<UserContext>,
    Path(transaction_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state
        .service
        .check_status(ctx.user_id, &transaction_id)
        .await?;
    Ok(Json(status))
}

#[derive(Debug, serde::Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

#[tracing::instrument(skip(state, ctx), fields(user_id = %ctx.user_id))]
pub async fn history<R: OrderRepository, G: CardGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(ctx): Extension<UserContext>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let history = state
        .service
        .history(ctx.user_id, query.page, query.limit)
        .await?;
    Ok(Json(history))
}

/// Refund a settled order. Admin-only.
#[tracing::instrument(skip(state, ctx, req), fields(user_id = %ctx.user_id, order_id = %req.order_id))]
pub async fn refund<R: OrderRepository, G: CardGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(ctx): Extension<UserContext>,
    Json(req): Json<RefundRequest>,
) -> Result<Response, ApiError> {
    if !ctx.is_admin {
        return Ok(forbidden());
    }
    let refund = state.service.refund(req).await?;
    Ok(Json(refund).into_response())
}

/// Gateway callback. Always acknowledged with 200 so the gateway stops
/// retrying; `processed` carries the internal outcome.
#[tracing::instrument(skip(state, payload), fields(action_code = %payload.action_code))]
pub async fn gateway_webhook<R: OrderRepository, G: CardGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Json(payload): Json<GatewayWebhookPayload>,
) -> impl IntoResponse {
    let ack = state.service.handle_webhook(payload).await;
    Json(ack)
}

/// Static/configured payment-method catalog.
#[tracing::instrument(skip(state))]
pub async fn payment_methods<R: OrderRepository, G: CardGateway>(
    State(state): State<Arc<AppState<R, G>>>,
) -> impl IntoResponse {
    Json(state.service.payment_methods())
}

// ─────────────────────────────────────────────────────────────────────────────
// Bootstrap & API key management
// ─────────────────────────────────────────────────────────────────────────────

/// Bootstrap endpoint - creates the first API key.
///
/// This endpoint only works when there are NO existing API keys in the
/// system. It returns the raw API key (only shown once) that should be
/// saved securely. The first key is an administrator key.
#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct BootstrapRequest {
    /// Name for the API key
    #[schema(example = "ops-key")]
    pub name: String,
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct BootstrapResponse {
    /// The generated API key (shown only once)
    #[schema(example = "sk_abc123xyz...")]
    pub api_key: String,
    /// Informational message
    pub message: String,
}

#[tracing::instrument(skip(state, req), fields(key_name = %req.name))]
pub async fn bootstrap<R: OrderRepository, G: CardGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Json(req): Json<BootstrapRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let key_count = state
        .service
        .repo()
        .count_api_keys()
        .await
        .map_err(PaymentError::Repo)?;

    if key_count > 0 {
        return Err(PaymentError::Validation(
            "Bootstrap not allowed: API keys already exist. Use an existing key to create new ones."
                .into(),
        )
        .into());
    }

    let (_api_key, raw_key) = state
        .service
        .repo()
        .create_api_key(&req.name, UserId::new(), true)
        .await
        .map_err(PaymentError::Repo)?;

    Ok((
        StatusCode::CREATED,
        Json(BootstrapResponse {
            api_key: raw_key,
            message: "First API key created. Save this key securely - it won't be shown again!"
                .into(),
        }),
    ))
}

/// Request to create a new API key.
#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct CreateApiKeyRequest {
    /// Name for the API key
    #[schema(example = "client-app-key")]
    pub name: String,
    /// User the key acts for; a fresh id is minted when absent
    pub user_id: Option<UserId>,
    /// Whether the key carries administrator privileges
    #[serde(default)]
    pub is_admin: bool,
}

/// Response containing API key info (without the raw key).
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ApiKeyInfo {
    /// API key ID
    #[schema(value_type = String, example = "123e4567-e89b-12d3-a456-426614174000")]
    pub id: String,
    /// Name of the API key
    pub name: String,
    /// User the key acts for
    pub user_id: UserId,
    /// Whether the key carries administrator privileges
    pub is_admin: bool,
    /// Whether the key is active
    pub is_active: bool,
    /// When the key was created (ISO 8601)
    #[schema(value_type = String, example = "2024-01-01T00:00:00Z")]
    pub created_at: String,
    /// When the key was last used (ISO 8601)
    #[schema(value_type = Option<String>)]
    pub last_used_at: Option<String>,
}

/// Create a new API key (admin-only).
#[tracing::instrument(skip(state, ctx, req), fields(key_name = %req.name))]
pub async fn create_api_key<R: OrderRepository, G: CardGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(ctx): Extension<UserContext>,
    Json(req): Json<CreateApiKeyRequest>,
) -> Result<Response, ApiError> {
    if !ctx.is_admin {
        return Ok(forbidden());
    }

    let user_id = req.user_id.unwrap_or_default();
    let (_api_key, raw_key) = state
        .service
        .repo()
        .create_api_key(&req.name, user_id, req.is_admin)
        .await
        .map_err(PaymentError::Repo)?;

    Ok((
        StatusCode::CREATED,
        Json(BootstrapResponse {
            api_key: raw_key,
            message: "API key created. Save this key securely - it won't be shown again!".into(),
        }),
    )
        .into_response())
}

/// List all active API keys (without exposing raw keys). Admin-only.
#[tracing::instrument(skip(state, ctx))]
pub async fn list_api_keys<R: OrderRepository, G: CardGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Response, ApiError> {
    if !ctx.is_admin {
        return Ok(forbidden());
    }

    let keys = state
        .service
        .repo()
        .list_api_keys()
        .await
        .map_err(PaymentError::Repo)?;

    let response: Vec<ApiKeyInfo> = keys
        .into_iter()
        .map(|k| ApiKeyInfo {
            id: k.id.to_string(),
            name: k.name,
            user_id: k.user_id,
            is_admin: k.is_admin,
            is_active: k.is_active,
            created_at: k.created_at.to_rfc3339(),
            last_used_at: k.last_used_at.map(|dt| dt.to_rfc3339()),
        })
        .collect();

    Ok(Json(response).into_response())
}

/// Delete (deactivate) an API key. Admin-only.
#[tracing::instrument(skip(state, ctx), fields(key_id = %id))]
pub async fn delete_api_key<R: OrderRepository, G: CardGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    if !ctx.is_admin {
        return Ok(forbidden());
    }

    let key_id: marketpay_types::ApiKeyId = id
        .parse()
        .map_err(|_| PaymentError::Validation("Invalid API key ID".into()))?;

    let deleted = state
        .service
        .repo()
        .delete_api_key(key_id)
        .await
        .map_err(PaymentError::Repo)?;

    if deleted {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "API key not found",
                "code": "NOT_FOUND"
            })),
        )
            .into_response())
    }
}
