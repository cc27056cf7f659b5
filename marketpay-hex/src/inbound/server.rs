//! HTTP Server configuration and startup.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use marketpay_types::{CardGateway, OrderRepository};

use super::auth::auth_middleware;
use super::handlers::{self, AppState};
use super::rate_limit::{RateLimiterState, rate_limit_middleware};
use crate::PaymentService;
use crate::openapi::ApiDoc;

/// HTTP Server for the order payment API.
pub struct HttpServer<R: OrderRepository, G: CardGateway> {
    state: Arc<AppState<R, G>>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: OrderRepository, G: CardGateway> HttpServer<R, G> {
    /// Creates a new HTTP server with the given service.
    pub fn new(service: PaymentService<R, G>) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::default()), // 100 req/min default
        }
    }

    /// Creates a new HTTP server with custom rate limiting.
    pub fn with_rate_limit(service: PaymentService<R, G>, requests_per_minute: u32) -> Self {
        use std::time::Duration;
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::new(
                requests_per_minute,
                Duration::from_secs(60),
            )),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/health", get(handlers::health))
            .route("/api/bootstrap", post(handlers::bootstrap::<R, G>))
            .route("/api/keys", post(handlers::create_api_key::<R, G>))
            .route("/api/keys", get(handlers::list_api_keys::<R, G>))
            .route("/api/keys/{id}", axum::routing::delete(handlers::delete_api_key::<R, G>))
            .route(
                "/api/payments/initiate",
                post(handlers::initiate_session::<R, G>),
            )
            .route("/api/payments/charge", post(handlers::charge::<R, G>))
            .route("/api/payments/cash", post(handlers::confirm_cash::<R, G>))
            .route(
                "/api/payments/status/{transaction_id}",
                get(handlers::check_status::<R, G>),
            )
            .route("/api/payments/history", get(handlers::history::<R, G>))
            .route("/api/payments/refund", post(handlers::refund::<R, G>))
            .route(
                "/api/payments/webhook/gateway",
                post(handlers::gateway_webhook::<R, G>),
            )
            .route(
                "/api/payments/methods",
                get(handlers::payment_methods::<R, G>),
            )
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth_middleware::<R, G>,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone());

        api.merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
