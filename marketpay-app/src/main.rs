//! # Marketpay Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter and gateway adapter
//! - Create the payment service and notification worker
//! - Start the HTTP server

mod config;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketpay_gateway::SatimGateway;
use marketpay_hex::{PaymentService, inbound::HttpServer};
use marketpay_repo::{build_repo, notify::NotificationWorker};

fn init_tracer() -> (sdktrace::Tracer, sdktrace::SdkTracerProvider) {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .expect("failed to create OTLP span exporter");

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    (provider.tracer("marketpay-service"), provider)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize OpenTelemetry tracing
    let (otel_tracer, otel_provider) = init_tracer();
    let telemetry = tracing_opentelemetry::layer().with_tracer(otel_tracer);

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,marketpay_app=debug,marketpay_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting marketpay server on port {}", config.port);
    tracing::info!("Using database: {}", config.database_url);
    tracing::info!("Gateway mode: {:?}", config.gateway.mode);

    // Build repository (handles connection and migration)
    let repo = build_repo(&config.database_url).await?;

    // Notification worker drains the queue over its own pool
    if let Some(notify_url) = config.notify_url.clone() {
        let worker_repo = build_repo(&config.database_url).await?;
        tokio::spawn(NotificationWorker::new(worker_repo, notify_url).run());
    } else {
        tracing::warn!("NOTIFY_PUSH_URL not set; payment notifications stay queued");
    }

    // Create the payment service over the configured gateway
    let gateway = SatimGateway::new(config.gateway);
    let service = PaymentService::new(repo, gateway);

    // Create and run the HTTP server
    let server = HttpServer::new(service);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    let _ = otel_provider.shutdown();
    Ok(())
}
