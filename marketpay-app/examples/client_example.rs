//! Client example demonstrating the full payment flow against a running server.
//!
//! Run with: cargo run -p marketpay-app --example client_example --no-default-features --features sqlite

use marketpay_client::MarketpayClient;
use marketpay_gateway::{GatewayConfig, SatimGateway};
use marketpay_hex::{PaymentService, inbound::HttpServer};
use marketpay_repo::build_repo;
use marketpay_types::domain::card::current_two_digit_year;
use marketpay_types::{
    Amount, CardNetwork, ChargeRequest, NewOrder, OrderRepository, PaymentMode, RefundRequest,
    UserId,
};
use std::net::SocketAddr;
use tempfile::tempdir;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Find an available port
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    let port = addr.port();
    drop(listener);

    // Use a temp file-backed SQLite DB
    let tmp = tempdir()?;
    let db_path = tmp.path().join("marketpay.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    println!("🚀 Starting server on port {port}...");
    println!("   Database: {db_url}");

    // Build repository (handles connection and migration)
    let repo = build_repo(&db_url).await?;

    // Seed what the out-of-scope collaborators would normally provide:
    // a placed order and an API key for its owner.
    let customer = UserId::new();
    let order = repo
        .insert_order(NewOrder {
            user_id: customer,
            provider_id: Some(UserId::new()),
            total: Amount::from_dinars(1200)?,
            payment_mode: PaymentMode::Cib,
        })
        .await?;
    let (_key, raw_key) = repo.create_api_key("demo-admin", customer, true).await?;
    println!("✅ Seeded order {} for 1200.00 DZD", order.order_number);

    // Start server in background, simulated gateway with a fixed seed
    let gateway = SatimGateway::new(GatewayConfig::simulated_for_tests(7));
    let service = PaymentService::new(repo, gateway);
    let server = HttpServer::new(service);
    let router = server.router();

    let server_addr = format!("127.0.0.1:{port}");
    tokio::spawn(async move {
        axum::serve(
            TcpListener::bind(&server_addr).await.unwrap(),
            router.into_make_service(),
        )
        .await
        .unwrap();
    });

    // Wait for server to start
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    // Create client
    let base_url = format!("http://127.0.0.1:{port}");
    let client = MarketpayClient::new(&base_url);

    // ─────────────────────────────────────────────────────────────────────────
    // Demo: Full payment flow
    // ─────────────────────────────────────────────────────────────────────────

    // Health check
    let health = client.health().await?;
    println!("✅ Server health: {health}");

    // Unauthorized without a key
    let response = client.payment_methods().await;
    assert!(response.is_err());
    println!("✅ Unauthorized without key: {}", response.unwrap_err());

    let client = client.with_api_key(raw_key);

    // Payment-method catalog
    let methods = client.payment_methods().await?;
    println!("\n📋 Payment methods:");
    for method in &methods {
        println!(
            "   - {} ({}): {} - {} DZD",
            method.name, method.id, method.limits.min, method.limits.max
        );
    }

    // A declined charge first: the 0000 suffix always hits the
    // bank-decline hook of the simulated gateway.
    let declined = client
        .charge(&ChargeRequest {
            order: order.order_number.clone(),
            card_network: CardNetwork::Cib,
            card_number: "6222222222222220000".to_string(),
            cardholder_name: "AMINE DEMO".to_string(),
            expiry_month: 6,
            expiry_year: current_two_digit_year() + 2,
            cvv: "123".to_string(),
            amount: None,
        })
        .await;
    println!("\n✅ Decline hook: {}", declined.unwrap_err());

    // Retry with the approving card
    let outcome = client
        .charge(&ChargeRequest {
            order: order.order_number.clone(),
            card_network: CardNetwork::Cib,
            card_number: "6222222222222221111".to_string(),
            cardholder_name: "AMINE DEMO".to_string(),
            expiry_month: 6,
            expiry_year: current_two_digit_year() + 2,
            cvv: "123".to_string(),
            amount: None,
        })
        .await?;
    println!(
        "✅ Charged {} DZD on card ...{} (tx={}, auth={})",
        outcome.amount, outcome.card_last4, outcome.transaction_id, outcome.authorization_code
    );

    // Status lookup
    let status = client.status(&outcome.transaction_id).await?;
    println!(
        "✅ Status: local={}, remote={}",
        status.local_status,
        status.remote_status.as_deref().unwrap_or("-")
    );

    // Refund (admin key)
    let refund = client
        .refund(&RefundRequest {
            order_id: order.id,
            amount: None,
            reason: Some("demo walkthrough".to_string()),
        })
        .await?;
    println!(
        "✅ Refunded {} DZD (refund_id={}, lands in {})",
        refund.amount, refund.refund_id, refund.estimated_delay
    );

    // History
    let history = client.history(1, 10).await?;
    println!("\n📋 Payment history ({} total):", history.pagination.total);
    for item in &history.items {
        println!(
            "   - {} {} DZD [{}] tx={}",
            item.order_number,
            item.amount,
            item.payment_status,
            item.transaction_id.as_deref().unwrap_or("-")
        );
    }

    println!("\n🎉 Example completed successfully!");

    Ok(())
}
