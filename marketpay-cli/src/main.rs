//! Marketpay CLI
//!
//! Command-line interface for the order payment API.

use anyhow::Result;
use clap::{Parser, Subcommand};

use marketpay_client::MarketpayClient;
use marketpay_types::{Amount, CardNetwork, ChargeRequest, OrderId, RefundRequest};

#[derive(Parser)]
#[command(name = "marketpay")]
#[command(author, version, about = "Order payment API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the payment API
    #[arg(
        long,
        env = "MARKETPAY_API_URL",
        default_value = "http://localhost:3000"
    )]
    api_url: String,

    /// API key for authentication
    #[arg(long, env = "MARKETPAY_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Payment operations
    Payment {
        #[command(subcommand)]
        action: PaymentCommands,
    },
    /// Bootstrap the first API key
    Bootstrap {
        /// Name for the new API key
        #[arg(long, default_value = "bootstrap-key")]
        name: String,
    },
    /// Check API health
    Health,
}

#[derive(Subcommand)]
enum PaymentCommands {
    /// Open a redirect payment session for an order
    Initiate {
        /// Order ID (UUID)
        order_id: String,
        /// Card network (CIB or EDAHABIA)
        #[arg(long, default_value = "CIB")]
        network: String,
        /// Return URL after the hosted payment form
        #[arg(long, default_value = "https://localhost/payment/return")]
        return_url: String,
    },
    /// Charge a card directly
    Charge {
        /// Order number or order ID
        order: String,
        /// Card network (CIB or EDAHABIA)
        #[arg(long, default_value = "CIB")]
        network: String,
        #[arg(long)]
        card_number: String,
        #[arg(long)]
        holder: String,
        /// Expiry month (1-12)
        #[arg(long)]
        month: u32,
        /// Two-digit expiry year
        #[arg(long)]
        year: u32,
        #[arg(long)]
        cvv: String,
        /// Optional echo of the order total, e.g. 1200.00
        #[arg(long)]
        amount: Option<String>,
    },
    /// Confirm cash-on-delivery collection
    Cash {
        /// Order number or order ID
        order: String,
    },
    /// Check the status of a transaction
    Status {
        /// Gateway transaction id
        transaction_id: String,
    },
    /// List payment history
    History {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Refund a settled order (admin key required)
    Refund {
        /// Order ID (UUID)
        order_id: String,
        /// Amount to refund, defaults to the full total
        #[arg(long)]
        amount: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// List configured payment methods
    Methods,
}

fn parse_network(value: &str) -> Result<CardNetwork> {
    match value.to_ascii_uppercase().as_str() {
        "CIB" => Ok(CardNetwork::Cib),
        "EDAHABIA" => Ok(CardNetwork::Edahabia),
        other => anyhow::bail!("unknown card network: {other} (expected CIB or EDAHABIA)"),
    }
}

fn parse_amount(value: Option<String>) -> Result<Option<Amount>> {
    value
        .map(|v| v.parse::<Amount>().map_err(|e| anyhow::anyhow!("{e}")))
        .transpose()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut client = MarketpayClient::new(&cli.api_url);
    if let Some(key) = &cli.api_key {
        client = client.with_api_key(key);
    }

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            println!("{}", if healthy { "healthy" } else { "unhealthy" });
        }
        Commands::Bootstrap { name } => {
            let api_key = client.bootstrap(&name).await?;
            println!("{api_key}");
            eprintln!("Save this key securely - it won't be shown again.");
        }
        Commands::Payment { action } => match action {
            PaymentCommands::Initiate {
                order_id,
                network,
                return_url,
            } => {
                let order_id: OrderId = order_id.parse()?;
                let session = client
                    .initiate_session(order_id, parse_network(&network)?, &return_url)
                    .await?;
                print_json(&session)?;
            }
            PaymentCommands::Charge {
                order,
                network,
                card_number,
                holder,
                month,
                year,
                cvv,
                amount,
            } => {
                let req = ChargeRequest {
                    order,
                    card_network: parse_network(&network)?,
                    card_number,
                    cardholder_name: holder,
                    expiry_month: month,
                    expiry_year: year,
                    cvv,
                    amount: parse_amount(amount)?,
                };
                let outcome = client.charge(&req).await?;
                print_json(&outcome)?;
            }
            PaymentCommands::Cash { order } => {
                let confirmation = client.confirm_cash(&order).await?;
                print_json(&confirmation)?;
            }
            PaymentCommands::Status { transaction_id } => {
                let status = client.status(&transaction_id).await?;
                print_json(&status)?;
            }
            PaymentCommands::History { page, limit } => {
                let history = client.history(page, limit).await?;
                print_json(&history)?;
            }
            PaymentCommands::Refund {
                order_id,
                amount,
                reason,
            } => {
                let req = RefundRequest {
                    order_id: order_id.parse()?,
                    amount: parse_amount(amount)?,
                    reason,
                };
                let refund = client.refund(&req).await?;
                print_json(&refund)?;
            }
            PaymentCommands::Methods => {
                let methods = client.payment_methods().await?;
                print_json(&methods)?;
            }
        },
    }

    Ok(())
}
