//! Configuration loading from environment.

use std::env;
use std::time::Duration;

use marketpay_gateway::{GatewayConfig, GatewayMode};
use marketpay_types::domain::{Amount, PaymentLimits};

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Push-gateway endpoint for payment notifications; fan-out is
    /// disabled when absent.
    pub notify_url: Option<String>,
    pub gateway: GatewayConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// `SATIM_MODE` selects the gateway mode (`simulated` by default);
    /// sandbox/production additionally require `SATIM_BASE_URL`,
    /// `SATIM_MERCHANT_ID`, `SATIM_TERMINAL_ID`, and `SATIM_SECRET_KEY`.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let notify_url = env::var("NOTIFY_PUSH_URL").ok();

        let mode: GatewayMode = env::var("SATIM_MODE")
            .unwrap_or_else(|_| "simulated".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("SATIM_MODE: {e}"))?;

        let mut gateway = match mode {
            GatewayMode::Simulated => GatewayConfig::simulated(),
            GatewayMode::Sandbox | GatewayMode::Production => GatewayConfig::remote(
                mode,
                require("SATIM_BASE_URL")?,
                require("SATIM_MERCHANT_ID")?,
                require("SATIM_TERMINAL_ID")?,
                require("SATIM_SECRET_KEY")?,
            ),
        };

        if let Some(limits) = limits_from_env()? {
            gateway = gateway.with_limits(limits);
        }
        if let Ok(secs) = env::var("SATIM_TIMEOUT_SECS") {
            gateway = gateway.with_timeout(Duration::from_secs(secs.parse()?));
        }

        Ok(Self {
            port,
            database_url,
            notify_url,
            gateway,
        })
    }
}

fn require(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{name} environment variable is required"))
}

fn limits_from_env() -> anyhow::Result<Option<PaymentLimits>> {
    let min = env::var("PAYMENT_MIN_DZD").ok();
    let max = env::var("PAYMENT_MAX_DZD").ok();
    let (Some(min), Some(max)) = (min, max) else {
        return Ok(None);
    };
    let min: Amount = min
        .parse()
        .map_err(|e| anyhow::anyhow!("PAYMENT_MIN_DZD: {e}"))?;
    let max: Amount = max
        .parse()
        .map_err(|e| anyhow::anyhow!("PAYMENT_MAX_DZD: {e}"))?;
    Ok(Some(PaymentLimits { min, max }))
}
