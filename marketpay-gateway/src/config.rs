//! Gateway configuration.
//!
//! Built by the application wiring and injected at construction; the
//! adapter never reads ambient globals, so every mode is testable in
//! isolation.

use std::time::Duration;

use marketpay_types::domain::{Amount, PaymentLimits};

/// Operating mode of the gateway adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    /// No network calls; deterministic test hooks plus seeded randomness.
    Simulated,
    /// Signed HTTP calls against the acquirer's test environment.
    Sandbox,
    /// Signed HTTP calls against the live acquirer.
    Production,
}

impl std::str::FromStr for GatewayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulated" | "simulation" => Ok(GatewayMode::Simulated),
            "sandbox" | "test" => Ok(GatewayMode::Sandbox),
            "production" | "live" => Ok(GatewayMode::Production),
            other => Err(format!("unknown gateway mode: {other}")),
        }
    }
}

/// Everything the adapter needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub mode: GatewayMode,
    /// Base URL of the acquirer REST surface (sandbox/production only)
    pub base_url: String,
    pub merchant_id: String,
    pub terminal_id: String,
    pub secret_key: String,
    pub limits: PaymentLimits,
    /// Hard deadline on every outbound call
    pub timeout: Duration,
    /// Artificial latency interval for the simulated mode, milliseconds
    pub sim_delay_ms: (u64, u64),
    /// Success probabilities for simulated session/charge/refund draws;
    /// card-suffix hooks always win over these
    pub sim_success_rates: SimSuccessRates,
    /// Seed for the simulated outcome distribution; random when absent
    pub sim_seed: Option<u64>,
}

/// Success probabilities of the simulated outcome draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimSuccessRates {
    pub session: f64,
    pub charge: f64,
    pub refund: f64,
}

impl Default for SimSuccessRates {
    fn default() -> Self {
        Self {
            session: 0.95,
            charge: 0.90,
            refund: 0.95,
        }
    }
}

impl SimSuccessRates {
    /// Every draw succeeds; only the card-suffix hooks can fail.
    pub fn always() -> Self {
        Self {
            session: 1.0,
            charge: 1.0,
            refund: 1.0,
        }
    }

    /// Every draw fails, for exercising the decline paths.
    pub fn never() -> Self {
        Self {
            session: 0.0,
            charge: 0.0,
            refund: 0.0,
        }
    }
}

impl GatewayConfig {
    fn default_limits() -> PaymentLimits {
        PaymentLimits {
            min: Amount::from_dinars(100).expect("static amount"),
            max: Amount::from_dinars(500_000).expect("static amount"),
        }
    }

    /// Simulated-mode configuration with production-shaped defaults.
    pub fn simulated() -> Self {
        Self {
            mode: GatewayMode::Simulated,
            base_url: String::new(),
            merchant_id: "SIMULATED".to_string(),
            terminal_id: "SIMULATED".to_string(),
            secret_key: "simulated_secret".to_string(),
            limits: Self::default_limits(),
            timeout: Duration::from_secs(30),
            sim_delay_ms: (200, 900),
            sim_success_rates: SimSuccessRates::default(),
            sim_seed: None,
        }
    }

    /// Simulated-mode configuration for tests: zero delay, fixed seed,
    /// and only the card-suffix hooks produce failures.
    pub fn simulated_for_tests(seed: u64) -> Self {
        Self {
            sim_delay_ms: (0, 0),
            sim_success_rates: SimSuccessRates::always(),
            sim_seed: Some(seed),
            ..Self::simulated()
        }
    }

    /// Remote-mode configuration against the given environment.
    pub fn remote(
        mode: GatewayMode,
        base_url: impl Into<String>,
        merchant_id: impl Into<String>,
        terminal_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            merchant_id: merchant_id.into(),
            terminal_id: terminal_id.into(),
            secret_key: secret_key.into(),
            limits: Self::default_limits(),
            timeout: Duration::from_secs(30),
            sim_delay_ms: (0, 0),
            sim_success_rates: SimSuccessRates::default(),
            sim_seed: None,
        }
    }

    pub fn with_limits(mut self, limits: PaymentLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("simulated".parse::<GatewayMode>(), Ok(GatewayMode::Simulated));
        assert_eq!("SANDBOX".parse::<GatewayMode>(), Ok(GatewayMode::Sandbox));
        assert_eq!("live".parse::<GatewayMode>(), Ok(GatewayMode::Production));
        assert!("staging".parse::<GatewayMode>().is_err());
    }

    #[test]
    fn test_remote_trims_trailing_slash() {
        let config = GatewayConfig::remote(
            GatewayMode::Sandbox,
            "https://test.satim.dz/",
            "m",
            "t",
            "s",
        );
        assert_eq!(config.base_url, "https://test.satim.dz");
    }
}
