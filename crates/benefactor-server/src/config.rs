//! Server Configuration
//!
//! Read from the environment (after `.env` is loaded). Stripe and the admin
//! key are optional; without them the matching routes answer 503.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use rust_decimal::Decimal;

use benefactor_shop::BundlePolicy;

pub struct ServerConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    /// Built frontend to serve for non-API paths
    pub static_dir: Option<PathBuf>,
    pub admin_key: Option<String>,
    /// Public site origin, base of the checkout redirect URLs
    pub site_url: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    /// Use the in-memory gateway when Stripe keys are absent
    pub mock_payments: bool,
    pub bundle: BundlePolicy,
    pub currency: String,
}

impl ServerConfig {
    /// Defaults for everything, data under `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".into(),
            data_dir: data_dir.into(),
            static_dir: None,
            admin_key: None,
            site_url: "http://localhost:5173".into(),
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            mock_payments: false,
            bundle: BundlePolicy::default(),
            currency: "usd".into(),
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::new(var("DATA_DIR").unwrap_or_else(|| "./data".into()));

        if let Some(addr) = var("BIND_ADDR") {
            config.bind_addr = addr;
        }
        config.static_dir = var("STATIC_DIR").map(PathBuf::from);
        config.admin_key = var("ADMIN_KEY");
        if let Some(site) = var("SITE_URL") {
            config.site_url = site.trim_end_matches('/').to_string();
        }
        config.stripe_secret_key = var("STRIPE_SECRET_KEY");
        config.stripe_webhook_secret = var("STRIPE_WEBHOOK_SECRET");
        config.mock_payments = var("MOCK_PAYMENTS")
            .is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"));

        if let Some(price) = var("BUNDLE_PAIR_PRICE") {
            let price = Decimal::from_str(&price)
                .with_context(|| format!("BUNDLE_PAIR_PRICE must be a decimal, got '{price}'"))?;
            config.bundle = BundlePolicy::new(price)?;
        }
        if let Some(currency) = var("CURRENCY") {
            config.currency = currency.to_lowercase();
        }

        Ok(config)
    }

    pub fn donations_path(&self) -> PathBuf {
        self.data_dir.join("donations.json")
    }

    pub fn orders_path(&self) -> PathBuf {
        self.data_dir.join("orders.json")
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("data_dir", &self.data_dir)
            .field("static_dir", &self.static_dir)
            .field("admin_key", &redact(&self.admin_key))
            .field("site_url", &self.site_url)
            .field("stripe_secret_key", &redact(&self.stripe_secret_key))
            .field("stripe_webhook_secret", &redact(&self.stripe_webhook_secret))
            .field("mock_payments", &self.mock_payments)
            .field("bundle", &self.bundle)
            .field("currency", &self.currency)
            .finish()
    }
}

/// Non-empty environment variable
fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
