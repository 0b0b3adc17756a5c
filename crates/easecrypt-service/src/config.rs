//! Service configuration.

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use easecrypt_core::{
    default_seed_rates, FeeSchedule, PaymentProvider, TokenSymbol, DEFAULT_SESSION_TTL_SECONDS,
};

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Local development: relaxed webhook checks, internal error detail exposed.
    Development,
    /// Production: webhooks must be signed, internal errors are opaque.
    Production,
}

impl Environment {
    /// Whether this is a production deployment.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/easecrypt").
    pub data_dir: String,

    /// Deployment environment (default: development).
    pub environment: Environment,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Gateway whose webhooks are accepted.
    pub payment_provider: PaymentProvider,

    /// Flutterwave secret used to sign webhooks.
    pub flutterwave_secret_key: Option<String>,

    /// Paystack secret used to sign webhooks.
    pub paystack_secret_key: Option<String>,

    /// CoinGecko-compatible price API base URL. Static seed prices when unset.
    pub price_feed_url: Option<String>,

    /// CoinGecko API key (optional).
    pub coingecko_api_key: Option<String>,

    /// Custody relayer base URL. Transfers are simulated when unset.
    pub transfer_relayer_url: Option<String>,

    /// Custody relayer bearer key.
    pub transfer_relayer_key: Option<String>,

    /// Delay of a simulated transfer in milliseconds.
    pub simulated_settlement_ms: u64,

    /// Payment session lifetime in seconds.
    pub session_ttl_seconds: i64,

    /// Interval between background sweeps in seconds.
    pub sweep_interval_seconds: u64,

    /// Whether `POST /transactions/{id}/confirm` is available.
    pub manual_confirm_enabled: bool,

    /// Bank shown on virtual account details.
    pub bank_name: String,

    /// Account name shown on virtual account details.
    pub account_name: String,

    /// Fees applied to quotes.
    pub fees: FeeSchedule,

    /// Prices (kobo) served before the first successful refresh.
    /// On by default only without a live feed; `SEED_RATES` overrides.
    pub seed_rates: Vec<(TokenSymbol, i64)>,
}

/// Payment gateway secrets file structure.
#[derive(Debug, Deserialize)]
struct PaymentSecrets {
    #[serde(default)]
    flutterwave_secret_key: Option<String>,
    #[serde(default)]
    paystack_secret_key: Option<String>,
    #[serde(default)]
    transfer_relayer_key: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let (flutterwave_secret_key, paystack_secret_key, transfer_relayer_key) =
            load_payment_secrets();
        let price_feed_url = non_empty_var("PRICE_FEED_URL");

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            environment: parse_var("APP_ENV").unwrap_or(defaults.environment),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: parse_var("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: parse_var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            payment_provider: parse_var("PAYMENT_PROVIDER").unwrap_or(defaults.payment_provider),
            flutterwave_secret_key,
            paystack_secret_key,
            price_feed_url: price_feed_url.clone(),
            coingecko_api_key: non_empty_var("COINGECKO_API_KEY"),
            transfer_relayer_url: non_empty_var("TRANSFER_RELAYER_URL"),
            transfer_relayer_key,
            simulated_settlement_ms: parse_var("SIMULATED_SETTLEMENT_MS")
                .unwrap_or(defaults.simulated_settlement_ms),
            session_ttl_seconds: parse_var("SESSION_TTL_SECONDS")
                .unwrap_or(defaults.session_ttl_seconds),
            sweep_interval_seconds: parse_var("SWEEP_INTERVAL_SECONDS")
                .unwrap_or(defaults.sweep_interval_seconds),
            manual_confirm_enabled: parse_var("MANUAL_CONFIRM_ENABLED")
                .unwrap_or(defaults.manual_confirm_enabled),
            bank_name: std::env::var("BANK_NAME").unwrap_or(defaults.bank_name),
            account_name: std::env::var("ACCOUNT_NAME").unwrap_or(defaults.account_name),
            fees: defaults.fees,
            seed_rates: if parse_var("SEED_RATES").unwrap_or(price_feed_url.is_none()) {
                defaults.seed_rates
            } else {
                Vec::new()
            },
        }
    }

    /// The webhook secret of the configured gateway.
    #[must_use]
    pub fn webhook_secret(&self) -> Option<&str> {
        match self.payment_provider {
            PaymentProvider::Flutterwave => self.flutterwave_secret_key.as_deref(),
            PaymentProvider::Paystack => self.paystack_secret_key.as_deref(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = %name, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

/// Load gateway secrets from file or environment.
fn load_payment_secrets() -> (Option<String>, Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/payments.json",
        "easecrypt/.secrets/payments.json",
        "../.secrets/payments.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<PaymentSecrets>(path) {
            tracing::info!(path = %path, "Loaded payment secrets from file");
            return (
                secrets.flutterwave_secret_key,
                secrets.paystack_secret_key,
                secrets.transfer_relayer_key,
            );
        }
    }

    tracing::debug!("Payment secrets file not found, using environment variables");
    (
        non_empty_var("FLUTTERWAVE_SECRET_KEY"),
        non_empty_var("PAYSTACK_SECRET_KEY"),
        non_empty_var("TRANSFER_RELAYER_KEY"),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/easecrypt".into(),
            environment: Environment::Development,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            payment_provider: PaymentProvider::Flutterwave,
            flutterwave_secret_key: None,
            paystack_secret_key: None,
            price_feed_url: None,
            coingecko_api_key: None,
            transfer_relayer_url: None,
            transfer_relayer_key: None,
            simulated_settlement_ms: 2_000,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            sweep_interval_seconds: 60,
            manual_confirm_enabled: true,
            bank_name: "Providus Bank".into(),
            account_name: "EaseCrypt Payments".into(),
            fees: FeeSchedule::default(),
            seed_rates: default_seed_rates(),
        }
    }
}
