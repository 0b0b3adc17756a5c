//! Upstream price feeds.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use easecrypt_core::{CryptoRate, TokenSymbol};

/// Fiat currency every price is quoted in.
const VS_CURRENCY: &str = "ngn";

/// Error type for price feed operations.
#[derive(Debug, thiserror::Error)]
pub enum PriceFeedError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The feed answered with a non-success status.
    #[error("price feed returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response held no usable price for any requested token.
    #[error("price feed returned no usable prices")]
    Empty,
}

/// A source of current token prices in kobo.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Current prices for as many of `symbols` as the feed knows.
    async fn fetch(&self, symbols: &[TokenSymbol]) -> Result<Vec<CryptoRate>, PriceFeedError>;
}

/// CoinGecko `simple/price` client.
#[derive(Debug, Clone)]
pub struct CoinGeckoFeed {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoFeed {
    /// Public CoinGecko API.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.coingecko.com/api/v3";

    /// Create a feed against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, PriceFeedError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoFeed {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch(&self, symbols: &[TokenSymbol]) -> Result<Vec<CryptoRate>, PriceFeedError> {
        let ids: Vec<&str> = symbols.iter().map(TokenSymbol::feed_id).collect();
        let url = format!("{}/simple/price", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .query(&[("ids", ids.join(",")), ("vs_currencies", VS_CURRENCY.to_string())]);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PriceFeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let prices: HashMap<String, HashMap<String, Decimal>> = response.json().await?;
        let now = Utc::now();

        let rates: Vec<CryptoRate> = prices
            .iter()
            .filter_map(|(id, quotes)| {
                let symbol = TokenSymbol::from_feed_id(id)?;
                let price = quotes.get(VS_CURRENCY)?;
                match to_kobo(*price).and_then(|kobo| CryptoRate::observed_at(symbol, kobo, now).ok()) {
                    Some(rate) => Some(rate),
                    None => {
                        tracing::warn!(token_symbol = %symbol, price = %price, "Ignoring unusable upstream price");
                        None
                    }
                }
            })
            .filter(|rate| symbols.contains(&rate.symbol))
            .collect();

        if rates.is_empty() {
            return Err(PriceFeedError::Empty);
        }
        Ok(rates)
    }
}

/// Naira price to kobo, rounded down.
fn to_kobo(price_ngn: Decimal) -> Option<i64> {
    price_ngn.checked_mul(Decimal::ONE_HUNDRED)?.floor().to_i64()
}

/// A feed that always answers with fixed prices.
///
/// Used when no upstream is configured, and in tests.
#[derive(Debug, Clone)]
pub struct StaticFeed {
    prices: HashMap<TokenSymbol, i64>,
}

impl StaticFeed {
    /// Serve `prices` (kobo per token).
    #[must_use]
    pub fn new(prices: impl IntoIterator<Item = (TokenSymbol, i64)>) -> Self {
        Self {
            prices: prices.into_iter().collect(),
        }
    }
}

#[async_trait]
impl PriceFeed for StaticFeed {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self, symbols: &[TokenSymbol]) -> Result<Vec<CryptoRate>, PriceFeedError> {
        let now = Utc::now();
        let rates: Vec<CryptoRate> = symbols
            .iter()
            .filter_map(|symbol| {
                let price = *self.prices.get(symbol)?;
                CryptoRate::observed_at(*symbol, price, now).ok()
            })
            .collect();

        if rates.is_empty() {
            return Err(PriceFeedError::Empty);
        }
        Ok(rates)
    }
}
