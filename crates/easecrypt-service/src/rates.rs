//! Rate service: the price feed in front of the two-tier cache.
//!
//! Reads never fail because the upstream is down. A failed refresh logs and
//! leaves the cache as it was; lookups fall back to the last-known-good tier.

use std::sync::Arc;

use chrono::Utc;

use easecrypt_core::{CoreError, CryptoRate, RateCache, TokenSymbol};
use easecrypt_store::Store;

use crate::feed::PriceFeed;

/// Serves rates for quoting.
#[derive(Clone)]
pub struct RateService {
    cache: Arc<RateCache>,
    feed: Arc<dyn PriceFeed>,
    store: Arc<dyn Store>,
}

impl RateService {
    /// Create a rate service.
    #[must_use]
    pub fn new(cache: Arc<RateCache>, feed: Arc<dyn PriceFeed>, store: Arc<dyn Store>) -> Self {
        Self { cache, feed, store }
    }

    /// The underlying cache.
    #[must_use]
    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    /// Load persisted rates and `seeds` into the fallback tier.
    ///
    /// Persisted rates win over seeds for the same token, unless they are
    /// older than the fallback TTL, in which case they are skipped.
    pub fn warm(&self, seeds: &[(TokenSymbol, i64)]) {
        let now = Utc::now();
        for (symbol, price) in seeds {
            match CryptoRate::observed_at(*symbol, *price, now) {
                Ok(rate) => {
                    self.cache.seed_fallback_at(rate, now);
                }
                Err(e) => tracing::warn!(error = %e, "Ignoring invalid seed rate"),
            }
        }

        match self.store.list_rates() {
            Ok(rates) => {
                let mut restored = 0;
                for rate in &rates {
                    if self.cache.seed_fallback_at(*rate, now) {
                        restored += 1;
                    } else {
                        tracing::debug!(
                            token_symbol = %rate.symbol,
                            last_updated = %rate.last_updated,
                            "Persisted rate too old to serve"
                        );
                    }
                }
                tracing::info!(
                    persisted = rates.len(),
                    restored,
                    seeded = seeds.len(),
                    "Rate cache warmed"
                );
            }
            Err(e) => tracing::warn!(error = %e, "Could not load persisted rates"),
        }
    }

    /// Pull every token from the feed into the cache.
    ///
    /// Returns the rates now servable per token (fresh, else fallback). An
    /// upstream failure is logged and never surfaces.
    pub async fn refresh(&self) -> Vec<CryptoRate> {
        match self.feed.fetch(&TokenSymbol::ALL).await {
            Ok(rates) => {
                for rate in &rates {
                    self.cache.set_current(*rate);
                    if let Err(e) = self.store.put_rate(rate) {
                        tracing::warn!(token_symbol = %rate.symbol, error = %e, "Could not persist rate");
                    }
                }
                tracing::debug!(feed = self.feed.name(), count = rates.len(), "Rates refreshed");
            }
            Err(e) => {
                tracing::warn!(feed = self.feed.name(), error = %e, "Rate refresh failed, serving cached rates");
            }
        }

        TokenSymbol::ALL
            .iter()
            .filter_map(|symbol| self.cached(*symbol))
            .collect()
    }

    /// A rate to quote `symbol` against.
    ///
    /// Resolution: fresh cache entry, then one refresh, then the fallback tier.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::RateUnavailable` when none of those has a rate.
    pub async fn rate_for(&self, symbol: TokenSymbol) -> Result<CryptoRate, CoreError> {
        if let Some(rate) = self.cache.get_current(symbol) {
            return Ok(rate);
        }

        self.refresh().await;
        self.cached(symbol).ok_or_else(|| {
            tracing::warn!(token_symbol = %symbol, "No rate available");
            CoreError::RateUnavailable(symbol)
        })
    }

    /// Tokens with a servable rate right now, without touching the feed.
    #[must_use]
    pub fn priced_tokens(&self) -> Vec<TokenSymbol> {
        TokenSymbol::ALL
            .into_iter()
            .filter(|symbol| self.cached(*symbol).is_some())
            .collect()
    }

    /// A shared handle to the cache, for the sweeper.
    #[must_use]
    pub fn cache_handle(&self) -> Arc<RateCache> {
        Arc::clone(&self.cache)
    }

    fn cached(&self, symbol: TokenSymbol) -> Option<CryptoRate> {
        self.cache
            .get_current(symbol)
            .or_else(|| self.cache.get_fallback(symbol))
    }
}
