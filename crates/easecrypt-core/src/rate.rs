//! Exchange rates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::TokenSymbol;

/// Price of one whole token in kobo.
///
/// Invariant: `price_minor > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoRate {
    /// Token priced.
    pub symbol: TokenSymbol,
    /// Price of one token in kobo.
    pub price_minor: i64,
    /// When the price was observed.
    pub last_updated: DateTime<Utc>,
}

impl CryptoRate {
    /// Create a rate observed now.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidRate` if the price is not positive.
    pub fn new(symbol: TokenSymbol, price_minor: i64) -> Result<Self> {
        Self::observed_at(symbol, price_minor, Utc::now())
    }

    /// Create a rate observed at a specific instant.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidRate` if the price is not positive.
    pub fn observed_at(symbol: TokenSymbol, price_minor: i64, at: DateTime<Utc>) -> Result<Self> {
        if price_minor <= 0 {
            return Err(CoreError::InvalidRate {
                symbol,
                price_minor,
            });
        }
        Ok(Self {
            symbol,
            price_minor,
            last_updated: at,
        })
    }
}

/// Rates the service starts with before the first upstream refresh.
#[must_use]
pub fn default_seed_rates() -> Vec<(TokenSymbol, i64)> {
    vec![
        (TokenSymbol::Btc, 9_542_000_000), // ₦95,420,000
        (TokenSymbol::Eth, 528_000_000),   // ₦5,280,000
        (TokenSymbol::Usdc, 165_000),      // ₦1,650
        (TokenSymbol::Strk, 120_000),      // ₦1,200
    ]
}
