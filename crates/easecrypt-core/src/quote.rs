//! Quote engine.
//!
//! A quote prices a fiat amount against a captured rate:
//!
//! - `service_fee = floor(amount * service_fee_bps / 10_000)`
//! - `network_fee` is a flat charge
//! - `total_cost = amount + service_fee + network_fee`
//! - `crypto_amount = floor(amount * 10^decimals / rate)`, in the token's
//!   smallest on-chain unit
//!
//! All arithmetic is integer or `Decimal`; nothing passes through `f64`.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::validation::ValidationErrors;
use crate::{CryptoRate, TokenSymbol};

/// Default service fee: 1%.
pub const DEFAULT_SERVICE_FEE_BPS: i64 = 100;

/// Default flat network fee in kobo (₦50).
pub const DEFAULT_NETWORK_FEE_MINOR: i64 = 5_000;

/// Default quote validity window (10 minutes).
pub const DEFAULT_QUOTE_VALIDITY_SECONDS: i64 = 600;

/// Fees and validity applied to every quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Service fee in basis points of the fiat amount.
    pub service_fee_bps: i64,
    /// Flat network fee in kobo.
    pub network_fee_minor: i64,
    /// How long a quote stays valid.
    pub quote_validity_seconds: i64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            service_fee_bps: DEFAULT_SERVICE_FEE_BPS,
            network_fee_minor: DEFAULT_NETWORK_FEE_MINOR,
            quote_validity_seconds: DEFAULT_QUOTE_VALIDITY_SECONDS,
        }
    }
}

/// A priced offer, valid until `valid_until`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Token being bought.
    pub token: TokenSymbol,
    /// Fiat amount in kobo.
    pub amount_minor: i64,
    /// Price of one token in kobo at quote time.
    pub exchange_rate_minor: i64,
    /// Tokens delivered, in the token's smallest unit, as an integer string.
    pub crypto_amount: String,
    /// Service fee in kobo.
    pub service_fee_minor: i64,
    /// Network fee in kobo.
    pub network_fee_minor: i64,
    /// What the buyer pays in kobo.
    pub total_cost_minor: i64,
    /// When the quote was produced.
    pub quoted_at: DateTime<Utc>,
    /// After this instant the price is stale.
    pub valid_until: DateTime<Utc>,
}

impl Quote {
    /// Whether the quote is past its validity window at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until
    }
}

impl FeeSchedule {
    /// The service fee for an amount, rounded down.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AmountOutOfRange` on overflow.
    pub fn service_fee(&self, amount_minor: i64) -> Result<i64> {
        let fee = i128::from(amount_minor) * i128::from(self.service_fee_bps) / 10_000;
        i64::try_from(fee).map_err(|_| CoreError::AmountOutOfRange(amount_minor.to_string()))
    }

    /// Price `amount_minor` kobo of `rate.symbol` at `now`.
    ///
    /// Pure: the same inputs always produce the same quote.
    ///
    /// # Errors
    ///
    /// - `CoreError::Validation` if the amount is not positive.
    /// - `CoreError::AmountOutOfRange` if a total overflows.
    pub fn quote(&self, amount_minor: i64, rate: &CryptoRate, now: DateTime<Utc>) -> Result<Quote> {
        if amount_minor <= 0 {
            return Err(ValidationErrors::single("amount_minor", "amount must be positive").into());
        }

        let service_fee_minor = self.service_fee(amount_minor)?;
        let total_cost_minor = amount_minor
            .checked_add(service_fee_minor)
            .and_then(|t| t.checked_add(self.network_fee_minor))
            .ok_or_else(|| CoreError::AmountOutOfRange(amount_minor.to_string()))?;

        let crypto_amount = crypto_amount(rate.symbol, amount_minor, rate.price_minor)?;

        Ok(Quote {
            token: rate.symbol,
            amount_minor,
            exchange_rate_minor: rate.price_minor,
            crypto_amount,
            service_fee_minor,
            network_fee_minor: self.network_fee_minor,
            total_cost_minor,
            quoted_at: now,
            valid_until: now + Duration::seconds(self.quote_validity_seconds),
        })
    }
}

/// Tokens bought by `amount_minor` kobo at `price_minor` kobo per token,
/// in the token's smallest unit, rounded down.
///
/// # Errors
///
/// - `CoreError::InvalidRate` if the price is not positive.
/// - `CoreError::AmountOutOfRange` if the product does not fit a `Decimal`.
pub fn crypto_amount(token: TokenSymbol, amount_minor: i64, price_minor: i64) -> Result<String> {
    if price_minor <= 0 {
        return Err(CoreError::InvalidRate {
            symbol: token,
            price_minor,
        });
    }

    let scale = Decimal::from(10u64.pow(token.decimals()));
    let units = Decimal::from(amount_minor)
        .checked_mul(scale)
        .and_then(|scaled| scaled.checked_div(Decimal::from(price_minor)))
        .ok_or_else(|| CoreError::AmountOutOfRange(amount_minor.to_string()))?;

    Ok(units.floor().to_string())
}
