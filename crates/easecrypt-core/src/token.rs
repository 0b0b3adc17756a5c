//! Supported tokens.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A token the on-ramp can sell.
///
/// Serialized as its ticker (`"BTC"`, `"ETH"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TokenSymbol {
    /// Bitcoin (bridged).
    Btc,
    /// Ether.
    Eth,
    /// USD Coin.
    Usdc,
    /// Starknet token.
    Strk,
}

impl TokenSymbol {
    /// Every supported token, in display order.
    pub const ALL: [Self; 4] = [Self::Btc, Self::Eth, Self::Usdc, Self::Strk];

    /// Ticker as used on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Eth => "ETH",
            Self::Usdc => "USDC",
            Self::Strk => "STRK",
        }
    }

    /// Number of decimals of the token's smallest on-chain unit.
    #[must_use]
    pub const fn decimals(&self) -> u32 {
        match self {
            Self::Btc => 8,
            Self::Usdc => 6,
            Self::Eth | Self::Strk => 18,
        }
    }

    /// Identifier used by the upstream price feed.
    #[must_use]
    pub const fn feed_id(&self) -> &'static str {
        match self {
            Self::Btc => "bitcoin",
            Self::Eth => "ethereum",
            Self::Usdc => "usd-coin",
            Self::Strk => "starknet",
        }
    }

    /// Look a token up by its price-feed identifier.
    #[must_use]
    pub fn from_feed_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.feed_id() == id)
    }
}

impl FromStr for TokenSymbol {
    type Err = UnsupportedToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnsupportedToken(s.to_string()))
    }
}

impl fmt::Display for TokenSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TokenSymbol {
    type Error = UnsupportedToken;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TokenSymbol> for String {
    fn from(symbol: TokenSymbol) -> Self {
        symbol.as_str().to_string()
    }
}

/// The given ticker is not one the on-ramp sells.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported token symbol: {0}")]
pub struct UnsupportedToken(pub String);
