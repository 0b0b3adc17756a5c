//! Core types for the EaseCrypt on-ramp.
//!
//! This crate holds everything that does not touch the network or disk:
//!
//! - **Identifiers**: `TransactionId`, `SessionId`
//! - **Tokens**: `TokenSymbol` and its on-chain decimals
//! - **Rates**: `CryptoRate`, the two-tier `RateCache`
//! - **Quotes**: `FeeSchedule`, `Quote`
//! - **Transactions**: `Transaction`, `PaymentStatus` and the lifecycle rules
//! - **Sessions**: `PaymentSession`, `VirtualAccount`
//! - **Validation**: `Order`, `QuoteInput`, `ValidationErrors`
//!
//! # Money
//!
//! Fiat is always an `i64` count of kobo (1 NGN = 100 kobo). Token amounts are
//! integer strings in the token's smallest unit, because 18-decimal tokens do
//! not fit an `i64` at realistic purchase sizes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod error;
pub mod ids;
pub mod quote;
pub mod rate;
pub mod session;
pub mod token;
pub mod transaction;
pub mod validation;

pub use cache::{RateCache, CURRENT_TTL_SECONDS, FALLBACK_TTL_SECONDS};
pub use error::{CoreError, Result};
pub use ids::{IdError, SessionId, TransactionId};
pub use quote::{
    crypto_amount, FeeSchedule, Quote, DEFAULT_NETWORK_FEE_MINOR, DEFAULT_QUOTE_VALIDITY_SECONDS,
    DEFAULT_SERVICE_FEE_BPS,
};
pub use rate::{default_seed_rates, CryptoRate};
pub use session::{PaymentSession, VirtualAccount, DEFAULT_SESSION_TTL_SECONDS, SETTLEMENT_CURRENCY};
pub use token::{TokenSymbol, UnsupportedToken};
pub use transaction::{
    NewTransaction, PaymentProvider, PaymentStatus, Transaction, TransactionMetadata,
    TransactionUpdate,
};
pub use validation::{
    check_amount, check_email, check_wallet_address, normalize_wallet_address, FieldViolation,
    Order, QuoteInput, ValidationErrors, MAX_AMOUNT_MINOR, MIN_AMOUNT_MINOR,
};
