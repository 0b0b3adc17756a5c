//! Request and response types for the EaseCrypt client.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use easecrypt_core::{PaymentProvider, PaymentStatus, TokenSymbol, Transaction};

pub use easecrypt_core::Quote;

/// Quote request.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteRequest {
    /// Token to buy.
    pub token_symbol: TokenSymbol,
    /// Fiat amount in kobo.
    pub amount_minor: i64,
}

/// One token's price.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RateEntry {
    /// Price of one token in kobo.
    pub price_minor: i64,
    /// When the price was observed.
    pub last_updated: DateTime<Utc>,
}

/// Current rates keyed by ticker.
pub type Rates = BTreeMap<String, RateEntry>;

/// Purchase request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTransactionRequest {
    /// Token to buy.
    pub token_symbol: TokenSymbol,
    /// Fiat amount in kobo, before fees.
    pub amount_minor: i64,
    /// Destination wallet (`0x` + 64 hex digits).
    pub wallet_address: String,
    /// Optional contact email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Payment instructions for a new transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransactionResponse {
    /// New transaction.
    pub transaction_id: String,
    /// Payment session.
    pub session_id: String,
    /// Reference to quote with the bank transfer.
    pub payment_reference: String,
    /// Account to pay into.
    pub virtual_account_number: String,
    /// Bank holding the account.
    pub bank_name: String,
    /// Account holder shown to the payer.
    pub account_name: String,
    /// Exact amount to pay in kobo.
    pub amount_minor: i64,
    /// Currency.
    pub currency: String,
    /// Token bought.
    pub token_symbol: TokenSymbol,
    /// Tokens delivered, smallest unit.
    pub crypto_amount: String,
    /// End of the payment window.
    pub expires_at: DateTime<Utc>,
}

/// Transaction progress.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    /// Transaction.
    pub transaction_id: String,
    /// Lifecycle state.
    pub status: PaymentStatus,
    /// Token bought.
    pub token_symbol: TokenSymbol,
    /// Tokens owed, smallest unit.
    pub crypto_amount: String,
    /// On-chain hash once delivered.
    pub transaction_hash: Option<String>,
    /// Why the transaction failed, if it did.
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

/// Confirmation accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmResponse {
    /// Transaction.
    pub transaction_id: String,
    /// New status (`paid`).
    pub status: PaymentStatus,
}

/// One page of a wallet's history.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryPage {
    /// Transactions, newest first.
    pub transactions: Vec<Transaction>,
    /// Whether more exist past this page.
    pub has_more: bool,
}

/// Health check response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Gateway whose webhooks are accepted.
    pub payment_provider: PaymentProvider,
    /// Tokens that can be quoted without reaching the price feed.
    pub priced_tokens: Vec<TokenSymbol>,
    /// Whether operators may confirm payments by hand.
    pub manual_confirm_enabled: bool,
}

/// A violated request constraint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Violation {
    /// Offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

/// API error response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
