//! Transaction handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use easecrypt_core::{
    NewTransaction, Order, PaymentStatus, SessionId, TokenSymbol, TransactionId,
    TransactionMetadata,
};

use crate::error::ApiError;
use crate::payments::{generate_payment_reference, manual_confirmation_reference};
use crate::state::AppState;

/// Purchase request.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    /// Ticker, e.g. `"STRK"`.
    pub token_symbol: Option<String>,
    /// Fiat amount in kobo, before fees.
    pub amount_minor: Option<i64>,
    /// Destination wallet (`0x` + 64 hex digits).
    pub wallet_address: Option<String>,
    /// Optional contact email.
    pub email: Option<String>,
}

/// Where and how much to pay.
#[derive(Debug, Serialize)]
pub struct CreateTransactionResponse {
    /// New transaction.
    pub transaction_id: TransactionId,
    /// Payment session.
    pub session_id: SessionId,
    /// Reference to quote with the transfer.
    pub payment_reference: String,
    /// Account to pay into.
    pub virtual_account_number: String,
    /// Bank holding the account.
    pub bank_name: String,
    /// Account holder shown to the payer.
    pub account_name: String,
    /// Exact amount to pay in kobo, fees included.
    pub amount_minor: i64,
    /// Currency of the account.
    pub currency: String,
    /// Token bought.
    pub token_symbol: TokenSymbol,
    /// Tokens delivered, smallest unit.
    pub crypto_amount: String,
    /// End of the payment window.
    pub expires_at: DateTime<Utc>,
}

/// Quote a purchase, record it and open its payment session.
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateTransactionResponse>), ApiError> {
    let Json(request) = payload?;
    let order = Order::parse(
        request.token_symbol.as_deref(),
        request.amount_minor,
        request.wallet_address.as_deref(),
        request.email.as_deref(),
    )?;

    let now = Utc::now();
    let rate = state.rates.rate_for(order.token).await?;
    let quote = state.fees().quote(order.amount_minor, &rate, now)?;

    let reference = generate_payment_reference(now);
    let account = state
        .sessions
        .virtual_account(&reference, quote.total_cost_minor);
    let new = NewTransaction::from_quote(&order, &quote)
        .with_payment_reference(reference.clone())
        .with_virtual_account(account.account_number.clone());

    let (transaction, session) = state.payments.open(new, account)?;

    let account = session.session_data;
    Ok((
        StatusCode::CREATED,
        Json(CreateTransactionResponse {
            transaction_id: transaction.id,
            session_id: session.id,
            payment_reference: reference,
            virtual_account_number: account.account_number,
            bank_name: account.bank_name,
            account_name: account.account_name,
            amount_minor: account.amount_minor,
            currency: account.currency,
            token_symbol: transaction.token_symbol,
            crypto_amount: transaction.crypto_amount,
            expires_at: session.expires_at,
        }),
    ))
}

/// Transaction progress.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Transaction.
    pub transaction_id: TransactionId,
    /// Lifecycle state.
    pub status: PaymentStatus,
    /// Token bought.
    pub token_symbol: TokenSymbol,
    /// Tokens owed, smallest unit.
    pub crypto_amount: String,
    /// On-chain hash once delivered.
    pub transaction_hash: Option<String>,
    /// Why the transaction failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

/// Poll a transaction.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let id: TransactionId = id.parse()?;
    let transaction = state.ledger.get(&id)?;

    Ok(Json(StatusResponse {
        transaction_id: transaction.id,
        status: transaction.payment_status,
        token_symbol: transaction.token_symbol,
        failure_reason: transaction.failure_reason(),
        crypto_amount: transaction.crypto_amount,
        transaction_hash: transaction.transaction_hash,
        updated_at: transaction.updated_at,
    }))
}

/// Confirmation accepted.
#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    /// Transaction.
    pub transaction_id: TransactionId,
    /// `paid`; delivery follows asynchronously.
    pub status: PaymentStatus,
}

/// Mark a transaction paid without a gateway callback.
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ConfirmResponse>), ApiError> {
    if !state.config.manual_confirm_enabled {
        return Err(ApiError::Forbidden("manual confirmation is disabled".into()));
    }
    let id: TransactionId = id.parse()?;

    let now = Utc::now();
    let metadata = TransactionMetadata::ManualConfirmation {
        reference: manual_confirmation_reference(now),
    };
    let paid = state.payments.accept(&id, metadata, now).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ConfirmResponse {
            transaction_id: paid.id,
            status: paid.payment_status,
        }),
    ))
}
