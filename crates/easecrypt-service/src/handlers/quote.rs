//! Quote handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use easecrypt_core::{Quote, QuoteInput};

use crate::error::ApiError;
use crate::state::AppState;

/// Quote request.
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    /// Ticker, e.g. `"BTC"`.
    pub token_symbol: Option<String>,
    /// Fiat amount in kobo.
    pub amount_minor: Option<i64>,
}

/// Price a purchase.
pub async fn create_quote(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<Json<Quote>, ApiError> {
    let Json(request) = payload?;
    let input = QuoteInput::parse(request.token_symbol.as_deref(), request.amount_minor)?;

    let rate = state.rates.rate_for(input.token).await?;
    let quote = state.fees().quote(input.amount_minor, &rate, Utc::now())?;

    tracing::debug!(
        token_symbol = %quote.token,
        amount_minor = quote.amount_minor,
        total_cost_minor = quote.total_cost_minor,
        "Quote issued"
    );
    Ok(Json(quote))
}
