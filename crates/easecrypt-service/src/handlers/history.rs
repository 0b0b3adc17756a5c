//! Wallet history handlers.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use easecrypt_core::{check_wallet_address, normalize_wallet_address, ValidationErrors};

use crate::error::ApiError;
use crate::ledger::{TransactionPage, DEFAULT_PAGE_SIZE};
use crate::state::AppState;

/// History query parameters.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of transactions to return (default: 50, max: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}

/// A wallet's purchases, newest first.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(wallet_address): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<TransactionPage>, ApiError> {
    let Query(query) = query?;
    check_wallet_address(&wallet_address)
        .map_err(|msg| ValidationErrors::single("wallet_address", msg))?;
    let wallet_address = normalize_wallet_address(&wallet_address);

    let page = state
        .ledger
        .list_by_wallet(&wallet_address, query.limit, query.offset)?;
    Ok(Json(page))
}
