//! Rate handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

/// One token's price.
#[derive(Debug, Serialize)]
pub struct RateResponse {
    /// Price of one token in kobo.
    pub price_minor: i64,
    /// When the price was observed.
    pub last_updated: DateTime<Utc>,
}

/// Current rates keyed by ticker.
///
/// Refreshes from upstream first; an upstream outage serves cached rates.
pub async fn get_rates(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, RateResponse>> {
    let rates = state.rates.refresh().await;

    Json(
        rates
            .into_iter()
            .map(|rate| {
                (
                    rate.symbol.to_string(),
                    RateResponse {
                        price_minor: rate.price_minor,
                        last_updated: rate.last_updated,
                    },
                )
            })
            .collect(),
    )
}
