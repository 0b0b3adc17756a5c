//! Health check handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use easecrypt_core::{PaymentProvider, TokenSymbol};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
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

/// Health check endpoint.
///
/// Reports from memory only; never calls the price feed.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "easecrypt".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        payment_provider: state.config.payment_provider,
        priced_tokens: state.rates.priced_tokens(),
        manual_confirm_enabled: state.config.manual_confirm_enabled,
    })
}
