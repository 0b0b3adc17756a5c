//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::middleware::map_response_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::expose_internal_details;
use crate::handlers::{health, history, quote, rates, transactions, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for the purchase API.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent gateway callbacks.
const WEBHOOK_MAX_CONCURRENT_REQUESTS: usize = 20;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// - `GET /health` - Health check
/// - `GET /rates` - Current rates, refreshed from upstream
/// - `POST /quote` - Price a purchase
/// - `POST /transactions` - Create a transaction and its payment session
/// - `GET /transactions/:id/status` - Poll a transaction
/// - `POST /transactions/:id/confirm` - Manual payment confirmation
/// - `GET /history/:wallet_address` - A wallet's purchases
/// - `POST /webhook/payment` - Gateway callback (signature verified)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;
    let environment = state.config.environment;

    let state = Arc::new(state);

    let api_routes = Router::new()
        .route("/rates", get(rates::get_rates))
        .route("/quote", post(quote::create_quote))
        .route("/transactions", post(transactions::create_transaction))
        .route("/transactions/:id/status", get(transactions::get_status))
        .route("/transactions/:id/confirm", post(transactions::confirm_payment))
        .route("/history/:wallet_address", get(history::get_history))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    let webhook_routes = Router::new()
        .route("/webhook/payment", post(webhooks::payment_webhook))
        .layer(ConcurrencyLimitLayer::new(WEBHOOK_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no limit)
        .route("/health", get(health::health))
        .merge(api_routes)
        .merge(webhook_routes)
        // Global middleware
        .layer(map_response_with_state(environment, expose_internal_details))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
