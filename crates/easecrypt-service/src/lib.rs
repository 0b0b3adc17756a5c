//! EaseCrypt HTTP API service.
//!
//! This crate provides the HTTP surface of the on-ramp:
//!
//! - Rates and quotes in kobo
//! - Transaction creation with a time-boxed payment session
//! - Manual and gateway-driven payment confirmation
//! - Asynchronous on-chain delivery through a transfer queue
//! - Background expiry of unpaid sessions
//!
//! # Webhooks
//!
//! The configured gateway (Flutterwave or Paystack) signs its callbacks with
//! an HMAC of the raw body. Without a secret, verification is skipped in
//! development and callbacks are refused in production.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers must be async for the router

pub mod chain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod handlers;
pub mod ledger;
pub mod payments;
pub mod rates;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod sweeper;
pub mod transfer;

pub use chain::{RelayerTransfer, SimulatedTransfer, TransferError, TransferExecutor, TransferRequest};
pub use config::{Environment, ServiceConfig};
pub use error::ApiError;
pub use feed::{CoinGeckoFeed, PriceFeed, PriceFeedError, StaticFeed};
pub use ledger::{Ledger, LedgerError, TransactionPage};
pub use routes::create_router;
pub use state::AppState;
pub use sweeper::Sweeper;
pub use transfer::{TransferQueue, TransferWorker};
