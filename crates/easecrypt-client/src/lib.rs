//! EaseCrypt Client SDK.
//!
//! This crate provides a client library for front ends and integrators to
//! drive the EaseCrypt on-ramp API.
//!
//! # Example
//!
//! ```no_run
//! use easecrypt_client::{CreateTransactionRequest, EaseCryptClient};
//! use easecrypt_core::TokenSymbol;
//!
//! # async fn example() -> Result<(), easecrypt_client::ClientError> {
//! let client = EaseCryptClient::new("http://easecrypt:8080")?;
//!
//! let quote = client.quote(TokenSymbol::Strk, 1_000_000).await?;
//! println!("Pay {} kobo for {} units", quote.total_cost_minor, quote.crypto_amount);
//!
//! let created = client
//!     .create_transaction(&CreateTransactionRequest {
//!         token_symbol: TokenSymbol::Strk,
//!         amount_minor: 1_000_000,
//!         wallet_address: "0x04a1...".to_string(),
//!         email: None,
//!     })
//!     .await?;
//!
//! let status = client.wait_for_completion(&created.transaction_id).await?;
//! println!("Finished as {}", status.status);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, EaseCryptClient};
pub use error::ClientError;
pub use types::*;
