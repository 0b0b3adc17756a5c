//! API handlers.

pub mod health;
pub mod history;
pub mod quote;
pub mod rates;
pub mod transactions;
pub mod webhooks;
