//! Common test utilities for easecrypt integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_test::TestServer;
use serde_json::{json, Value};

use easecrypt_core::TokenSymbol;
use easecrypt_service::{
    create_router, AppState, ServiceConfig, SimulatedTransfer, StaticFeed, TransferExecutor,
    TransferWorker,
};
use easecrypt_store::InMemoryStore;

/// A valid destination wallet.
pub const WALLET: &str = "0x04a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f";

/// BTC price used by the harness feed (₦95,420,000).
pub const BTC_PRICE_MINOR: i64 = 9_542_000_000;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Shared state, for inspecting the ledger directly.
    pub state: AppState,
}

impl TestHarness {
    /// A development harness with fast simulated transfers.
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    /// A harness over `config`, forcing test-friendly rates and settlement.
    pub fn with_config(config: ServiceConfig) -> Self {
        Self::build(
            config,
            Arc::new(SimulatedTransfer::new(Duration::from_millis(20))),
        )
    }

    /// A harness whose transfers always fail.
    pub fn with_failing_transfers() -> Self {
        Self::build(
            ServiceConfig::default(),
            Arc::new(SimulatedTransfer::failing(Duration::from_millis(5), "relayer offline")),
        )
    }

    fn build(mut config: ServiceConfig, executor: Arc<dyn TransferExecutor>) -> Self {
        config.listen_addr = "127.0.0.1:0".into();
        // Only BTC and ETH are priced; STRK stays unavailable.
        config.seed_rates = vec![(TokenSymbol::Eth, 528_000_000)];
        let feed = StaticFeed::new([(TokenSymbol::Btc, BTC_PRICE_MINOR)]);

        let (state, jobs) = AppState::new(config, Arc::new(InMemoryStore::new()), Arc::new(feed));
        TransferWorker::new(jobs, executor, state.ledger.clone()).start();

        let router: Router = create_router(state.clone());
        let server = TestServer::new(router).expect("Failed to create test server");

        Self { server, state }
    }

    /// Create a BTC purchase and return the response body.
    pub async fn create_transaction(&self, amount_minor: i64) -> Value {
        let response = self
            .server
            .post("/transactions")
            .json(&json!({
                "token_symbol": "BTC",
                "amount_minor": amount_minor,
                "wallet_address": WALLET,
                "email": "buyer@example.com",
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json()
    }

    /// Poll the status endpoint until the transaction leaves `paid` or the
    /// deadline passes.
    pub async fn wait_for_settlement(&self, transaction_id: &str) -> Value {
        for _ in 0..100 {
            let body: Value = self
                .server
                .get(&format!("/transactions/{transaction_id}/status"))
                .await
                .json();
            if body["status"] != "paid" && body["status"] != "pending" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("transaction {transaction_id} did not settle");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
