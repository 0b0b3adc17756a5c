//! Transaction lifecycle integration tests.

mod common;

use axum::http::StatusCode;
use common::{TestHarness, WALLET};
use serde_json::{json, Value};

use easecrypt_core::{PaymentStatus, TransactionMetadata};
use easecrypt_service::ServiceConfig;

#[tokio::test]
async fn create_returns_payment_instructions() {
    let harness = TestHarness::new();

    let body = harness.create_transaction(1_000_000).await;

    assert_eq!(body["amount_minor"], 1_015_000);
    assert_eq!(body["currency"], "NGN");
    assert_eq!(body["bank_name"], "Providus Bank");
    assert_eq!(body["account_name"], "EaseCrypt Payments");
    assert_eq!(body["virtual_account_number"].as_str().unwrap().len(), 10);
    assert!(body["payment_reference"].as_str().unwrap().starts_with("TXN-"));
    assert!(body["expires_at"].is_string());

    let id = body["transaction_id"].as_str().unwrap();
    let status: Value = harness
        .server
        .get(&format!("/transactions/{id}/status"))
        .await
        .json();
    assert_eq!(status["status"], "pending");
    assert_eq!(status["transaction_hash"], Value::Null);
}

#[tokio::test]
async fn manual_confirm_settles_on_chain() {
    let harness = TestHarness::new();
    let created = harness.create_transaction(1_000_000).await;
    let id = created["transaction_id"].as_str().unwrap();

    let response = harness
        .server
        .post(&format!("/transactions/{id}/confirm"))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["status"], "paid");

    let settled = harness.wait_for_settlement(id).await;
    assert_eq!(settled["status"], "confirmed");
    let hash = settled["transaction_hash"].as_str().unwrap();
    assert!(hash.starts_with("0x"));
    assert_eq!(hash.len(), 66);

    let tx = harness.state.ledger.get(&id.parse().unwrap()).unwrap();
    assert_eq!(tx.payment_reference, created["payment_reference"].as_str().map(String::from));
    assert!(matches!(
        tx.metadata,
        Some(TransactionMetadata::ManualConfirmation { ref reference }) if reference.starts_with("REF-")
    ));
}

#[tokio::test]
async fn failed_transfer_is_reported() {
    let harness = TestHarness::with_failing_transfers();
    let created = harness.create_transaction(500_000).await;
    let id = created["transaction_id"].as_str().unwrap();

    harness
        .server
        .post(&format!("/transactions/{id}/confirm"))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let settled = harness.wait_for_settlement(id).await;
    assert_eq!(settled["status"], "failed");
    assert_eq!(settled["transaction_hash"], Value::Null);
    assert_eq!(settled["failure_reason"], "transfer failed: relayer offline");
}

#[tokio::test]
async fn confirming_twice_conflicts() {
    let harness = TestHarness::new();
    let created = harness.create_transaction(1_000_000).await;
    let id = created["transaction_id"].as_str().unwrap();

    harness
        .server
        .post(&format!("/transactions/{id}/confirm"))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let response = harness
        .server
        .post(&format!("/transactions/{id}/confirm"))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn confirm_after_expiry_fails_transaction() {
    let harness = TestHarness::with_config(ServiceConfig {
        session_ttl_seconds: 0,
        ..ServiceConfig::default()
    });
    let created = harness.create_transaction(1_000_000).await;
    let id = created["transaction_id"].as_str().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let response = harness
        .server
        .post(&format!("/transactions/{id}/confirm"))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "session_expired");

    let tx = harness.state.ledger.get(&id.parse().unwrap()).unwrap();
    assert_eq!(tx.payment_status, PaymentStatus::Failed);
    assert!(matches!(tx.metadata, Some(TransactionMetadata::SessionExpired { .. })));
}

#[tokio::test]
async fn manual_confirm_can_be_disabled() {
    let harness = TestHarness::with_config(ServiceConfig {
        manual_confirm_enabled: false,
        ..ServiceConfig::default()
    });
    let created = harness.create_transaction(1_000_000).await;
    let id = created["transaction_id"].as_str().unwrap();

    harness
        .server
        .post(&format!("/transactions/{id}/confirm"))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_transaction_is_not_found() {
    let harness = TestHarness::new();
    let id = easecrypt_core::TransactionId::generate();

    harness
        .server
        .get(&format!("/transactions/{id}/status"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    harness
        .server
        .post(&format!("/transactions/{id}/confirm"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_id_is_bad_request() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/transactions/not-an-id/status")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_validates_every_field() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/transactions")
        .json(&json!({
            "token_symbol": "BTC",
            "amount_minor": 50_000_001,
            "wallet_address": "0x1234",
            "email": "not-an-email",
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    let details = body["error"]["details"].as_array().unwrap();
    assert_eq!(details.len(), 3);
}

#[tokio::test]
async fn create_accepts_bounds_inclusive() {
    let harness = TestHarness::new();

    for amount in [100_000, 50_000_000] {
        harness
            .server
            .post("/transactions")
            .json(&json!({
                "token_symbol": "BTC",
                "amount_minor": amount,
                "wallet_address": WALLET,
            }))
            .await
            .assert_status(StatusCode::CREATED);
    }
}
