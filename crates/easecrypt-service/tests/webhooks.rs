//! Payment webhook integration tests.

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use common::TestHarness;
use serde_json::{json, Value};

use easecrypt_core::{PaymentProvider, TransactionMetadata};
use easecrypt_service::config::Environment;
use easecrypt_service::gateway::{sign, FLUTTERWAVE_SIGNATURE_HEADER, PAYSTACK_SIGNATURE_HEADER};
use easecrypt_service::ServiceConfig;

const SECRET: &str = "whsec_test";

fn flutterwave() -> TestHarness {
    TestHarness::with_config(ServiceConfig {
        flutterwave_secret_key: Some(SECRET.into()),
        ..ServiceConfig::default()
    })
}

fn payload(reference: &Value, status: &str, amount: i64) -> String {
    json!({ "reference": reference, "status": status, "amount": amount }).to_string()
}

async fn post_signed(
    harness: &TestHarness,
    header: &'static str,
    provider: PaymentProvider,
    body: String,
) -> axum_test::TestResponse {
    let signature = sign(provider, SECRET, body.as_bytes());
    harness
        .server
        .post("/webhook/payment")
        .add_header(
            HeaderName::from_static(header),
            HeaderValue::from_str(&signature).unwrap(),
        )
        .text(body)
        .await
}

#[tokio::test]
async fn signed_payment_settles_transaction() {
    let harness = flutterwave();
    let created = harness.create_transaction(1_000_000).await;
    let id = created["transaction_id"].as_str().unwrap();

    let body = payload(&created["payment_reference"], "successful", 1_015_000);
    let response = post_signed(&harness, FLUTTERWAVE_SIGNATURE_HEADER, PaymentProvider::Flutterwave, body).await;

    response.assert_status_ok();
    let ack: Value = response.json();
    assert_eq!(ack["received"], true);
    assert_eq!(ack["processed"], true);
    assert_eq!(ack["status"], "paid");

    let settled = harness.wait_for_settlement(id).await;
    assert_eq!(settled["status"], "confirmed");

    let tx = harness.state.ledger.get(&id.parse().unwrap()).unwrap();
    assert!(matches!(
        tx.metadata,
        Some(TransactionMetadata::GatewayPayment { provider: PaymentProvider::Flutterwave, amount_minor: 1_015_000, .. })
    ));
}

#[tokio::test]
async fn bad_signature_is_unauthorized() {
    let harness = flutterwave();
    let created = harness.create_transaction(1_000_000).await;

    let response = harness
        .server
        .post("/webhook/payment")
        .add_header(
            HeaderName::from_static(FLUTTERWAVE_SIGNATURE_HEADER),
            HeaderValue::from_static("deadbeef"),
        )
        .text(payload(&created["payment_reference"], "successful", 1_015_000))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let missing = harness
        .server
        .post("/webhook/payment")
        .text(payload(&created["payment_reference"], "successful", 1_015_000))
        .await;
    missing.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn underpayment_fails_transaction() {
    let harness = flutterwave();
    let created = harness.create_transaction(1_000_000).await;
    let id = created["transaction_id"].as_str().unwrap();

    let body = payload(&created["payment_reference"], "successful", 1_014_999);
    let response = post_signed(&harness, FLUTTERWAVE_SIGNATURE_HEADER, PaymentProvider::Flutterwave, body).await;

    response.assert_status_ok();
    let status: Value = harness
        .server
        .get(&format!("/transactions/{id}/status"))
        .await
        .json();
    assert_eq!(status["status"], "failed");
    assert!(status["failure_reason"].as_str().unwrap().contains("underpaid"));
}

#[tokio::test]
async fn duplicate_webhooks_are_acknowledged_without_change() {
    let harness = flutterwave();
    let created = harness.create_transaction(1_000_000).await;

    let body = payload(&created["payment_reference"], "successful", 1_015_000);
    post_signed(&harness, FLUTTERWAVE_SIGNATURE_HEADER, PaymentProvider::Flutterwave, body.clone())
        .await
        .assert_status_ok();

    let again = post_signed(&harness, FLUTTERWAVE_SIGNATURE_HEADER, PaymentProvider::Flutterwave, body).await;
    again.assert_status_ok();
    let ack: Value = again.json();
    assert_eq!(ack["processed"], false);
}

#[tokio::test]
async fn unknown_reference_is_not_found() {
    let harness = flutterwave();

    let body = payload(&json!("TXN-0-NOPE00"), "successful", 1_015_000);
    post_signed(&harness, FLUTTERWAVE_SIGNATURE_HEADER, PaymentProvider::Flutterwave, body)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn paystack_native_payload_is_understood() {
    let harness = TestHarness::with_config(ServiceConfig {
        payment_provider: PaymentProvider::Paystack,
        paystack_secret_key: Some(SECRET.into()),
        ..ServiceConfig::default()
    });
    let created = harness.create_transaction(1_000_000).await;

    let body = json!({
        "event": "charge.success",
        "data": {
            "reference": created["payment_reference"],
            "status": "success",
            "amount": 1_015_000,
        }
    })
    .to_string();
    let response = post_signed(&harness, PAYSTACK_SIGNATURE_HEADER, PaymentProvider::Paystack, body).await;

    response.assert_status_ok();
    let ack: Value = response.json();
    assert_eq!(ack["status"], "paid");
}

#[tokio::test]
async fn unsigned_webhooks_are_accepted_in_development() {
    let harness = TestHarness::new();
    let created = harness.create_transaction(1_000_000).await;

    let response = harness
        .server
        .post("/webhook/payment")
        .text(payload(&created["payment_reference"], "successful", 1_015_000))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn production_without_secret_refuses_webhooks() {
    let harness = TestHarness::with_config(ServiceConfig {
        environment: Environment::Production,
        ..ServiceConfig::default()
    });
    let created = harness.create_transaction(1_000_000).await;

    let response = harness
        .server
        .post("/webhook/payment")
        .text(payload(&created["payment_reference"], "successful", 1_015_000))
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}
