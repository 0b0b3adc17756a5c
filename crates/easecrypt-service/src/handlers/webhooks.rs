//! Payment gateway webhook handler.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use easecrypt_core::{PaymentStatus, Transaction, TransactionId, TransactionMetadata};

use crate::error::ApiError;
use crate::gateway::{verify_signature, GatewayError, GatewayStatus, WebhookPayload};
use crate::ledger::LedgerError;
use crate::payments::PaymentError;
use crate::sessions::SessionError;
use crate::state::AppState;

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Always true once the callback is authenticated and understood.
    pub received: bool,
    /// Transaction the callback referred to.
    pub transaction_id: TransactionId,
    /// Its status after handling.
    pub status: PaymentStatus,
    /// Whether this callback changed the transaction.
    pub processed: bool,
}

impl WebhookResponse {
    fn new(transaction: &Transaction, processed: bool) -> Self {
        Self {
            received: true,
            transaction_id: transaction.id,
            status: transaction.payment_status,
            processed,
        }
    }
}

/// Handle a payment notification from the configured gateway.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let provider = state.config.payment_provider;

    match state.config.webhook_secret() {
        Some(secret) => verify_signature(provider, secret, &headers, &body).map_err(|e| {
            tracing::warn!(provider = %provider, error = %e, "Rejected payment webhook");
            e
        })?,
        None if state.config.environment.is_production() => {
            tracing::error!(provider = %provider, "Webhook secret not configured, refusing payment webhook");
            return Err(GatewayError::NotConfigured(provider).into());
        }
        None => {
            tracing::warn!(provider = %provider, "Webhook secret not configured - skipping signature verification");
        }
    }

    let payload = WebhookPayload::parse(provider, &body)?;
    tracing::info!(
        provider = %provider,
        reference = %payload.reference,
        amount_minor = payload.amount_minor,
        status = ?payload.status,
        "Received payment webhook"
    );

    let transaction = state
        .ledger
        .find_by_reference(&payload.reference)?
        .ok_or_else(|| {
            ApiError::NotFound(format!("no transaction with reference {}", payload.reference))
        })?;

    if transaction.payment_status != PaymentStatus::Pending {
        tracing::debug!(
            transaction_id = %transaction.id,
            status = %transaction.payment_status,
            "Duplicate payment webhook ignored"
        );
        return Ok(Json(WebhookResponse::new(&transaction, false)));
    }

    let id = transaction.id;
    let outcome = match payload.status {
        GatewayStatus::Success if payload.amount_minor >= transaction.total_cost_minor => {
            let metadata = TransactionMetadata::GatewayPayment {
                provider,
                reference: payload.reference.clone(),
                amount_minor: payload.amount_minor,
            };
            state.payments.accept(&id, metadata, Utc::now()).await
        }
        GatewayStatus::Success => state.payments.reject(
            &id,
            provider,
            format!(
                "underpaid: received {} kobo, expected {}",
                payload.amount_minor, transaction.total_cost_minor
            ),
        ),
        GatewayStatus::Failed(status) => {
            state
                .payments
                .reject(&id, provider, format!("gateway reported {status}"))
        }
        GatewayStatus::Other(status) => {
            tracing::debug!(transaction_id = %id, status = %status, "Non-final payment status, no action");
            return Ok(Json(WebhookResponse::new(&transaction, false)));
        }
    };

    match outcome {
        Ok(updated) => Ok(Json(WebhookResponse::new(&updated, true))),
        // Another callback or the sweeper got there first; the outcome is recorded.
        Err(
            PaymentError::Ledger(LedgerError::Core(_))
            | PaymentError::Session(SessionError::Expired { .. } | SessionError::Closed(_)),
        ) => {
            let current = state.ledger.get(&id)?;
            Ok(Json(WebhookResponse::new(&current, false)))
        }
        Err(e) => Err(e.into()),
    }
}
