//! Payment gateway callbacks: signature checks and payload normalization.

use axum::http::HeaderMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use easecrypt_core::PaymentProvider;

use crate::crypto::{constant_time_eq, hmac_sha256_hex, hmac_sha512_hex};

/// Header carrying Flutterwave's signature.
pub const FLUTTERWAVE_SIGNATURE_HEADER: &str = "verif-hash";

/// Header carrying Paystack's signature.
pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Gateway callback errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The signature header is absent.
    #[error("missing {0} header")]
    MissingSignature(&'static str),

    /// The signature does not match the body.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// No secret is configured for the gateway.
    #[error("no webhook secret configured for {0}")]
    NotConfigured(PaymentProvider),

    /// The body is not a payment notification we understand.
    #[error("malformed webhook payload: {0}")]
    Malformed(String),
}

/// Header the gateway signs with.
#[must_use]
pub const fn signature_header(provider: PaymentProvider) -> &'static str {
    match provider {
        PaymentProvider::Flutterwave => FLUTTERWAVE_SIGNATURE_HEADER,
        PaymentProvider::Paystack => PAYSTACK_SIGNATURE_HEADER,
    }
}

/// Expected signature of `body` for `provider`.
#[must_use]
pub fn sign(provider: PaymentProvider, secret: &str, body: &[u8]) -> String {
    match provider {
        PaymentProvider::Flutterwave => hmac_sha256_hex(secret, body),
        PaymentProvider::Paystack => hmac_sha512_hex(secret, body),
    }
}

/// Check the signature of a callback against the raw body.
pub fn verify_signature(
    provider: PaymentProvider,
    secret: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), GatewayError> {
    let header = signature_header(provider);
    let signature = headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .ok_or(GatewayError::MissingSignature(header))?;

    let expected = sign(provider, secret, body);
    if constant_time_eq(&signature.trim().to_ascii_lowercase(), &expected) {
        Ok(())
    } else {
        Err(GatewayError::InvalidSignature)
    }
}

/// Outcome a gateway reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    /// Money arrived.
    Success,
    /// The payment failed or was reversed.
    Failed(String),
    /// Anything else (pending, processing); no action.
    Other(String),
}

impl GatewayStatus {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" | "completed" | "paid" => Self::Success,
            "failed" | "abandoned" | "reversed" | "cancelled" => Self::Failed(raw.to_string()),
            _ => Self::Other(raw.to_string()),
        }
    }
}

/// A payment notification, whatever gateway sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookPayload {
    /// Payment reference the transaction was issued with.
    pub reference: String,
    /// Reported outcome.
    pub status: GatewayStatus,
    /// Amount paid in kobo.
    pub amount_minor: i64,
}

/// Already-normalized form: `{reference, status, amount}` with amount in kobo.
#[derive(Deserialize)]
struct FlatPayload {
    reference: String,
    status: String,
    amount: i64,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Flutterwave `charge.completed`; amount in naira.
#[derive(Deserialize)]
struct FlutterwaveCharge {
    tx_ref: String,
    status: String,
    amount: Decimal,
}

/// Paystack `charge.success`; amount in kobo.
#[derive(Deserialize)]
struct PaystackCharge {
    reference: String,
    status: String,
    amount: i64,
}

impl WebhookPayload {
    /// Parse a callback body.
    ///
    /// Accepts the normalized shape as well as each gateway's native
    /// `{event, data}` envelope.
    pub fn parse(provider: PaymentProvider, body: &[u8]) -> Result<Self, GatewayError> {
        if let Ok(flat) = serde_json::from_slice::<FlatPayload>(body) {
            return Ok(Self {
                reference: flat.reference,
                status: GatewayStatus::parse(&flat.status),
                amount_minor: flat.amount,
            });
        }

        let malformed = |e: serde_json::Error| GatewayError::Malformed(e.to_string());
        match provider {
            PaymentProvider::Flutterwave => {
                let charge = serde_json::from_slice::<Envelope<FlutterwaveCharge>>(body)
                    .map_err(malformed)?
                    .data;
                let amount_minor = charge
                    .amount
                    .checked_mul(Decimal::ONE_HUNDRED)
                    .and_then(|kobo| kobo.floor().to_i64())
                    .ok_or_else(|| GatewayError::Malformed(format!("amount out of range: {}", charge.amount)))?;
                Ok(Self {
                    reference: charge.tx_ref,
                    status: GatewayStatus::parse(&charge.status),
                    amount_minor,
                })
            }
            PaymentProvider::Paystack => {
                let charge = serde_json::from_slice::<Envelope<PaystackCharge>>(body)
                    .map_err(malformed)?
                    .data;
                Ok(Self {
                    reference: charge.reference,
                    status: GatewayStatus::parse(&charge.status),
                    amount_minor: charge.amount,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn flutterwave_signature_round_trip() {
        let body = br#"{"reference":"TXN-1","status":"successful","amount":1015000}"#;
        let signature = sign(PaymentProvider::Flutterwave, "whsec", body);
        assert_eq!(signature.len(), 64);

        let ok = headers(FLUTTERWAVE_SIGNATURE_HEADER, &signature);
        assert!(verify_signature(PaymentProvider::Flutterwave, "whsec", &ok, body).is_ok());

        assert!(matches!(
            verify_signature(PaymentProvider::Flutterwave, "other", &ok, body),
            Err(GatewayError::InvalidSignature)
        ));
    }

    #[test]
    fn paystack_uses_sha512_header() {
        let body = b"{}";
        let signature = sign(PaymentProvider::Paystack, "sk_test", body);
        assert_eq!(signature.len(), 128);

        let wrong_header = headers(FLUTTERWAVE_SIGNATURE_HEADER, &signature);
        assert!(matches!(
            verify_signature(PaymentProvider::Paystack, "sk_test", &wrong_header, body),
            Err(GatewayError::MissingSignature(PAYSTACK_SIGNATURE_HEADER))
        ));

        let right = headers(PAYSTACK_SIGNATURE_HEADER, &signature.to_uppercase());
        assert!(verify_signature(PaymentProvider::Paystack, "sk_test", &right, body).is_ok());
    }

    #[test]
    fn parses_flat_payload() {
        let payload = WebhookPayload::parse(
            PaymentProvider::Paystack,
            br#"{"reference":"TXN-1","status":"success","amount":1015000}"#,
        )
        .unwrap();
        assert_eq!(payload.reference, "TXN-1");
        assert_eq!(payload.status, GatewayStatus::Success);
        assert_eq!(payload.amount_minor, 1_015_000);
    }

    #[test]
    fn parses_flutterwave_envelope_in_naira() {
        let body = br#"{"event":"charge.completed","data":{"tx_ref":"TXN-2","status":"successful","amount":10150.5}}"#;
        let payload = WebhookPayload::parse(PaymentProvider::Flutterwave, body).unwrap();
        assert_eq!(payload.reference, "TXN-2");
        assert_eq!(payload.amount_minor, 1_015_050);
    }

    #[test]
    fn parses_paystack_envelope_in_kobo() {
        let body = br#"{"event":"charge.success","data":{"reference":"TXN-3","status":"abandoned","amount":500}}"#;
        let payload = WebhookPayload::parse(PaymentProvider::Paystack, body).unwrap();
        assert_eq!(payload.status, GatewayStatus::Failed("abandoned".into()));
        assert_eq!(payload.amount_minor, 500);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            WebhookPayload::parse(PaymentProvider::Flutterwave, b"not json"),
            Err(GatewayError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_statuses_are_passive() {
        assert_eq!(GatewayStatus::parse("pending"), GatewayStatus::Other("pending".into()));
    }
}
