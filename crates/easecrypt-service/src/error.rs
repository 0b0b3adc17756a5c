//! API error types and responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use easecrypt_core::{CoreError, IdError, TokenSymbol, ValidationErrors};
use easecrypt_store::StoreError;

use crate::config::Environment;
use crate::gateway::GatewayError;
use crate::ledger::LedgerError;
use crate::payments::PaymentError;
use crate::sessions::SessionError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request - malformed input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// One or more fields failed validation.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Missing or invalid webhook signature.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The operation is disabled by configuration.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// No rate is known for the token.
    #[error("no rate available for {0}")]
    RateUnavailable(TokenSymbol),

    /// The transaction is not in a state that allows the operation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The payment window closed.
    #[error("payment session expired: {0}")]
    SessionExpired(String),

    /// A required integration is not configured.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Detail of an internal error, attached to the response as an extension.
///
/// [`expose_internal_details`] copies it into the body outside production.
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

fn error_response(status: StatusCode, code: &str, message: String, details: Option<serde_json::Value>) -> Response {
    let body = ErrorResponse {
        error: ErrorBody {
            code: code.to_string(),
            message,
            details,
        },
    };
    (status, Json(body)).into_response()
}

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                "Invalid request".to_string(),
                serde_json::to_value(errors).ok(),
            ),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone(), None),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::RateUnavailable(symbol) => (
                StatusCode::NOT_FOUND,
                "rate_unavailable",
                format!("No rate available for {symbol}"),
                None,
            ),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::SessionExpired(msg) => {
                (StatusCode::CONFLICT, "session_expired", msg.clone(), None)
            }
            Self::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
                None,
            ),
            Self::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                msg.clone(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                let mut response = error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    INTERNAL_MESSAGE.to_string(),
                    None,
                );
                response
                    .extensions_mut()
                    .insert(InternalErrorDetail(msg.clone()));
                return response;
            }
        };

        error_response(status, code, message, details)
    }
}

/// Response middleware: outside production, surface internal error detail.
pub async fn expose_internal_details(
    State(environment): State<Environment>,
    response: Response,
) -> Response {
    if environment.is_production() {
        return response;
    }
    match response.extensions().get::<InternalErrorDetail>() {
        Some(InternalErrorDetail(detail)) => error_response(
            response.status(),
            "internal_error",
            INTERNAL_MESSAGE.to_string(),
            Some(serde_json::Value::String(detail.clone())),
        ),
        None => response,
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<IdError> for ApiError {
    fn from(err: IdError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound("record not found".into()),
            StoreError::Conflict(msg) | StoreError::Duplicate(msg) => Self::Conflict(msg),
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(errors) => Self::Validation(errors),
            CoreError::RateUnavailable(symbol) => Self::RateUnavailable(symbol),
            CoreError::InvalidTransition { .. }
            | CoreError::Terminal { .. }
            | CoreError::UnexpectedStatus { .. } => Self::Conflict(err.to_string()),
            CoreError::InvalidId(e) => Self::BadRequest(e.to_string()),
            CoreError::AmountOutOfRange(msg) => Self::BadRequest(msg),
            CoreError::InvalidRate { .. } | CoreError::InconsistentFees(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(id) => Self::NotFound(format!("transaction not found: {id}")),
            LedgerError::Core(e) => e.into(),
            LedgerError::Store(e) => e.into(),
            LedgerError::Contention { .. } => Self::Conflict(err.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(_) => Self::NotFound(err.to_string()),
            SessionError::Expired { .. } | SessionError::Closed(_) => {
                Self::SessionExpired(err.to_string())
            }
            SessionError::Store(e) => e.into(),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Ledger(e) => e.into(),
            PaymentError::Session(e) => e.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::MissingSignature(_) | GatewayError::InvalidSignature => {
                Self::Unauthorized(err.to_string())
            }
            GatewayError::NotConfigured(_) => Self::ServiceUnavailable(err.to_string()),
            GatewayError::Malformed(msg) => Self::BadRequest(msg),
        }
    }
}
