use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::fmt;
use x402::X402Error;

/// Every non-2xx answer of the HTTP surface. Bodies are JSON with at least
/// an `error` field.
#[derive(Debug)]
pub enum ApiError {
    /// `X-402-Payment` header present but not decodable
    InvalidPaymentHeader(String),
    /// Request body missing or malformed
    MalformedRequest(String),
    /// Bad or missing API key
    Unauthorized,
    /// Proof checked and rejected; carries the machine-readable reason
    PaymentInvalid(String),
    /// Scheme tag not handled by this deployment
    UnsupportedScheme(String),
    /// Chain RPC or remote facilitator unreachable after retries
    Upstream(String),
    /// Verification could not reach a verdict
    VerificationFailed(String),
    /// An otherwise valid authorization could not be executed
    SettlementFailed(String),
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidPaymentHeader(msg) => write!(f, "invalid payment header: {msg}"),
            ApiError::MalformedRequest(msg) => write!(f, "malformed request: {msg}"),
            ApiError::Unauthorized => write!(f, "unauthorized"),
            ApiError::PaymentInvalid(reason) => write!(f, "payment invalid: {reason}"),
            ApiError::UnsupportedScheme(scheme) => write!(f, "unsupported scheme: {scheme}"),
            ApiError::Upstream(msg) => write!(f, "upstream unavailable: {msg}"),
            ApiError::VerificationFailed(msg) => write!(f, "verification failed: {msg}"),
            ApiError::SettlementFailed(msg) => write!(f, "settlement failed: {msg}"),
            ApiError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<X402Error> for ApiError {
    fn from(e: X402Error) -> Self {
        match e {
            X402Error::MalformedRequest(msg) => ApiError::MalformedRequest(msg),
            X402Error::Serde(e) => ApiError::MalformedRequest(e.to_string()),
            X402Error::Unauthorized => ApiError::Unauthorized,
            X402Error::PaymentInvalid(reason) => ApiError::PaymentInvalid(reason),
            X402Error::UnsupportedScheme(scheme) => ApiError::UnsupportedScheme(scheme),
            X402Error::UpstreamUnavailable(msg) => ApiError::Upstream(msg),
            X402Error::SettlementFailed(msg) => ApiError::SettlementFailed(msg),
            X402Error::Signature(msg) | X402Error::Chain(msg) | X402Error::Config(msg) => {
                ApiError::Internal(msg)
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPaymentHeader(_)
            | ApiError::MalformedRequest(_)
            | ApiError::UnsupportedScheme(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::PaymentInvalid(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::VerificationFailed(_)
            | ApiError::SettlementFailed(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::InvalidPaymentHeader(detail) => serde_json::json!({
                "error": "invalid_payment_header",
                "detail": detail
            }),
            ApiError::MalformedRequest(detail) => serde_json::json!({
                "error": "invalid_request",
                "detail": detail
            }),
            ApiError::Unauthorized => serde_json::json!({ "error": "unauthorized" }),
            ApiError::PaymentInvalid(reason) => serde_json::json!({
                "error": "payment_invalid",
                "detail": reason,
                "reason": reason
            }),
            ApiError::UnsupportedScheme(scheme) => serde_json::json!({
                "error": "unsupported_scheme",
                "detail": format!("scheme '{scheme}' is not supported"),
                "reason": "unsupported_scheme"
            }),
            ApiError::Upstream(detail) => {
                tracing::error!(detail = %detail, "upstream unavailable");
                serde_json::json!({
                    "error": "upstream_unavailable",
                    "detail": detail
                })
            }
            ApiError::VerificationFailed(detail) => {
                tracing::error!(detail = %detail, "verification failed");
                serde_json::json!({
                    "error": "verification_failed",
                    "detail": detail
                })
            }
            ApiError::SettlementFailed(reason) => serde_json::json!({
                "error": "settlement_failed",
                "success": false,
                "reason": reason
            }),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                serde_json::json!({
                    "error": "internal_error",
                    "detail": detail
                })
            }
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
