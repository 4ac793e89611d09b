use thiserror::Error;

/// Errors returned by x402 operations.
///
/// A payment that simply fails verification is not an error: verifiers
/// return a [`VerifyResult`](crate::VerifyResult) with `valid = false`.
/// These variants cover requests that cannot be evaluated at all.
#[derive(Debug, Error)]
pub enum X402Error {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("payment invalid: {0}")]
    PaymentInvalid(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("settlement failed: {0}")]
    SettlementFailed(String),

    #[error("signature error: {0}")]
    Signature(String),

    #[error("chain error: {0}")]
    Chain(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
