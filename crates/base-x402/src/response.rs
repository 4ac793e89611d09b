use std::fmt;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::payment::{Eip3009Authorization, PaymentRequirements, SchemeKind};

/// Why a payment proof was rejected. Rendered as the machine-readable
/// `reason` / `invalidReason` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    MissingTxHash,
    MalformedTxHash,
    MissingAuthorizationOrSignature,
    MalformedAuthorization,
    InvalidAmount,
    AmountMismatch,
    RecipientMismatch,
    AuthorizationNotYetValid,
    AuthorizationExpired,
    InvalidSignature,
    TransactionNotFound,
    TransactionNotSuccessful,
    WrongTokenContract,
    NotTransferCall,
    TransferRecipientMismatch,
    TransferAmountMismatch,
    UnsupportedScheme,
    ProofAlreadyUsed,
    /// Chain or RPC failure that outlasted the retry budget.
    Rpc(String),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingTxHash => "missing_txHash",
            Self::MalformedTxHash => "malformed_txHash",
            Self::MissingAuthorizationOrSignature => "missing_authorization_or_signature",
            Self::MalformedAuthorization => "malformed_authorization",
            Self::InvalidAmount => "invalid_amount",
            Self::AmountMismatch => "amount_mismatch",
            Self::RecipientMismatch => "recipient_mismatch",
            Self::AuthorizationNotYetValid => "authorization_not_yet_valid",
            Self::AuthorizationExpired => "authorization_expired",
            Self::InvalidSignature => "invalid_signature",
            Self::TransactionNotFound => "transaction not found",
            Self::TransactionNotSuccessful => "transaction not successful",
            Self::WrongTokenContract => "transaction not sent to expected token contract",
            Self::NotTransferCall => "not an ERC-20 transfer call",
            Self::TransferRecipientMismatch => "transfer recipient mismatch",
            Self::TransferAmountMismatch => "transfer amount mismatch",
            Self::UnsupportedScheme => "unsupported_scheme",
            Self::ProofAlreadyUsed => "proof_already_used",
            Self::Rpc(message) => message,
        };
        f.write_str(s)
    }
}

/// Outcome of verifying one payment proof.
///
/// `valid = false` always carries a `reason`. The `scheme` is the tag of the
/// verifier that produced the result (or the raw tag, for unsupported ones).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub scheme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<Eip3009Authorization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl VerifyResult {
    pub fn accepted(scheme: SchemeKind) -> Self {
        Self {
            valid: true,
            reason: None,
            scheme: scheme.as_str().to_string(),
            tx_hash: None,
            payer: None,
            authorization: None,
            signature: None,
        }
    }

    pub fn rejected(scheme: impl Into<String>, reason: InvalidReason) -> Self {
        Self {
            valid: false,
            reason: Some(reason.to_string()),
            scheme: scheme.into(),
            tx_hash: None,
            payer: None,
            authorization: None,
            signature: None,
        }
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    pub fn with_authorization(mut self, authorization: Eip3009Authorization, signature: String) -> Self {
        self.authorization = Some(authorization);
        self.signature = Some(signature);
        self
    }

    pub fn with_payer(mut self, payer: Address) -> Self {
        self.payer = Some(payer);
        self
    }

    pub fn is_unsupported_scheme(&self) -> bool {
        !self.valid && self.reason.as_deref() == Some("unsupported_scheme")
    }
}

/// Outcome of a settlement attempt. Remote facilitators that answer in the
/// older `{valid, transactionId}` shape are read through aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResult {
    #[serde(alias = "valid")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, alias = "transactionId", skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SettleResult {
    pub fn settled(scheme: SchemeKind, tx_hash: impl Into<String>) -> Self {
        Self {
            success: true,
            scheme: Some(scheme.as_str().to_string()),
            tx_hash: Some(tx_hash.into()),
            reason: None,
        }
    }

    pub fn failed(scheme: SchemeKind, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            scheme: Some(scheme.as_str().to_string()),
            tx_hash: None,
            reason: Some(reason.into()),
        }
    }
}

/// Wire shape of `POST /payments/verify`, shared with remote facilitators.
/// Older facilitators answer with `valid` instead of `isValid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    #[serde(alias = "valid")]
    pub is_valid: bool,
    #[serde(default)]
    pub invalid_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

impl From<&VerifyResult> for VerifyResponse {
    fn from(result: &VerifyResult) -> Self {
        Self {
            is_valid: result.valid,
            invalid_reason: result.reason.clone(),
            scheme: Some(result.scheme.clone()),
        }
    }
}

impl VerifyResponse {
    /// Lift a remote answer into a [`VerifyResult`]. A remote rejection
    /// without a reason still gets one.
    pub fn into_result(self, requested: &str) -> VerifyResult {
        let scheme = self.scheme.unwrap_or_else(|| requested.to_string());
        if self.is_valid {
            VerifyResult {
                valid: true,
                reason: None,
                scheme,
                tx_hash: None,
                payer: None,
                authorization: None,
                signature: None,
            }
        } else {
            let reason = self
                .invalid_reason
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "rejected_by_facilitator".to_string());
            VerifyResult {
                valid: false,
                reason: Some(reason),
                scheme,
                tx_hash: None,
                payer: None,
                authorization: None,
                signature: None,
            }
        }
    }
}

/// One entry of `GET /payments/supported`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    pub payment_requirements: PaymentRequirements,
}

/// Body of `GET /payments/supported`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    pub x402_version: u32,
    pub supported: Vec<SupportedKind>,
}
