use std::fmt;

use alloy::primitives::Address;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::constants::X402_VERSION;
use crate::response::InvalidReason;

/// The proof formats this system understands.
///
/// Scheme tags arrive as free-form strings; [`SchemeKind::resolve`] is the
/// single place they are mapped onto this closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchemeKind {
    /// A settled on-chain `transfer`, proven by its transaction hash.
    #[default]
    #[serde(rename = "evm-txhash")]
    TxHash,
    /// An EIP-3009 `transferWithAuthorization`, signed offline.
    #[serde(rename = "exact")]
    Exact,
}

impl SchemeKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TxHash => "evm-txhash",
            Self::Exact => "exact",
        }
    }

    /// Map a wire tag onto a known scheme. An absent or empty tag means
    /// `evm-txhash`; anything unrecognised yields `None`.
    pub fn resolve(tag: Option<&str>) -> Option<Self> {
        match tag.map(str::trim) {
            None | Some("") => Some(Self::TxHash),
            Some("evm-txhash") => Some(Self::TxHash),
            Some("exact") => Some(Self::Exact),
            Some(_) => None,
        }
    }
}

impl fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The price quote advertised to clients.
///
/// `amount` is a human decimal string; it is only ever converted to base
/// units through [`TokenAmount`](crate::TokenAmount).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    #[serde(default)]
    pub scheme: SchemeKind,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout_seconds: Option<u64>,
    pub amount: String,
    pub recipient: Address,
    /// Falls back to the configured stablecoin when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// EIP-3009 authorization fields as they travel on the wire: every integer
/// and address is a string, never a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    pub from: String,
    pub to: String,
    pub value: String,
    pub valid_after: String,
    pub valid_before: String,
    pub nonce: String,
}

/// The client's proof, as received. The scheme tag stays a string so an
/// unknown scheme can be reported as `unsupported_scheme` instead of a
/// parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl PaymentPayload {
    pub fn tx_hash(network: &str, tx_hash: &str) -> Self {
        Self {
            scheme: Some(SchemeKind::TxHash.as_str().to_string()),
            network: Some(network.to_string()),
            payload: serde_json::json!({ "txHash": tx_hash }),
        }
    }

    pub fn exact(network: &str, authorization: &Eip3009Authorization, signature: &str) -> Self {
        Self {
            scheme: Some(SchemeKind::Exact.as_str().to_string()),
            network: Some(network.to_string()),
            payload: serde_json::json!({
                "authorization": authorization,
                "signature": signature,
            }),
        }
    }

    /// Extract the typed proof for `scheme`. A missing piece is reported with
    /// the scheme's own reason (`missing_txHash`,
    /// `missing_authorization_or_signature`).
    pub fn proof(&self, scheme: SchemeKind) -> Result<PaymentProof, InvalidReason> {
        match scheme {
            SchemeKind::TxHash => {
                let tx_hash = self
                    .payload
                    .get("txHash")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .ok_or(InvalidReason::MissingTxHash)?;
                Ok(PaymentProof::TxHash {
                    tx_hash: tx_hash.to_string(),
                })
            }
            SchemeKind::Exact => {
                let authorization = self
                    .payload
                    .get("authorization")
                    .filter(|v| !v.is_null())
                    .ok_or(InvalidReason::MissingAuthorizationOrSignature)?;
                let signature = self
                    .payload
                    .get("signature")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .ok_or(InvalidReason::MissingAuthorizationOrSignature)?;
                let authorization: Eip3009Authorization =
                    serde_json::from_value(authorization.clone())
                        .map_err(|_| InvalidReason::MalformedAuthorization)?;
                Ok(PaymentProof::Authorization {
                    authorization,
                    signature: signature.to_string(),
                })
            }
        }
    }
}

/// A scheme-specific proof, extracted from a [`PaymentPayload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentProof {
    TxHash {
        tx_hash: String,
    },
    Authorization {
        authorization: Eip3009Authorization,
        signature: String,
    },
}

/// The full envelope carried in the `X-402-Payment` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEnvelope {
    #[serde(default = "default_version")]
    pub x402_version: u32,
    pub payment_payload: PaymentPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_requirements: Option<PaymentRequirements>,
}

fn default_version() -> u32 {
    X402_VERSION
}

impl PaymentEnvelope {
    pub fn new(payload: PaymentPayload, requirements: PaymentRequirements) -> Self {
        Self {
            x402_version: X402_VERSION,
            payment_payload: payload,
            payment_requirements: Some(requirements),
        }
    }
}

/// Decode an `X-402-Payment` header. The value is JSON; base64-encoded JSON
/// is accepted as well.
pub fn decode_payment_header(header_value: &str) -> Result<PaymentEnvelope, String> {
    let trimmed = header_value.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON payload: {e}"));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| format!("header is neither JSON nor base64: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("invalid JSON payload: {e}"))
}

/// JSON-encode an envelope for the `X-402-Payment` header.
pub fn encode_payment_header(envelope: &PaymentEnvelope) -> Result<String, crate::X402Error> {
    Ok(serde_json::to_string(envelope)?)
}
