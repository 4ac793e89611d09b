//! `exact` scheme: offline verification of EIP-3009 authorizations.
//!
//! Provides:
//! - the USDC EIP-712 domain ([`domain`]) and signing hash ([`signing_hash`])
//! - signer recovery with EIP-2 malleability protection ([`recover_signer`])
//! - client-side helpers ([`sign_authorization`], [`random_nonce`])
//! - [`AuthorizationVerifier`], which applies the ordered acceptance checks
//!
//! Nothing in this module touches the chain.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{keccak256, Address, Signature, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol_types::{Eip712Domain, SolStruct};

use crate::amount::TokenAmount;
use crate::config::X402Config;
use crate::payment::{Eip3009Authorization, PaymentRequirements, SchemeKind};
use crate::response::{InvalidReason, VerifyResult};
use crate::{TransferWithAuthorization, X402Error};

/// The token's EIP-712 domain: configured name, version and chain ID, with
/// the token contract as verifying contract.
pub fn domain(config: &X402Config, token: Address) -> Eip712Domain {
    Eip712Domain {
        name: Some(Cow::Owned(config.eip712_domain_name.clone())),
        version: Some(Cow::Owned(config.eip712_domain_version.clone())),
        chain_id: Some(U256::from(config.chain_id)),
        verifying_contract: Some(token),
        salt: None,
    }
}

pub fn signing_hash(auth: &TransferWithAuthorization, config: &X402Config, token: Address) -> B256 {
    auth.eip712_signing_hash(&domain(config, token))
}

/// Recover the address that signed `auth`. Rejects anything that is not a
/// 65-byte low-s signature.
pub fn recover_signer(
    auth: &TransferWithAuthorization,
    signature_bytes: &[u8],
    config: &X402Config,
    token: Address,
) -> Result<Address, X402Error> {
    if signature_bytes.len() != 65 {
        return Err(X402Error::Signature(format!(
            "signature must be 65 bytes, got {}",
            signature_bytes.len()
        )));
    }

    // from_raw accepts v in {0, 1, 27, 28} and rejects anything else.
    let sig = Signature::from_raw(signature_bytes)
        .map_err(|e| X402Error::Signature(format!("invalid signature: {e}")))?;

    // normalize_s yields Some only when s > n/2 (EIP-2).
    if sig.normalize_s().is_some() {
        return Err(X402Error::Signature(
            "high-s signature rejected (EIP-2 malleability)".to_string(),
        ));
    }

    let hash = signing_hash(auth, config, token);
    sig.recover_address_from_prehash(&hash)
        .map_err(|e| X402Error::Signature(format!("recovery failed: {e}")))
}

pub fn decode_signature_hex(signature: &str) -> Result<Vec<u8>, X402Error> {
    let trimmed = signature.trim();
    alloy::hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|e| X402Error::Signature(format!("signature is not hex: {e}")))
}

/// 0x-prefixed hex of the 65-byte `r || s || v` form, v = 27 or 28.
pub fn encode_signature_hex(sig: &Signature) -> String {
    format!("0x{}", alloy::hex::encode(sig.as_bytes()))
}

/// A random 32-byte nonce (keccak256 of 32 bytes from the OS CSPRNG).
pub fn random_nonce() -> B256 {
    let mut bytes = [0u8; 32];
    rand::fill(&mut bytes);
    keccak256(bytes)
}

/// Parse wire-format authorization fields into the typed EIP-712 struct.
pub fn typed_authorization(
    auth: &Eip3009Authorization,
) -> Result<TransferWithAuthorization, InvalidReason> {
    let malformed = |_| InvalidReason::MalformedAuthorization;
    let integer = |field: &str| {
        field
            .trim()
            .parse::<U256>()
            .map_err(|_| InvalidReason::MalformedAuthorization)
    };
    Ok(TransferWithAuthorization {
        from: auth.from.trim().parse().map_err(malformed)?,
        to: auth.to.trim().parse().map_err(malformed)?,
        value: integer(&auth.value)?,
        validAfter: integer(&auth.valid_after)?,
        validBefore: integer(&auth.valid_before)?,
        nonce: auth.nonce.trim().parse().map_err(|_| InvalidReason::MalformedAuthorization)?,
    })
}

/// Sign an authorization paying exactly `requirements` from `signer`.
///
/// Returns the wire-format authorization and its hex signature, ready for
/// [`PaymentPayload::exact`](crate::PaymentPayload::exact).
pub fn sign_authorization(
    signer: &PrivateKeySigner,
    requirements: &PaymentRequirements,
    config: &X402Config,
    valid_after: u64,
    valid_before: u64,
) -> Result<(Eip3009Authorization, String), X402Error> {
    let value = TokenAmount::parse_decimal(&requirements.amount)?;
    let token = requirements.token_address.unwrap_or(config.token_address);
    let nonce = random_nonce();

    let typed = TransferWithAuthorization {
        from: signer.address(),
        to: requirements.recipient,
        value: value.base_units(),
        validAfter: U256::from(valid_after),
        validBefore: U256::from(valid_before),
        nonce,
    };
    let hash = signing_hash(&typed, config, token);
    let sig = signer
        .sign_hash_sync(&hash)
        .map_err(|e| X402Error::Signature(format!("signing failed: {e}")))?;

    let authorization = Eip3009Authorization {
        from: signer.address().to_checksum(None),
        to: requirements.recipient.to_checksum(None),
        value: value.base_units().to_string(),
        valid_after: valid_after.to_string(),
        valid_before: valid_before.to_string(),
        nonce: nonce.to_string(),
    };
    Ok((authorization, encode_signature_hex(&sig)))
}

/// Seconds since the Unix epoch. A clock before the epoch reads as the far
/// future, so every authorization is treated as expired.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(u64::MAX, |d| d.as_secs())
}

/// Verifies `exact` proofs against payment requirements.
pub struct AuthorizationVerifier {
    config: Arc<X402Config>,
}

impl AuthorizationVerifier {
    pub fn new(config: Arc<X402Config>) -> Self {
        Self { config }
    }

    pub fn verify(
        &self,
        authorization: Option<&Eip3009Authorization>,
        signature: Option<&str>,
        requirements: &PaymentRequirements,
    ) -> VerifyResult {
        self.verify_at(authorization, signature, requirements, unix_now())
    }

    /// Checks, in order, stopping at the first failure:
    /// presence, exact amount, recipient, `now >= validAfter`,
    /// `now < validBefore`, signature recovers to `from`.
    pub fn verify_at(
        &self,
        authorization: Option<&Eip3009Authorization>,
        signature: Option<&str>,
        requirements: &PaymentRequirements,
        now: u64,
    ) -> VerifyResult {
        let (authorization, signature) = match (authorization, signature) {
            (Some(a), Some(s)) if !s.is_empty() => (a, s),
            _ => {
                return VerifyResult::rejected(
                    SchemeKind::Exact.as_str(),
                    InvalidReason::MissingAuthorizationOrSignature,
                )
            }
        };

        match self.check(authorization, signature, requirements, now) {
            Ok(payer) => {
                tracing::info!(%payer, nonce = %authorization.nonce, "authorization verified");
                VerifyResult::accepted(SchemeKind::Exact)
                    .with_payer(payer)
                    .with_authorization(authorization.clone(), signature.to_string())
            }
            Err(reason) => {
                tracing::info!(from = %authorization.from, reason = %reason, "authorization rejected");
                VerifyResult::rejected(SchemeKind::Exact.as_str(), reason)
                    .with_authorization(authorization.clone(), signature.to_string())
            }
        }
    }

    fn check(
        &self,
        authorization: &Eip3009Authorization,
        signature: &str,
        requirements: &PaymentRequirements,
        now: u64,
    ) -> Result<Address, InvalidReason> {
        let expected = TokenAmount::parse_decimal(&requirements.amount)
            .map_err(|_| InvalidReason::InvalidAmount)?;
        let typed = typed_authorization(authorization)?;

        if typed.value != expected.base_units() {
            return Err(InvalidReason::AmountMismatch);
        }
        if typed.to != requirements.recipient {
            return Err(InvalidReason::RecipientMismatch);
        }

        let now = U256::from(now);
        if now < typed.validAfter {
            return Err(InvalidReason::AuthorizationNotYetValid);
        }
        if now >= typed.validBefore {
            return Err(InvalidReason::AuthorizationExpired);
        }

        let token = requirements.token_address.unwrap_or(self.config.token_address);
        let sig_bytes = decode_signature_hex(signature).map_err(|_| InvalidReason::InvalidSignature)?;
        let signer = recover_signer(&typed, &sig_bytes, &self.config, token).map_err(|e| {
            tracing::debug!(error = %e, "signature recovery failed");
            InvalidReason::InvalidSignature
        })?;
        if signer != typed.from {
            return Err(InvalidReason::InvalidSignature);
        }
        Ok(signer)
    }
}
