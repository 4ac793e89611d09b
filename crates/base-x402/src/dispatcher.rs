use std::sync::Arc;

use crate::amount::TokenAmount;
use crate::chain::ChainReader;
use crate::config::X402Config;
use crate::eip3009::AuthorizationVerifier;
use crate::payment::{PaymentPayload, PaymentProof, PaymentRequirements, SchemeKind};
use crate::response::{InvalidReason, VerifyResult};
use crate::retry::RetryPolicy;
use crate::txhash::TxHashVerifier;

/// Routes a payment payload to exactly one scheme verifier.
///
/// Unknown scheme tags, and `exact` while it is disabled, are rejected as
/// `unsupported_scheme` before any verifier runs.
pub struct VerificationDispatcher {
    config: Arc<X402Config>,
    tx_hash: TxHashVerifier,
    authorization: AuthorizationVerifier,
}

impl VerificationDispatcher {
    pub fn new(config: Arc<X402Config>, chain: Arc<dyn ChainReader>) -> Self {
        Self {
            tx_hash: TxHashVerifier::new(chain),
            authorization: AuthorizationVerifier::new(Arc::clone(&config)),
            config,
        }
    }

    /// Replace the chain-read retry policy of the tx-hash verifier.
    pub fn with_chain_retry(mut self, retry: RetryPolicy) -> Self {
        self.tx_hash = self.tx_hash.with_retry(retry);
        self
    }

    pub fn config(&self) -> &X402Config {
        &self.config
    }

    /// Which enabled scheme handles `tag`, if any.
    pub fn resolve(&self, tag: Option<&str>) -> Option<SchemeKind> {
        match SchemeKind::resolve(tag)? {
            SchemeKind::Exact if !self.config.exact_enabled => None,
            scheme => Some(scheme),
        }
    }

    pub async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> VerifyResult {
        let tag = payload.scheme.as_deref();
        let Some(scheme) = self.resolve(tag) else {
            let echoed = tag.unwrap_or_default().to_string();
            tracing::info!(scheme = %echoed, "unsupported payment scheme");
            return VerifyResult::rejected(echoed, InvalidReason::UnsupportedScheme);
        };

        let proof = match payload.proof(scheme) {
            Ok(proof) => proof,
            Err(reason) => return VerifyResult::rejected(scheme.as_str(), reason),
        };

        match proof {
            PaymentProof::TxHash { tx_hash } => {
                let expected = match TokenAmount::parse_decimal(&requirements.amount) {
                    Ok(amount) => amount,
                    Err(_) => {
                        return VerifyResult::rejected(scheme.as_str(), InvalidReason::InvalidAmount)
                            .with_tx_hash(tx_hash)
                    }
                };
                let token = requirements.token_address.unwrap_or(self.config.token_address);
                self.tx_hash
                    .verify(&tx_hash, token, requirements.recipient, expected.base_units())
                    .await
            }
            PaymentProof::Authorization {
                authorization,
                signature,
            } => self
                .authorization
                .verify(Some(&authorization), Some(&signature), requirements),
        }
    }
}
