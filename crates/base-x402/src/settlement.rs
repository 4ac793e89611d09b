use std::sync::Arc;

use crate::config::X402Config;
use crate::eip3009::{decode_signature_hex, typed_authorization};
use crate::payment::{Eip3009Authorization, PaymentRequirements, SchemeKind};
use crate::response::SettleResult;
use crate::usdc::{AuthorizationSubmitter, SplitSignature};

/// Executes verified `exact` authorizations on-chain with the
/// facilitator-held key. Never returns `Err`: every failure is a
/// `SettleResult { success: false, reason }`.
pub struct SettlementExecutor {
    config: Arc<X402Config>,
    submitter: Option<Arc<dyn AuthorizationSubmitter>>,
}

impl SettlementExecutor {
    /// `submitter` is `None` when no settlement key is configured; every
    /// settlement then fails with `missing_settlement_private_key`.
    pub fn new(config: Arc<X402Config>, submitter: Option<Arc<dyn AuthorizationSubmitter>>) -> Self {
        Self { config, submitter }
    }

    pub fn can_settle(&self) -> bool {
        self.submitter.is_some()
    }

    pub async fn settle(
        &self,
        authorization: &Eip3009Authorization,
        signature: &str,
        requirements: &PaymentRequirements,
    ) -> SettleResult {
        let Some(submitter) = &self.submitter else {
            return SettleResult::failed(SchemeKind::Exact, "missing_settlement_private_key");
        };

        let typed = match typed_authorization(authorization) {
            Ok(typed) => typed,
            Err(reason) => return SettleResult::failed(SchemeKind::Exact, reason.to_string()),
        };
        let split = match decode_signature_hex(signature).and_then(|b| SplitSignature::from_bytes(&b)) {
            Ok(split) => split,
            Err(e) => return SettleResult::failed(SchemeKind::Exact, e.to_string()),
        };
        let token = requirements.token_address.unwrap_or(self.config.token_address);

        match submitter.submit(token, &typed, split).await {
            Ok(tx_hash) => {
                tracing::info!(
                    payer = %typed.from,
                    amount = %typed.value,
                    tx = %tx_hash,
                    "authorization settled on-chain"
                );
                SettleResult::settled(SchemeKind::Exact, tx_hash.to_string())
            }
            Err(e) => {
                tracing::warn!(payer = %typed.from, error = %e, "settlement failed");
                SettleResult::failed(SchemeKind::Exact, e.to_string())
            }
        }
    }
}
