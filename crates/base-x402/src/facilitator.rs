//! The verify/settle capability, local or remote.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::dispatcher::VerificationDispatcher;
use crate::payment::{PaymentPayload, PaymentProof, PaymentRequirements};
use crate::response::{SettleResult, VerifyResult};
use crate::settlement::SettlementExecutor;
use crate::X402Error;

/// Something that can verify and settle payment proofs.
///
/// `Ok` with `valid = false` / `success = false` is a verdict about the
/// payment. `Err` means no verdict could be reached (upstream unreachable,
/// malformed exchange).
#[async_trait]
pub trait Facilitator: Send + Sync {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResult, X402Error>;

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResult, X402Error>;
}

/// In-process facilitator: the dispatcher plus the settlement executor.
pub struct LocalFacilitator {
    dispatcher: VerificationDispatcher,
    settlement: SettlementExecutor,
}

impl LocalFacilitator {
    pub fn new(dispatcher: VerificationDispatcher, settlement: SettlementExecutor) -> Self {
        Self {
            dispatcher,
            settlement,
        }
    }

    pub fn dispatcher(&self) -> &VerificationDispatcher {
        &self.dispatcher
    }
}

#[async_trait]
impl Facilitator for LocalFacilitator {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResult, X402Error> {
        Ok(self.dispatcher.verify(payload, requirements).await)
    }

    /// `evm-txhash`: the transfer already happened, so settlement echoes the
    /// hash without touching state. `exact`: re-verify, then broadcast.
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResult, X402Error> {
        let tag = payload.scheme.as_deref();
        let scheme = self
            .dispatcher
            .resolve(tag)
            .ok_or_else(|| X402Error::UnsupportedScheme(tag.unwrap_or_default().to_string()))?;

        let proof = payload
            .proof(scheme)
            .map_err(|reason| X402Error::MalformedRequest(reason.to_string()))?;

        match proof {
            PaymentProof::TxHash { tx_hash } => Ok(SettleResult::settled(scheme, tx_hash)),
            PaymentProof::Authorization {
                authorization,
                signature,
            } => {
                let verdict = self.dispatcher.verify(payload, requirements).await;
                if !verdict.valid {
                    return Ok(SettleResult::failed(
                        scheme,
                        verdict.reason.unwrap_or_else(|| "invalid_payment".to_string()),
                    ));
                }
                Ok(self
                    .settlement
                    .settle(&authorization, &signature, requirements)
                    .await)
            }
        }
    }
}

/// Run settlement as a detached task after access was already granted.
///
/// The outcome only reaches `on_done` (logs, metrics). It can never change
/// the response the client already received.
pub fn spawn_settlement<F>(
    facilitator: Arc<dyn Facilitator>,
    payload: PaymentPayload,
    requirements: PaymentRequirements,
    on_done: F,
) -> JoinHandle<()>
where
    F: FnOnce(&Result<SettleResult, X402Error>) + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = facilitator.settle(&payload, &requirements).await;
        match &outcome {
            Ok(result) if result.success => {
                tracing::info!(
                    scheme = result.scheme.as_deref().unwrap_or_default(),
                    tx = result.tx_hash.as_deref().unwrap_or_default(),
                    "background settlement completed"
                );
            }
            Ok(result) => {
                tracing::warn!(
                    scheme = result.scheme.as_deref().unwrap_or_default(),
                    reason = result.reason.as_deref().unwrap_or_default(),
                    "background settlement failed (access already granted)"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "background settlement errored (access already granted)");
            }
        }
        on_done(&outcome);
    })
}
