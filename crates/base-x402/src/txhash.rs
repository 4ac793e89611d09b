//! `evm-txhash` scheme: verify an already-mined USDC transfer.
//!
//! The verifier fails closed. Every uncertainty (unknown transaction, failed
//! receipt, RPC error after retries) resolves to `valid = false` with a
//! reason; nothing here returns `Err`.

use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolCall;

use crate::chain::{ChainReader, ObservedTransaction};
use crate::payment::SchemeKind;
use crate::response::{InvalidReason, VerifyResult};
use crate::retry::{Attempt, RetryPolicy};
use crate::IUSDC;

pub struct TxHashVerifier {
    chain: Arc<dyn ChainReader>,
    retry: RetryPolicy,
}

impl TxHashVerifier {
    pub fn new(chain: Arc<dyn ChainReader>) -> Self {
        Self {
            chain,
            retry: RetryPolicy::chain_reads(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Accept iff the receipt succeeded, the transaction targets `token`,
    /// its input decodes as `transfer(address,uint256)`, and the decoded
    /// recipient and value equal `recipient` and `expected` exactly.
    pub async fn verify(
        &self,
        tx_hash: &str,
        token: Address,
        recipient: Address,
        expected: U256,
    ) -> VerifyResult {
        let scheme = SchemeKind::TxHash.as_str();
        let hash: B256 = match tx_hash.trim().parse() {
            Ok(hash) => hash,
            Err(_) => {
                return VerifyResult::rejected(scheme, InvalidReason::MalformedTxHash)
                    .with_tx_hash(tx_hash)
            }
        };

        let outcome = self
            .retry
            .run(|_| self.check_once(hash, token, recipient, expected))
            .await;

        match outcome {
            Ok(()) => {
                tracing::info!(tx_hash = %hash, %recipient, amount = %expected, "tx-hash payment verified");
                VerifyResult::accepted(SchemeKind::TxHash).with_tx_hash(tx_hash)
            }
            Err(reason) => {
                tracing::info!(tx_hash = %hash, reason = %reason, "tx-hash payment rejected");
                VerifyResult::rejected(scheme, reason).with_tx_hash(tx_hash)
            }
        }
    }

    async fn check_once(
        &self,
        hash: B256,
        token: Address,
        recipient: Address,
        expected: U256,
    ) -> Attempt<(), InvalidReason> {
        // Receipt first. A failed receipt is final; a missing one is lag.
        match self.chain.receipt_status(hash).await {
            Ok(Some(true)) => {}
            Ok(Some(false)) => return Attempt::Done(Err(InvalidReason::TransactionNotSuccessful)),
            Ok(None) => return Attempt::Retry(InvalidReason::TransactionNotFound),
            Err(e) => return Attempt::Retry(InvalidReason::Rpc(e.to_string())),
        }

        let tx = match self.chain.transaction(hash).await {
            Ok(Some(tx)) => tx,
            Ok(None) => return Attempt::Retry(InvalidReason::TransactionNotFound),
            Err(e) => return Attempt::Retry(InvalidReason::Rpc(e.to_string())),
        };

        Attempt::Done(check_transfer(&tx, token, recipient, expected))
    }
}

/// The pure part of tx-hash verification, once the transaction is known to
/// have succeeded.
pub fn check_transfer(
    tx: &ObservedTransaction,
    token: Address,
    recipient: Address,
    expected: U256,
) -> Result<(), InvalidReason> {
    if tx.to != Some(token) {
        return Err(InvalidReason::WrongTokenContract);
    }

    let call = IUSDC::transferCall::abi_decode(&tx.input)
        .map_err(|_| InvalidReason::NotTransferCall)?;

    if call.to != recipient {
        return Err(InvalidReason::TransferRecipientMismatch);
    }
    if call.value != expected {
        return Err(InvalidReason::TransferAmountMismatch);
    }
    Ok(())
}
