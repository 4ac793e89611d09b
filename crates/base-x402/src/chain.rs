use std::future::IntoFuture;
use std::time::Duration;

use alloy::consensus::Transaction as _;
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::Provider;
use async_trait::async_trait;

use crate::X402Error;

/// Per-call ceiling on any single RPC request.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// The parts of a mined transaction the tx-hash verifier inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTransaction {
    /// `None` for contract creations.
    pub to: Option<Address>,
    pub input: Bytes,
}

/// Read-only chain access.
///
/// `Ok(None)` means the node does not (yet) know the transaction; callers
/// treat that as propagation lag and retry.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Receipt status: `Some(true)` if the transaction succeeded.
    async fn receipt_status(&self, tx_hash: B256) -> Result<Option<bool>, X402Error>;

    async fn transaction(&self, tx_hash: B256) -> Result<Option<ObservedTransaction>, X402Error>;

    async fn latest_block(&self) -> Result<u64, X402Error>;
}

/// [`ChainReader`] over an alloy provider.
pub struct RpcChainReader<P> {
    provider: P,
    timeout: Duration,
}

impl<P> RpcChainReader<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            timeout: RPC_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

async fn bounded<T, E, F>(timeout: Duration, what: &str, call: F) -> Result<T, X402Error>
where
    F: IntoFuture<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| X402Error::Chain(format!("{what} timed out after {}s", timeout.as_secs())))?
        .map_err(|e| X402Error::Chain(format!("{what} failed: {e}")))
}

#[async_trait]
impl<P> ChainReader for RpcChainReader<P>
where
    P: Provider + Send + Sync,
{
    async fn receipt_status(&self, tx_hash: B256) -> Result<Option<bool>, X402Error> {
        let receipt = bounded(
            self.timeout,
            "eth_getTransactionReceipt",
            self.provider.get_transaction_receipt(tx_hash),
        )
        .await?;
        Ok(receipt.map(|r| r.status()))
    }

    async fn transaction(&self, tx_hash: B256) -> Result<Option<ObservedTransaction>, X402Error> {
        let tx = bounded(
            self.timeout,
            "eth_getTransactionByHash",
            self.provider.get_transaction_by_hash(tx_hash),
        )
        .await?;
        Ok(tx.map(|tx| ObservedTransaction {
            to: tx.to(),
            input: tx.input().clone(),
        }))
    }

    async fn latest_block(&self) -> Result<u64, X402Error> {
        bounded(self.timeout, "eth_blockNumber", self.provider.get_block_number()).await
    }
}
