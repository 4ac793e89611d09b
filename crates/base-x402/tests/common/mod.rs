#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{address, Address, Bytes, TxHash, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;

use x402::{
    AuthorizationSubmitter, ChainReader, ObservedTransaction, RetryPolicy, Sleeper, SplitSignature,
    TransferWithAuthorization, X402Config, X402Error, IUSDC,
};

pub const RECIPIENT: Address = address!("1111111111111111111111111111111111111111");
pub const STRANGER: Address = address!("2222222222222222222222222222222222222222");
pub const TX_HASH: &str = "0x6b1b6bfa0e3d23f3e8a1b8a4c3e1d1a2b3c4d5e6f708192a3b4c5d6e7f809102";

pub fn config() -> X402Config {
    X402Config {
        recipient: RECIPIENT,
        exact_enabled: true,
        ..X402Config::default()
    }
}

/// Records requested delays instead of waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub fn instant_chain_retry(sleeper: Arc<RecordingSleeper>) -> RetryPolicy {
    RetryPolicy::chain_reads().with_sleeper(sleeper)
}

/// In-memory chain with one transaction.
#[derive(Default)]
pub struct FakeChain {
    /// Receipt status once visible.
    pub status: Option<bool>,
    pub tx: Option<ObservedTransaction>,
    /// Every call fails with this message.
    pub rpc_error: Option<String>,
    /// The receipt is invisible for this many polls.
    pub hidden_polls: u32,
    pub receipt_calls: AtomicU32,
    pub tx_calls: AtomicU32,
}

impl FakeChain {
    pub fn with_tx(tx: ObservedTransaction) -> Self {
        Self {
            status: Some(true),
            tx: Some(tx),
            ..Self::default()
        }
    }

    pub fn receipt_calls(&self) -> u32 {
        self.receipt_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn receipt_status(&self, _tx_hash: B256) -> Result<Option<bool>, X402Error> {
        let n = self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.rpc_error {
            return Err(X402Error::Chain(e.clone()));
        }
        if n < self.hidden_polls {
            return Ok(None);
        }
        Ok(self.status)
    }

    async fn transaction(&self, _tx_hash: B256) -> Result<Option<ObservedTransaction>, X402Error> {
        self.tx_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.rpc_error {
            return Err(X402Error::Chain(e.clone()));
        }
        Ok(self.tx.clone())
    }

    async fn latest_block(&self) -> Result<u64, X402Error> {
        match &self.rpc_error {
            Some(e) => Err(X402Error::Chain(e.clone())),
            None => Ok(12_345_678),
        }
    }
}

/// A mined `transfer(to, units)` sent to `token`.
pub fn transfer_tx(token: Address, to: Address, units: u64) -> ObservedTransaction {
    let input = IUSDC::transferCall {
        to,
        value: U256::from(units),
    }
    .abi_encode();
    ObservedTransaction {
        to: Some(token),
        input: Bytes::from(input),
    }
}

/// Records submissions; answers with a fixed hash or error.
#[derive(Default)]
pub struct FakeSubmitter {
    pub fail_with: Option<String>,
    pub submitted: Mutex<Vec<(Address, Address, U256, SplitSignature)>>,
}

pub const SETTLEMENT_TX: &str = "0xabababababababababababababababababababababababababababababababab";

#[async_trait]
impl AuthorizationSubmitter for FakeSubmitter {
    async fn submit(
        &self,
        token: Address,
        authorization: &TransferWithAuthorization,
        signature: SplitSignature,
    ) -> Result<TxHash, X402Error> {
        self.submitted
            .lock()
            .unwrap()
            .push((token, authorization.from, authorization.value, signature));
        match &self.fail_with {
            Some(e) => Err(X402Error::Chain(e.clone())),
            None => Ok(SETTLEMENT_TX.parse().unwrap()),
        }
    }
}
