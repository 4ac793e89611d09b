use std::sync::Arc;
use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, TxHash, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::{TransferWithAuthorization, X402Error, IUSDC};

/// The `(v, r, s)` form of a 65-byte `r || s || v` signature, as
/// `transferWithAuthorization` takes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSignature {
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

impl SplitSignature {
    /// Bytes 0..32 are r, 32..64 are s, byte 64 is v. A recovery id of 0/1
    /// is shifted to 27/28, which is what the contract's `ecrecover` expects.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, X402Error> {
        if bytes.len() != 65 {
            return Err(X402Error::Signature(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        let v = match bytes[64] {
            v @ (0 | 1) => v + 27,
            v @ (27 | 28) => v,
            other => {
                return Err(X402Error::Signature(format!("invalid recovery byte {other}")));
            }
        };
        Ok(Self {
            v,
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..64]),
        })
    }
}

/// Broadcasts signed authorizations on-chain.
#[async_trait]
pub trait AuthorizationSubmitter: Send + Sync {
    /// Submit `transferWithAuthorization` on `token` and wait for a
    /// successful receipt. Returns the settlement transaction hash.
    async fn submit(
        &self,
        token: Address,
        authorization: &TransferWithAuthorization,
        signature: SplitSignature,
    ) -> Result<TxHash, X402Error>;
}

/// [`AuthorizationSubmitter`] over a wallet-backed alloy provider. The
/// wallet pays gas.
pub struct RpcSubmitter<P> {
    provider: P,
    send_timeout: Duration,
    receipt_timeout: Duration,
}

impl<P> RpcSubmitter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            send_timeout: Duration::from_secs(30),
            receipt_timeout: Duration::from_secs(60),
        }
    }
}

/// Build a submitter signing with `private_key` against `rpc_url`.
pub fn connect_submitter(
    private_key: &str,
    rpc_url: &str,
) -> Result<Arc<dyn AuthorizationSubmitter>, X402Error> {
    let signer: PrivateKeySigner = private_key
        .trim()
        .parse()
        .map_err(|_| X402Error::Config("SETTLEMENT_PRIVATE_KEY is not a valid private key".to_string()))?;
    let url = rpc_url
        .parse()
        .map_err(|e| X402Error::Config(format!("invalid RPC_URL: {e}")))?;

    tracing::info!(settlement_wallet = %signer.address(), "settlement wallet loaded");
    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(url);
    Ok(Arc::new(RpcSubmitter::new(provider)))
}

#[async_trait]
impl<P> AuthorizationSubmitter for RpcSubmitter<P>
where
    P: Provider + Send + Sync,
{
    async fn submit(
        &self,
        token: Address,
        authorization: &TransferWithAuthorization,
        signature: SplitSignature,
    ) -> Result<TxHash, X402Error> {
        let contract = IUSDC::new(token, &self.provider);
        let call = contract.transferWithAuthorization(
            authorization.from,
            authorization.to,
            authorization.value,
            authorization.validAfter,
            authorization.validBefore,
            authorization.nonce,
            signature.v,
            signature.r,
            signature.s,
        );

        let pending = tokio::time::timeout(self.send_timeout, call.send())
            .await
            .map_err(|_| {
                X402Error::Chain(format!(
                    "transferWithAuthorization send timed out after {}s",
                    self.send_timeout.as_secs()
                ))
            })?
            .map_err(|e| X402Error::Chain(format!("transferWithAuthorization send failed: {e}")))?;

        let receipt = tokio::time::timeout(self.receipt_timeout, pending.get_receipt())
            .await
            .map_err(|_| {
                X402Error::Chain(format!(
                    "transferWithAuthorization receipt timed out after {}s",
                    self.receipt_timeout.as_secs()
                ))
            })?
            .map_err(|e| X402Error::Chain(format!("transferWithAuthorization receipt failed: {e}")))?;

        if !receipt.status() {
            return Err(X402Error::Chain(format!(
                "transferWithAuthorization reverted in {}",
                receipt.transaction_hash
            )));
        }

        Ok(receipt.transaction_hash)
    }
}
