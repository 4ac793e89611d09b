mod common;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{address, Bytes, U256};
use common::*;
use x402::{ObservedTransaction, TxHashVerifier, USDC_BASE_ADDRESS};

const EXPECTED: u64 = 100;

async fn verify_with(chain: Arc<FakeChain>) -> (x402::VerifyResult, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let verifier = TxHashVerifier::new(chain).with_retry(instant_chain_retry(sleeper.clone()));
    let result = verifier
        .verify(TX_HASH, USDC_BASE_ADDRESS, RECIPIENT, U256::from(EXPECTED))
        .await;
    (result, sleeper)
}

#[tokio::test]
async fn test_exact_transfer_is_accepted() {
    let chain = Arc::new(FakeChain::with_tx(transfer_tx(USDC_BASE_ADDRESS, RECIPIENT, EXPECTED)));
    let (result, sleeper) = verify_with(chain).await;

    assert!(result.valid, "rejected: {:?}", result.reason);
    assert_eq!(result.scheme, "evm-txhash");
    assert_eq!(result.tx_hash.as_deref(), Some(TX_HASH));
    assert!(sleeper.delays.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_overpayment_is_rejected() {
    let chain = Arc::new(FakeChain::with_tx(transfer_tx(USDC_BASE_ADDRESS, RECIPIENT, EXPECTED + 1)));
    let (result, _) = verify_with(chain).await;
    assert!(!result.valid);
    assert_eq!(result.reason.as_deref(), Some("transfer amount mismatch"));
}

#[tokio::test]
async fn test_underpayment_is_rejected() {
    let chain = Arc::new(FakeChain::with_tx(transfer_tx(USDC_BASE_ADDRESS, RECIPIENT, EXPECTED - 1)));
    let (result, _) = verify_with(chain).await;
    assert!(!result.valid);
    assert_eq!(result.reason.as_deref(), Some("transfer amount mismatch"));
}

#[tokio::test]
async fn test_wrong_recipient_is_rejected() {
    let chain = Arc::new(FakeChain::with_tx(transfer_tx(USDC_BASE_ADDRESS, STRANGER, EXPECTED)));
    let (result, _) = verify_with(chain).await;
    assert_eq!(result.reason.as_deref(), Some("transfer recipient mismatch"));
}

#[tokio::test]
async fn test_wrong_contract_is_rejected() {
    let other_token = address!("3333333333333333333333333333333333333333");
    let chain = Arc::new(FakeChain::with_tx(transfer_tx(other_token, RECIPIENT, EXPECTED)));
    let (result, _) = verify_with(chain).await;
    assert_eq!(
        result.reason.as_deref(),
        Some("transaction not sent to expected token contract")
    );
}

#[tokio::test]
async fn test_non_transfer_call_is_rejected() {
    // approve(RECIPIENT, 100) on the right contract
    let mut input = vec![0x09, 0x5e, 0xa7, 0xb3];
    input.extend_from_slice(&[0u8; 12]);
    input.extend_from_slice(RECIPIENT.as_slice());
    input.extend_from_slice(&U256::from(EXPECTED).to_be_bytes::<32>());
    let chain = Arc::new(FakeChain::with_tx(ObservedTransaction {
        to: Some(USDC_BASE_ADDRESS),
        input: Bytes::from(input),
    }));

    let (result, _) = verify_with(chain).await;
    assert_eq!(result.reason.as_deref(), Some("not an ERC-20 transfer call"));
}

#[tokio::test]
async fn test_failed_receipt_is_final() {
    let chain = Arc::new(FakeChain {
        status: Some(false),
        tx: Some(transfer_tx(USDC_BASE_ADDRESS, RECIPIENT, EXPECTED)),
        ..FakeChain::default()
    });
    let (result, sleeper) = verify_with(chain.clone()).await;

    assert_eq!(result.reason.as_deref(), Some("transaction not successful"));
    assert_eq!(chain.receipt_calls(), 1);
    assert!(sleeper.delays.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_propagation_lag_is_retried() {
    let chain = Arc::new(FakeChain {
        hidden_polls: 2,
        ..FakeChain::with_tx(transfer_tx(USDC_BASE_ADDRESS, RECIPIENT, EXPECTED))
    });
    let (result, sleeper) = verify_with(chain.clone()).await;

    assert!(result.valid);
    assert_eq!(chain.receipt_calls(), 3);
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        vec![Duration::from_millis(1500); 2]
    );
}

#[tokio::test]
async fn test_never_visible_gives_up_after_three_attempts() {
    let chain = Arc::new(FakeChain {
        hidden_polls: u32::MAX,
        ..FakeChain::with_tx(transfer_tx(USDC_BASE_ADDRESS, RECIPIENT, EXPECTED))
    });
    let (result, sleeper) = verify_with(chain.clone()).await;

    assert!(!result.valid);
    assert_eq!(result.reason.as_deref(), Some("transaction not found"));
    assert_eq!(chain.receipt_calls(), 3);
    assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_rpc_error_fails_closed_with_message() {
    let chain = Arc::new(FakeChain {
        rpc_error: Some("connection refused".to_string()),
        ..FakeChain::default()
    });
    let (result, _) = verify_with(chain.clone()).await;

    assert!(!result.valid);
    assert!(result.reason.unwrap().contains("connection refused"));
    assert_eq!(chain.receipt_calls(), 3);
}

#[tokio::test]
async fn test_malformed_hash_skips_chain() {
    let chain = Arc::new(FakeChain::default());
    let verifier = TxHashVerifier::new(chain.clone());
    let result = verifier
        .verify("0xnothex", USDC_BASE_ADDRESS, RECIPIENT, U256::from(EXPECTED))
        .await;

    assert_eq!(result.reason.as_deref(), Some("malformed_txHash"));
    assert_eq!(chain.receipt_calls(), 0);
}
