//! x402 pay-per-request protocol for USDC on Base.
//!
//! A resource answers `402 Payment Required` with a price quote until the
//! client attaches a payment proof. Two proof formats are understood:
//!
//! - **`evm-txhash`**: the hash of an already-mined USDC `transfer`, checked
//!   against chain state ([`TxHashVerifier`]).
//! - **`exact`**: an offline EIP-3009 `transferWithAuthorization` signature,
//!   checked cryptographically ([`AuthorizationVerifier`]) and later
//!   broadcast by a facilitator-held key ([`SettlementExecutor`]).
//!
//! [`VerificationDispatcher`] routes a payload to the matching verifier.
//! [`LocalFacilitator`] bundles dispatch and settlement in-process;
//! [`FacilitatorClient`] delegates both to a remote service over HTTP.
//!
//! # Quick example (client)
//!
//! ```no_run
//! use alloy::signers::local::PrivateKeySigner;
//! use x402::{eip3009, PaymentEnvelope, PaymentPayload, RequirementsBuilder, X402Config};
//!
//! let config = X402Config::default();
//! let requirements = RequirementsBuilder::new(&config).exact().build();
//! let signer = PrivateKeySigner::random();
//! let (authorization, signature) =
//!     eip3009::sign_authorization(&signer, &requirements, &config, 0, u64::MAX).unwrap();
//! let envelope = PaymentEnvelope::new(
//!     PaymentPayload::exact(&config.network, &authorization, &signature),
//!     requirements,
//! );
//! let header = x402::encode_payment_header(&envelope).unwrap();
//! ```

// Core types
pub mod amount;
pub mod config;
pub mod constants;
pub mod error;
pub mod payment;
pub mod requirements;
pub mod response;

// Verification
pub mod chain;
pub mod dispatcher;
pub mod eip3009;
pub mod replay;
pub mod retry;
pub mod txhash;

// Settlement and facilitation
pub mod facilitator;
pub mod facilitator_client;
pub mod security;
pub mod settlement;
pub mod usdc;

use alloy::sol;

// EIP-3009 typed data. Field order and names define the EIP-712 type hash
// and must match the token contract exactly.
sol! {
    #[derive(Debug)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

// The slice of the USDC (FiatTokenV2) interface this crate touches.
sol! {
    #[sol(rpc)]
    interface IUSDC {
        function transfer(address to, uint256 value) external returns (bool);
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
    }
}

// Re-exports
pub use amount::TokenAmount;
pub use config::{ConfigError, VerificationMode, X402Config};
pub use constants::*;
pub use error::X402Error;
pub use payment::*;
pub use requirements::{PartialRequirements, RequirementsBuilder};
pub use response::*;

pub use chain::{ChainReader, ObservedTransaction, RpcChainReader};
pub use dispatcher::VerificationDispatcher;
pub use eip3009::AuthorizationVerifier;
pub use facilitator::{spawn_settlement, Facilitator, LocalFacilitator};
pub use facilitator_client::FacilitatorClient;
pub use replay::{spawn_purge, ConsumedProofs, ProofKey};
pub use retry::{Attempt, Backoff, RetryPolicy, Sleeper, TokioSleeper};
pub use settlement::SettlementExecutor;
pub use txhash::TxHashVerifier;
pub use usdc::{AuthorizationSubmitter, RpcSubmitter, SplitSignature};
