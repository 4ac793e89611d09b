use alloy::primitives::{address, Address};

/// Base mainnet chain ID. Bound into the EIP-712 domain of the `exact` scheme.
pub const BASE_CHAIN_ID: u64 = 8453;

/// Network identifier advertised in payment requirements.
pub const BASE_NETWORK: &str = "base";

/// Native USDC on Base mainnet.
pub const USDC_BASE_ADDRESS: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// Asset symbol advertised in payment requirements.
pub const USDC_SYMBOL: &str = "USDC";

/// USDC has 6 decimal places. Every decimal/base-unit conversion uses this scale.
pub const TOKEN_DECIMALS: u32 = 6;

/// Default price per request, in human decimal USDC.
pub const DEFAULT_PRICE: &str = "0.0001";

/// Default public RPC endpoint for Base mainnet.
pub const RPC_URL: &str = "https://mainnet.base.org";

/// Default delegated facilitator location.
pub const DEFAULT_FACILITATOR_URL: &str = "http://localhost:9000";

/// Default protected resource path.
pub const DEFAULT_RESOURCE: &str = "/secret";

/// USDC's EIP-712 domain name and version on Base.
pub const EIP3009_DOMAIN_NAME: &str = "USD Coin";
pub const EIP3009_DOMAIN_VERSION: &str = "2";

/// Protocol version carried in every envelope.
pub const X402_VERSION: u32 = 1;

/// Request header carrying the JSON-encoded payment proof.
pub const PAYMENT_HEADER: &str = "X-402-Payment";

/// Default `maxTimeoutSeconds` advertised to clients.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 600;

/// How often the replay store drops authorizations past their `validBefore`.
pub const REPLAY_PURGE_INTERVAL_SECS: u64 = 60;
