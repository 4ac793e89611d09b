//! Process-wide configuration, read once at startup.
//!
//! [`X402Config`] is immutable after construction and handed (behind an
//! `Arc`) to every component constructor. Nothing else in the crate reads
//! environment variables.

use std::env;
use std::str::FromStr;

use alloy::primitives::Address;
use url::Url;

use crate::amount::TokenAmount;
use crate::constants::{
    BASE_CHAIN_ID, BASE_NETWORK, DEFAULT_FACILITATOR_URL, DEFAULT_MAX_TIMEOUT_SECONDS,
    DEFAULT_PRICE, DEFAULT_RESOURCE, EIP3009_DOMAIN_NAME, EIP3009_DOMAIN_VERSION, RPC_URL,
    USDC_BASE_ADDRESS, USDC_SYMBOL,
};

/// Where the protected resource sends payment proofs for verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationMode {
    /// Verify in-process with the scheme verifiers.
    #[default]
    Local,
    /// Delegate to a remote facilitator over HTTP.
    Facilitator,
}

impl FromStr for VerificationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "facilitator" | "remote" => Ok(Self::Facilitator),
            other => Err(ConfigError::InvalidValue("X402_VERIFICATION", other.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct X402Config {
    /// Network identifier advertised to clients (e.g. `base`).
    pub network: String,
    /// Chain ID bound into the EIP-712 signing domain.
    pub chain_id: u64,
    /// Stablecoin contract used when requirements leave `tokenAddress` unset.
    pub token_address: Address,
    /// Asset symbol advertised to clients.
    pub asset: String,
    /// Account that receives payments.
    pub recipient: Address,
    /// Default price, human decimal. Validated at load.
    pub default_price: String,
    /// Path identifier of the protected resource.
    pub resource: String,
    pub max_timeout_seconds: u64,
    /// Enables the `exact` (EIP-3009 authorization) scheme.
    pub exact_enabled: bool,
    pub rpc_url: String,
    pub facilitator_url: String,
    /// Sent as `x-api-key` when calling a remote facilitator.
    pub facilitator_api_key: Option<String>,
    pub verification_mode: VerificationMode,
    /// Key of the wallet that submits `transferWithAuthorization` and pays gas.
    pub settlement_private_key: Option<String>,
    /// Shared secret gating `/payments/verify` and `/payments/settle`.
    pub api_key: Option<String>,
    pub eip712_domain_name: String,
    pub eip712_domain_version: String,
    /// Reject second use of a proof within this process. Off by default.
    pub replay_protection: bool,
}

impl std::fmt::Debug for X402Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Config")
            .field("network", &self.network)
            .field("chain_id", &self.chain_id)
            .field("token_address", &self.token_address)
            .field("asset", &self.asset)
            .field("recipient", &self.recipient)
            .field("default_price", &self.default_price)
            .field("resource", &self.resource)
            .field("max_timeout_seconds", &self.max_timeout_seconds)
            .field("exact_enabled", &self.exact_enabled)
            .field("rpc_url", &self.rpc_url)
            .field("facilitator_url", &self.facilitator_url)
            .field(
                "facilitator_api_key",
                &self.facilitator_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("verification_mode", &self.verification_mode)
            .field(
                "settlement_private_key",
                &self.settlement_private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("eip712_domain_name", &self.eip712_domain_name)
            .field("eip712_domain_version", &self.eip712_domain_version)
            .field("replay_protection", &self.replay_protection)
            .finish()
    }
}

impl Default for X402Config {
    /// Base mainnet USDC defaults with a zero recipient. Intended for tests;
    /// production configuration comes from [`X402Config::from_env`].
    fn default() -> Self {
        Self {
            network: BASE_NETWORK.to_string(),
            chain_id: BASE_CHAIN_ID,
            token_address: USDC_BASE_ADDRESS,
            asset: USDC_SYMBOL.to_string(),
            recipient: Address::ZERO,
            default_price: DEFAULT_PRICE.to_string(),
            resource: DEFAULT_RESOURCE.to_string(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            exact_enabled: false,
            rpc_url: RPC_URL.to_string(),
            facilitator_url: DEFAULT_FACILITATOR_URL.to_string(),
            facilitator_api_key: None,
            verification_mode: VerificationMode::Local,
            settlement_private_key: None,
            api_key: None,
            eip712_domain_name: EIP3009_DOMAIN_NAME.to_string(),
            eip712_domain_version: EIP3009_DOMAIN_VERSION.to_string(),
            replay_protection: false,
        }
    }
}

impl X402Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source. `from_env` delegates here;
    /// tests pass a map instead of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        // Required: payment recipient
        let recipient_raw = get("SERVICE_RECIPIENT_ADDRESS")
            .ok_or(ConfigError::MissingRequired("SERVICE_RECIPIENT_ADDRESS"))?;
        let recipient = parse_address("SERVICE_RECIPIENT_ADDRESS", &recipient_raw)?;

        let token_address = match get("USDC_BASE_ADDRESS") {
            Some(raw) => parse_address("USDC_BASE_ADDRESS", &raw)?,
            None => defaults.token_address,
        };

        let default_price = get("PRICE_IN_USDC").unwrap_or(defaults.default_price);
        TokenAmount::parse_decimal(&default_price)
            .map_err(|e| ConfigError::InvalidPrice(format!("{default_price}: {e}")))?;

        let chain_id = match get("X402_CHAIN_ID") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("X402_CHAIN_ID", raw))?,
            None => defaults.chain_id,
        };

        let facilitator_url = get("X402_FACILITATOR_URL").unwrap_or(defaults.facilitator_url);
        Url::parse(&facilitator_url).map_err(|_| ConfigError::InvalidUrl(facilitator_url.clone()))?;

        let rpc_url = get("RPC_URL").unwrap_or(defaults.rpc_url);
        Url::parse(&rpc_url).map_err(|_| ConfigError::InvalidUrl(rpc_url.clone()))?;

        let verification_mode = match get("X402_VERIFICATION") {
            Some(raw) => raw.parse()?,
            None => VerificationMode::Local,
        };

        let api_key = get("LOCAL_FACILITATOR_API_KEY");
        if api_key.is_none() {
            tracing::warn!(
                "LOCAL_FACILITATOR_API_KEY not set; /payments/verify and /payments/settle will reject every request"
            );
        }

        let exact_enabled = flag(get("ENABLE_EIP3009"));
        let settlement_private_key = get("SETTLEMENT_PRIVATE_KEY");
        if exact_enabled && settlement_private_key.is_none() {
            tracing::warn!("ENABLE_EIP3009=true but SETTLEMENT_PRIVATE_KEY is not set; exact payments will verify but never settle");
        }

        let replay_protection = flag(get("X402_REPLAY_PROTECTION"));

        Ok(Self {
            network: get("X402_NETWORK").unwrap_or(defaults.network),
            chain_id,
            token_address,
            asset: defaults.asset,
            recipient,
            default_price,
            resource: get("X402_RESOURCE").unwrap_or(defaults.resource),
            max_timeout_seconds: defaults.max_timeout_seconds,
            exact_enabled,
            rpc_url,
            facilitator_url,
            facilitator_api_key: get("X402_FACILITATOR_API_KEY"),
            verification_mode,
            settlement_private_key,
            api_key,
            eip712_domain_name: get("EIP3009_DOMAIN_NAME").unwrap_or(defaults.eip712_domain_name),
            eip712_domain_version: get("EIP3009_DOMAIN_VERSION")
                .unwrap_or(defaults.eip712_domain_version),
            replay_protection,
        })
    }
}

fn parse_address(name: &'static str, raw: &str) -> Result<Address, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidAddress(name, raw.to_string()))
}

fn flag(value: Option<String>) -> bool {
    value
        .map(|v| matches!(v.trim(), "true" | "1"))
        .unwrap_or(false)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid address in {0}: {1}")]
    InvalidAddress(&'static str, String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
