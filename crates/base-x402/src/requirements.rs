use alloy::primitives::Address;
use serde::Deserialize;

use crate::config::X402Config;
use crate::constants::X402_VERSION;
use crate::payment::{PaymentRequirements, SchemeKind};
use crate::response::{SupportedKind, SupportedResponse};

const DEFAULT_DESCRIPTION: &str = "Access to protected resource";

/// Builds the price quote advertised to clients.
///
/// Every field not explicitly overridden is filled from [`X402Config`].
/// Building never fails and performs no I/O. The amount override is carried
/// verbatim; verifiers reject a malformed one as `invalid_amount`.
#[derive(Debug, Clone)]
pub struct RequirementsBuilder<'a> {
    config: &'a X402Config,
    scheme: SchemeKind,
    amount: Option<String>,
    description: Option<String>,
}

impl<'a> RequirementsBuilder<'a> {
    pub fn new(config: &'a X402Config) -> Self {
        Self {
            config,
            scheme: SchemeKind::TxHash,
            amount: None,
            description: None,
        }
    }

    pub fn scheme(mut self, scheme: SchemeKind) -> Self {
        self.scheme = scheme;
        self
    }

    /// Shorthand for `.scheme(SchemeKind::Exact)`.
    pub fn exact(self) -> Self {
        self.scheme(SchemeKind::Exact)
    }

    pub fn amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn build(self) -> PaymentRequirements {
        let config = self.config;
        let extra = match self.scheme {
            SchemeKind::TxHash => None,
            SchemeKind::Exact => Some(serde_json::json!({
                "kind": "eip3009",
                "name": config.eip712_domain_name,
                "version": config.eip712_domain_version,
            })),
        };

        PaymentRequirements {
            scheme: self.scheme,
            network: config.network.clone(),
            asset: Some(config.asset.clone()),
            resource: Some(config.resource.clone()),
            mime_type: Some("application/json".to_string()),
            max_timeout_seconds: Some(config.max_timeout_seconds),
            amount: self.amount.unwrap_or_else(|| config.default_price.clone()),
            recipient: config.recipient,
            token_address: Some(config.token_address),
            description: Some(
                self.description
                    .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            ),
            extra,
        }
    }
}

/// Requirements as a delegating resource server sends them. Any field left
/// out is filled from [`X402Config`] by [`complete`](Self::complete).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialRequirements {
    #[serde(default)]
    pub scheme: SchemeKind,
    pub network: Option<String>,
    pub asset: Option<String>,
    pub resource: Option<String>,
    pub mime_type: Option<String>,
    pub max_timeout_seconds: Option<u64>,
    pub amount: Option<String>,
    pub recipient: Option<Address>,
    pub token_address: Option<Address>,
    pub description: Option<String>,
    pub extra: Option<serde_json::Value>,
}

impl PartialRequirements {
    pub fn complete(self, config: &X402Config) -> PaymentRequirements {
        let mut builder = RequirementsBuilder::new(config).scheme(self.scheme);
        if let Some(amount) = self.amount {
            builder = builder.amount(amount);
        }
        if let Some(description) = self.description {
            builder = builder.description(description);
        }
        let defaults = builder.build();

        PaymentRequirements {
            network: self.network.unwrap_or(defaults.network),
            asset: self.asset.or(defaults.asset),
            resource: self.resource.or(defaults.resource),
            mime_type: self.mime_type.or(defaults.mime_type),
            max_timeout_seconds: self.max_timeout_seconds.or(defaults.max_timeout_seconds),
            recipient: self.recipient.unwrap_or(defaults.recipient),
            token_address: self.token_address.or(defaults.token_address),
            extra: self.extra.or(defaults.extra),
            ..defaults
        }
    }
}

/// One requirements entry per enabled scheme, `evm-txhash` first.
pub fn supported(config: &X402Config) -> SupportedResponse {
    let mut supported = vec![SupportedKind {
        payment_requirements: RequirementsBuilder::new(config).build(),
    }];
    if config.exact_enabled {
        supported.push(SupportedKind {
            payment_requirements: RequirementsBuilder::new(config).exact().build(),
        });
    }
    SupportedResponse {
        x402_version: X402_VERSION,
        supported,
    }
}
