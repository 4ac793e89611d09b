use std::sync::Arc;

use x402::{
    AuthorizationSubmitter, ChainReader, ConsumedProofs, Facilitator, FacilitatorClient,
    LocalFacilitator, SettlementExecutor, VerificationDispatcher, VerificationMode, X402Config,
};

use crate::config::ServerConfig;

/// Shared application state for the resource server.
pub struct AppState {
    pub config: Arc<X402Config>,
    /// Backs `/payments/verify` and `/payments/settle`, whatever the gate uses.
    pub local: Arc<LocalFacilitator>,
    /// What the protected resource verifies and settles through, chosen by
    /// `X402_VERIFICATION`.
    pub gate: Arc<dyn Facilitator>,
    /// Used by `/health`.
    pub chain: Arc<dyn ChainReader>,
    /// Present only when `X402_REPLAY_PROTECTION` is on.
    pub consumed: Option<Arc<ConsumedProofs>>,
    pub metrics_token: Option<String>,
    pub public_metrics: bool,
}

impl AppState {
    /// Wire the components from configuration. `submitter` is `None` when no
    /// settlement key is configured.
    pub fn new(
        config: Arc<X402Config>,
        chain: Arc<dyn ChainReader>,
        submitter: Option<Arc<dyn AuthorizationSubmitter>>,
    ) -> Self {
        let dispatcher = VerificationDispatcher::new(Arc::clone(&config), Arc::clone(&chain));
        Self::with_dispatcher(config, dispatcher, chain, submitter)
    }

    /// Like [`AppState::new`] with a prebuilt dispatcher (e.g. a custom
    /// chain-read retry policy).
    pub fn with_dispatcher(
        config: Arc<X402Config>,
        dispatcher: VerificationDispatcher,
        chain: Arc<dyn ChainReader>,
        submitter: Option<Arc<dyn AuthorizationSubmitter>>,
    ) -> Self {
        let settlement = SettlementExecutor::new(Arc::clone(&config), submitter);
        let local = Arc::new(LocalFacilitator::new(dispatcher, settlement));

        let gate: Arc<dyn Facilitator> = match config.verification_mode {
            VerificationMode::Local => local.clone() as Arc<dyn Facilitator>,
            VerificationMode::Facilitator => {
                tracing::info!(url = %config.facilitator_url, "gate delegates to remote facilitator");
                Arc::new(FacilitatorClient::from_config(&config))
            }
        };

        let consumed = config
            .replay_protection
            .then(|| Arc::new(ConsumedProofs::new()));

        Self {
            config,
            local,
            gate,
            chain,
            consumed,
            metrics_token: None,
            public_metrics: false,
        }
    }

    /// Replace the gate's facilitator.
    pub fn with_gate_facilitator(mut self, facilitator: Arc<dyn Facilitator>) -> Self {
        self.gate = facilitator;
        self
    }

    pub fn with_server_config(mut self, server: &ServerConfig) -> Self {
        self.metrics_token = server.metrics_token.clone();
        self.public_metrics = server.public_metrics;
        self
    }
}
