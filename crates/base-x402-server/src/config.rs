use std::env;

/// HTTP-only settings. Payment settings live in [`x402::X402Config`].
#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub rate_limit_rpm: u64,
    /// Explicit CORS origins. Empty means localhost on any port.
    pub allowed_origins: Vec<String>,
    /// Bearer token guarding `/metrics`.
    pub metrics_token: Option<String>,
    /// Serve `/metrics` without a token when none is configured.
    pub public_metrics: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field("allowed_origins", &self.allowed_origins)
            .field("metrics_token", &self.metrics_token.as_ref().map(|_| "[REDACTED]"))
            .field("public_metrics", &self.public_metrics)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4021,
            rate_limit_rpm: 120,
            allowed_origins: Vec::new(),
            metrics_token: None,
            public_metrics: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Unparseable numbers fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let allowed_origins = get("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            port: get("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            rate_limit_rpm: get("RATE_LIMIT_RPM")
                .and_then(|r| r.trim().parse().ok())
                .filter(|r| *r > 0)
                .unwrap_or(defaults.rate_limit_rpm),
            allowed_origins,
            metrics_token: get("METRICS_TOKEN"),
            public_metrics: get("X402_PUBLIC_METRICS")
                .map(|v| matches!(v.trim(), "true" | "1"))
                .unwrap_or(false),
        }
    }
}
