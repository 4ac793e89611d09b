//! x402 resource server: gates an HTTP endpoint behind 402 payments.
//!
//! The protected resource answers 402 with a USDC price quote until a
//! request carries an `X-402-Payment` proof that verifies. Delegated
//! facilitator endpoints expose the same verification and settlement to
//! other resource servers.
//!
//! # Modules
//!
//! - [`gate`]: the protected resource
//! - [`routes`]: `/payments/*`, `/health`, `/metrics`
//! - [`state`]: shared [`AppState`](state::AppState)
//! - [`error`]: HTTP error mapping ([`ApiError`](error::ApiError))
//! - [`config`]: HTTP-only settings
//! - [`metrics`]: Prometheus counters

pub mod config;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod routes;
pub mod state;

use actix_web::web;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

/// Register every endpoint. `resource` is the protected path.
pub fn configure(cfg: &mut web::ServiceConfig, resource: &str) {
    cfg.route(resource, web::get().to(gate::protected_resource))
        .service(routes::payments::supported)
        .service(routes::payments::verify)
        .service(routes::payments::settle)
        .service(routes::health::health)
        .service(routes::metrics::metrics_endpoint);
}
