use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{web, App, HttpServer};
use alloy::providers::RootProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use x402::usdc::connect_submitter;
use x402::{
    spawn_purge, ChainReader, RpcChainReader, X402Config, PAYMENT_HEADER,
    REPLAY_PURGE_INTERVAL_SECS,
};
use x402_server::{AppState, ServerConfig};

fn build_cors(origins: &[String]) -> Cors {
    let headers = vec![
        "content-type",
        "authorization",
        "x-api-key",
        "x-402-payment",
    ];
    if origins.is_empty() {
        Cors::default()
            .allowed_origin_fn(|origin, _| {
                origin
                    .to_str()
                    .map(|o| {
                        // Match http://localhost or http://localhost:PORT exactly
                        o == "http://localhost" || o.starts_with("http://localhost:")
                    })
                    .unwrap_or(false)
            })
            .allow_any_method()
            .allowed_headers(headers)
            .max_age(3600)
    } else {
        let mut cors = Cors::default();
        for origin in origins {
            cors = cors.allowed_origin(origin);
        }
        cors.allow_any_method().allowed_headers(headers).max_age(3600)
    }
}

fn fail(message: &str, error: impl std::fmt::Display) -> ! {
    tracing::error!(error = %error, "{message}");
    std::process::exit(1);
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match X402Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => fail("invalid configuration", e),
    };
    let server = ServerConfig::from_env();
    tracing::debug!(?config, ?server, "configuration loaded");

    let rpc_url = match config.rpc_url.parse() {
        Ok(url) => url,
        Err(e) => fail("invalid RPC_URL", e),
    };
    let chain: Arc<dyn ChainReader> = Arc::new(RpcChainReader::new(RootProvider::new_http(rpc_url)));

    let submitter = match &config.settlement_private_key {
        Some(key) => match connect_submitter(key, &config.rpc_url) {
            Ok(submitter) => Some(submitter),
            Err(e) => fail("settlement wallet unavailable", e),
        },
        None => None,
    };

    let state = web::Data::new(AppState::new(config.clone(), chain, submitter).with_server_config(&server));

    let Some(governor_conf) = GovernorConfigBuilder::default()
        .requests_per_minute(server.rate_limit_rpm)
        .finish()
    else {
        fail("failed to build rate limiter config", server.rate_limit_rpm);
    };

    tracing::info!("x402 server listening at http://localhost:{}", server.port);
    tracing::info!(
        resource = %config.resource,
        price = %config.default_price,
        recipient = %config.recipient,
        network = %config.network,
        exact = config.exact_enabled,
        mode = ?config.verification_mode,
        "payment gate configured"
    );
    tracing::info!(
        "Endpoints: GET {} (header {PAYMENT_HEADER}), GET /payments/supported, POST /payments/verify, POST /payments/settle, GET /health, GET /metrics",
        config.resource
    );
    tracing::info!("Rate limit: {} req/min per IP", server.rate_limit_rpm);
    if let Some(consumed) = &state.consumed {
        tracing::info!("replay protection enabled (in-memory, lost on restart)");
        spawn_purge(
            consumed.clone(),
            Duration::from_secs(REPLAY_PURGE_INTERVAL_SECS),
        );
    }

    let cors_origins = server.allowed_origins.clone();
    let resource = config.resource.clone();

    HttpServer::new(move || {
        let resource = resource.clone();
        App::new()
            .wrap(build_cors(&cors_origins))
            .wrap(Governor::new(&governor_conf))
            .app_data(web::JsonConfig::default().limit(65_536))
            .app_data(web::PayloadConfig::new(65_536))
            .app_data(state.clone())
            .configure(move |cfg| x402_server::configure(cfg, &resource))
    })
    .bind(("0.0.0.0", server.port))?
    .run()
    .await
}
