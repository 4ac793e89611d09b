//! The protected resource.
//!
//! `NO_PROOF` answers 402 with a quote. With a proof the request is decoded,
//! verified against server-built requirements, and either granted (200,
//! settlement continues in the background) or denied.

use actix_web::{web, HttpRequest, HttpResponse};
use x402::{
    decode_payment_header, spawn_settlement, InvalidReason, RequirementsBuilder,
    X402Config, X402Error, PAYMENT_HEADER, X402_VERSION,
};

use crate::error::ApiError;
use crate::metrics::{self, scheme_label};
use crate::state::AppState;

pub const PROTECTED_DATA: &str = "Super secret message behind x402 paywall";

/// Body of the 402 quote: the default requirements plus one entry per
/// enabled scheme.
pub fn payment_required_body(config: &X402Config) -> serde_json::Value {
    let accepts: Vec<_> = x402::requirements::supported(config)
        .supported
        .into_iter()
        .map(|kind| kind.payment_requirements)
        .collect();
    serde_json::json!({
        "x402Version": X402_VERSION,
        "error": "payment_required",
        "paymentRequirements": RequirementsBuilder::new(config).build(),
        "accepts": accepts,
    })
}

pub async fn protected_resource(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let outcome = gate(&req, &state).await;
    let status = match &outcome {
        Ok(resp) => resp.status(),
        Err(e) => actix_web::ResponseError::status_code(e),
    };
    metrics::GATE_REQUESTS
        .with_label_values(&[status.as_str()])
        .inc();
    outcome
}

async fn gate(req: &HttpRequest, state: &AppState) -> Result<HttpResponse, ApiError> {
    let Some(header) = req.headers().get(PAYMENT_HEADER) else {
        return Ok(HttpResponse::PaymentRequired().json(payment_required_body(&state.config)));
    };

    let header = header
        .to_str()
        .map_err(|_| ApiError::InvalidPaymentHeader("header is not visible ASCII".to_string()))?;
    let envelope = decode_payment_header(header).map_err(ApiError::InvalidPaymentHeader)?;
    let payload = envelope.payment_payload;

    // Client-supplied requirements are ignored. An unknown tag still gets
    // default requirements so the facilitator answers `unsupported_scheme`.
    let scheme = state
        .local
        .dispatcher()
        .resolve(payload.scheme.as_deref())
        .unwrap_or_default();
    let requirements = RequirementsBuilder::new(&state.config).scheme(scheme).build();

    let result = match state.gate.verify(&payload, &requirements).await {
        Ok(result) => result,
        Err(X402Error::UpstreamUnavailable(detail)) => return Err(ApiError::Upstream(detail)),
        Err(e) => return Err(ApiError::VerificationFailed(e.to_string())),
    };

    let label = scheme_label(Some(&result.scheme));
    metrics::VERIFICATIONS
        .with_label_values(&[label, if result.valid { "valid" } else { "invalid" }])
        .inc();

    if !result.valid {
        if result.is_unsupported_scheme() {
            return Err(ApiError::UnsupportedScheme(result.scheme));
        }
        let reason = result
            .reason
            .unwrap_or_else(|| "payment_invalid".to_string());
        tracing::info!(scheme = label, reason = %reason, "payment rejected");
        return Err(ApiError::PaymentInvalid(reason));
    }

    if let Some(consumed) = &state.consumed {
        if consumed.claim_payload(&payload) == Some(false) {
            tracing::warn!(scheme = label, "payment proof replayed");
            return Err(ApiError::PaymentInvalid(
                InvalidReason::ProofAlreadyUsed.to_string(),
            ));
        }
    }

    tracing::info!(
        scheme = label,
        payer = ?result.payer,
        tx = result.tx_hash.as_deref().unwrap_or_default(),
        "payment accepted, access granted"
    );

    let started = std::time::Instant::now();
    spawn_settlement(
        state.gate.clone(),
        payload,
        requirements,
        move |outcome| {
            let elapsed = started.elapsed().as_secs_f64();
            metrics::SETTLE_LATENCY
                .with_label_values(&[label])
                .observe(elapsed);
            let succeeded = matches!(outcome, Ok(result) if result.success);
            metrics::SETTLEMENTS
                .with_label_values(&[label, if succeeded { "success" } else { "failure" }])
                .inc();
            if !succeeded {
                metrics::BACKGROUND_SETTLEMENT_FAILURES
                    .with_label_values(&[label])
                    .inc();
            }
        },
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({ "data": PROTECTED_DATA })))
}
