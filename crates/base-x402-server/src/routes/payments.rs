//! Delegated facilitator endpoints. `verify` and `settle` require the shared
//! API key; the credential is checked before the body is parsed.

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use x402::security::api_key_matches;
use x402::{
    Facilitator, PartialRequirements, PaymentPayload, PaymentRequirements, SchemeKind,
    VerifyResponse, X402Config,
};

use crate::error::ApiError;
use crate::metrics::{self, scheme_label};
use crate::state::AppState;

/// Verify/settle body. Requirement fields left out are filled from config.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DelegatedRequest {
    payment_payload: PaymentPayload,
    payment_requirements: Option<PartialRequirements>,
}

impl DelegatedRequest {
    fn resolve(
        self,
        config: &X402Config,
    ) -> Result<(PaymentPayload, PaymentRequirements), ApiError> {
        let requirements = self
            .payment_requirements
            .ok_or_else(|| ApiError::MalformedRequest("missing paymentRequirements".to_string()))?;
        Ok((self.payment_payload, requirements.complete(config)))
    }
}

/// Settle body: the full envelope, or the legacy bare `{txHash}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SettleRequest {
    Envelope(DelegatedRequest),
    #[serde(rename_all = "camelCase")]
    Legacy { tx_hash: String },
}

fn authorize(req: &HttpRequest, state: &AppState) -> Result<(), ApiError> {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());
    let x_api_key = header("x-api-key");
    let authorization = header("authorization");

    if api_key_matches(state.config.api_key.as_deref(), x_api_key, authorization) {
        return Ok(());
    }

    let reason = if x_api_key.is_none() && authorization.is_none() {
        "missing"
    } else {
        "invalid"
    };
    tracing::warn!(reason, path = req.path(), "API key check failed");
    metrics::API_KEY_FAILURES.with_label_values(&[reason]).inc();
    Err(ApiError::Unauthorized)
}

fn parse_envelope(
    body: &[u8],
    config: &X402Config,
) -> Result<(PaymentPayload, PaymentRequirements), ApiError> {
    let request: DelegatedRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::MalformedRequest(format!("invalid request body: {e}")))?;
    request.resolve(config)
}

#[get("/payments/supported")]
pub async fn supported(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(x402::requirements::supported(&state.config))
}

/// Verdicts (valid or not) are 200 `{isValid, invalidReason, scheme}`.
#[post("/payments/verify")]
pub async fn verify(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    authorize(&req, &state)?;
    let (payload, requirements) = parse_envelope(&body, &state.config)?;

    let result = state.local.verify(&payload, &requirements).await?;
    let label = scheme_label(Some(&result.scheme));
    metrics::VERIFICATIONS
        .with_label_values(&[label, if result.valid { "valid" } else { "invalid" }])
        .inc();
    if !result.valid {
        tracing::info!(
            scheme = label,
            reason = result.reason.as_deref().unwrap_or_default(),
            "delegated verification rejected"
        );
    }

    Ok(HttpResponse::Ok().json(VerifyResponse::from(&result)))
}

#[post("/payments/settle")]
pub async fn settle(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    authorize(&req, &state)?;

    let request: SettleRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::MalformedRequest(format!("invalid request body: {e}")))?;

    let (payload, requirements) = match request {
        SettleRequest::Legacy { tx_hash } => {
            if tx_hash.trim().is_empty() {
                return Err(ApiError::MalformedRequest("missing txHash".to_string()));
            }
            metrics::SETTLEMENTS
                .with_label_values(&[SchemeKind::TxHash.as_str(), "success"])
                .inc();
            return Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "scheme": SchemeKind::TxHash.as_str(),
                "txHash": tx_hash,
            })));
        }
        SettleRequest::Envelope(request) => request.resolve(&state.config)?,
    };

    let label = scheme_label(payload.scheme.as_deref());
    let started = std::time::Instant::now();
    let result = state.local.settle(&payload, &requirements).await?;
    metrics::SETTLE_LATENCY
        .with_label_values(&[label])
        .observe(started.elapsed().as_secs_f64());
    metrics::SETTLEMENTS
        .with_label_values(&[label, if result.success { "success" } else { "failure" }])
        .inc();

    if !result.success {
        let reason = result
            .reason
            .unwrap_or_else(|| "settlement_failed".to_string());
        tracing::warn!(scheme = label, reason = %reason, "delegated settlement failed");
        return Err(ApiError::SettlementFailed(reason));
    }

    tracing::info!(
        scheme = label,
        tx = result.tx_hash.as_deref().unwrap_or_default(),
        "delegated settlement completed"
    );
    Ok(HttpResponse::Ok().json(result))
}
