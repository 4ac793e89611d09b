//! HTTP client for a remote facilitator's `/verify` and `/settle` endpoints.
//!
//! Used by the resource server when verification is delegated instead of
//! done in-process. Every call is bounded by a request timeout and retried
//! through a [`RetryPolicy`] (one try plus two retries, doubling from 200ms).

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::X402Config;
use crate::constants::X402_VERSION;
use crate::facilitator::Facilitator;
use crate::payment::{PaymentPayload, PaymentRequirements};
use crate::response::{SettleResult, VerifyResponse, VerifyResult};
use crate::retry::{Attempt, RetryPolicy};
use crate::X402Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FacilitatorRequest<'a> {
    x402_version: u32,
    payment_payload: &'a PaymentPayload,
    payment_requirements: &'a PaymentRequirements,
}

pub struct FacilitatorClient {
    base_url: String,
    verify_path: String,
    settle_path: String,
    api_key: Option<String>,
    client: reqwest::Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl FacilitatorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            verify_path: "/verify".to_string(),
            settle_path: "/settle".to_string(),
            api_key: None,
            client: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::facilitator(),
        }
    }

    pub fn from_config(config: &X402Config) -> Self {
        let client = Self::new(config.facilitator_url.clone());
        match &config.facilitator_api_key {
            Some(key) => client.with_api_key(key.clone()),
            None => client,
        }
    }

    pub fn with_verify_path(mut self, path: impl Into<String>) -> Self {
        self.verify_path = path.into();
        self
    }

    pub fn with_settle_path(mut self, path: impl Into<String>) -> Self {
        self.settle_path = path.into();
        self
    }

    /// Sent as `x-api-key` on every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn join_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn post_json<Res>(&self, url: &str, body: &FacilitatorRequest<'_>) -> Result<Res, X402Error>
    where
        Res: DeserializeOwned,
    {
        self.retry
            .run(|attempt| self.post_once(url, body, attempt))
            .await
    }

    async fn post_once<Res>(
        &self,
        url: &str,
        body: &FacilitatorRequest<'_>,
        attempt: u32,
    ) -> Attempt<Res, X402Error>
    where
        Res: DeserializeOwned,
    {
        tracing::debug!(url, attempt, "calling facilitator");
        let mut request = self.client.post(url).timeout(self.timeout).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url, attempt, error = %e, "facilitator request failed");
                return Attempt::Retry(X402Error::UpstreamUnavailable(format!(
                    "facilitator request failed: {e}"
                )));
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Attempt::Done(Err(X402Error::UpstreamUnavailable(format!(
                "facilitator rejected credentials ({status})"
            ))));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(url, attempt, %status, "facilitator returned error status");
            let error = X402Error::UpstreamUnavailable(format!("facilitator returned {status}: {text}"));
            // 5xx, 408 and 429 are transient.
            let transient = status.is_server_error()
                || status == reqwest::StatusCode::REQUEST_TIMEOUT
                || status == reqwest::StatusCode::TOO_MANY_REQUESTS;
            return if transient {
                Attempt::Retry(error)
            } else {
                Attempt::Done(Err(error))
            };
        }

        match response.json::<Res>().await {
            Ok(parsed) => Attempt::Done(Ok(parsed)),
            Err(e) => Attempt::Retry(X402Error::UpstreamUnavailable(format!(
                "facilitator response parse failed: {e}"
            ))),
        }
    }
}

#[async_trait]
impl Facilitator for FacilitatorClient {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResult, X402Error> {
        let body = FacilitatorRequest {
            x402_version: X402_VERSION,
            payment_payload: payload,
            payment_requirements: requirements,
        };
        let response: VerifyResponse = self.post_json(&self.join_url(&self.verify_path), &body).await?;
        let requested = payload.scheme.as_deref().unwrap_or(requirements.scheme.as_str());
        Ok(response.into_result(requested))
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResult, X402Error> {
        let body = FacilitatorRequest {
            x402_version: X402_VERSION,
            payment_payload: payload,
            payment_requirements: requirements,
        };
        self.post_json(&self.join_url(&self.settle_path), &body).await
    }
}
