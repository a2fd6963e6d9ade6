//! HTTP client for the upstream chat-completions endpoint.

use crate::core::config::UpstreamConfig;
use crate::core::error::{AppError, Result};
use crate::core::metrics::get_metrics;
use crate::services::ModelDescriptor;
use crate::transformer::{classify_upstream_error, UpstreamMessage, UpstreamRequest};
use std::fmt;
use std::time::{Duration, Instant};

/// Single-attempt client for the provider. Cheap to clone.
#[derive(Clone)]
pub struct UpstreamClient {
    http_client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    app_referer: String,
    app_title: String,
}

impl fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("app_referer", &self.app_referer)
            .field("app_title", &self.app_title)
            .finish()
    }
}

impl UpstreamClient {
    pub fn from_config(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_ssl)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            app_referer: config.app_referer.clone(),
            app_title: config.app_title.clone(),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fail early when no credential was configured at startup.
    pub fn ensure_credential(&self) -> Result<()> {
        if self.has_credential() {
            Ok(())
        } else {
            Err(AppError::Configuration(
                "OPENROUTER_API_KEY is not set".to_string(),
            ))
        }
    }

    /// POST one completion request. Non-2xx statuses are read and classified;
    /// the returned response is always successful. No retries.
    pub async fn send(
        &self,
        descriptor: &ModelDescriptor,
        messages: &[UpstreamMessage],
        streaming: bool,
    ) -> Result<reqwest::Response> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::Configuration("OPENROUTER_API_KEY is not set".to_string())
        })?;

        let payload = UpstreamRequest::new(&descriptor.upstream_id, messages, streaming);
        let metrics = get_metrics();
        let start = Instant::now();

        tracing::debug!(
            model = %descriptor.key,
            upstream_model = %descriptor.upstream_id,
            messages = messages.len(),
            streaming,
            "Sending upstream request"
        );

        let response = self
            .http_client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.app_referer)
            .header("X-Title", &self.app_title)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                metrics
                    .upstream_requests
                    .with_label_values(&[&descriptor.key, "transport_error"])
                    .inc();
                AppError::Transport(e)
            })?;

        metrics
            .upstream_latency
            .with_label_values(&[&descriptor.key])
            .observe(start.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            metrics
                .upstream_requests
                .with_label_values(&[&descriptor.key, status.as_str()])
                .inc();
            let body = response.bytes().await.unwrap_or_default();
            return Err(classify_upstream_error(status.as_u16(), &body));
        }

        metrics
            .upstream_requests
            .with_label_values(&[&descriptor.key, "ok"])
            .inc();
        Ok(response)
    }
}
