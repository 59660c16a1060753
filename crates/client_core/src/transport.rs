//! HTTP transport with a single failover retry against a backup base URL.

use std::time::Duration;

use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::error::{ApiError, ProtocolViolation};
use tracing::{debug, warn};

use crate::{config::Settings, error::TransportError};

/// Issues JSON calls against a primary base URL and falls back to a backup
/// base URL, once per logical request, when no response was received.
///
/// Both base URLs are fixed at construction; the client holds no mutable
/// routing state, so one value can be shared by any number of sessions.
#[derive(Debug, Clone)]
pub struct TransportClient {
    http: Client,
    primary_url: String,
    backup_url: String,
}

impl TransportClient {
    pub fn new(
        primary_url: impl Into<String>,
        backup_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_http_client(http, primary_url, backup_url))
    }

    pub fn with_http_client(
        http: Client,
        primary_url: impl Into<String>,
        backup_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            primary_url: trim_base_url(primary_url.into()),
            backup_url: trim_base_url(backup_url.into()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, reqwest::Error> {
        Self::new(
            settings.primary_url.clone(),
            settings.backup_url.clone(),
            settings.request_timeout(),
        )
    }

    pub fn primary_url(&self) -> &str {
        &self.primary_url
    }

    pub fn backup_url(&self) -> &str {
        &self.backup_url
    }

    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, TransportError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(body)
            .map_err(|err| ProtocolViolation::Malformed(format!("request body: {err}")))?;
        let bytes = self.request(Method::POST, path, Some(&body)).await?;
        decode(path, &bytes)
    }

    pub async fn get<R>(&self, path: &str) -> Result<R, TransportError>
    where
        R: DeserializeOwned,
    {
        let bytes = self.request(Method::GET, path, None).await?;
        decode(path, &bytes)
    }

    /// Runs one logical request and returns the raw body of a 2xx response.
    ///
    /// A transport-level failure against the primary is retried exactly once
    /// against the backup. Any received response, including an error status,
    /// ends the request.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Vec<u8>, TransportError> {
        let mut retried = false;
        let mut base_url = self.primary_url.as_str();

        loop {
            match self.attempt(&method, base_url, path, body).await {
                Err(TransportError::NetworkUnavailable { url, reason }) if !retried => {
                    warn!(
                        "transport: failover method={} url={} backup={} reason={}",
                        method, url, self.backup_url, reason
                    );
                    retried = true;
                    base_url = self.backup_url.as_str();
                }
                outcome => return outcome,
            }
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        base_url: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Vec<u8>, TransportError> {
        let url = format!("{base_url}{path}");
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| TransportError::NetworkUnavailable {
                url: url.clone(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&raw)
                .map(|body| body.error)
                .ok()
                .or_else(|| (!raw.trim().is_empty()).then(|| raw.trim().to_string()));
            debug!("transport: http error method={method} url={url} status={status}");
            return Err(TransportError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await.map_err(|err| {
            ProtocolViolation::Malformed(format!("failed to read body from {url}: {err}"))
        })?;
        Ok(bytes.to_vec())
    }
}

fn decode<R: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<R, TransportError> {
    serde_json::from_slice(bytes).map_err(|err| {
        TransportError::Protocol(ProtocolViolation::Malformed(format!("{path}: {err}")))
    })
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
