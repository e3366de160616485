//! Shared HTTP plumbing for the Google REST clients.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

use super::tokens::Credential;

/// A bearer-authenticated JSON client rooted at one API base URL.
#[derive(Debug, Clone)]
pub(crate) struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
    provider: &'static str,
}

impl ApiClient {
    pub(crate) fn new(
        provider: &'static str,
        base_url: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_provider(provider)
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            provider,
        })
    }

    pub(crate) fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn provider(&self) -> &'static str {
        self.provider
    }

    fn request(&self, method: Method, credential: &Credential, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(provider = self.provider, %method, %url, "api request");
        self.http_client
            .request(method, url)
            .bearer_auth(&credential.access_token)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        path: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<T> {
        let request = self.request(Method::GET, credential, path).query(query);
        let response = self.execute(request).await?;
        self.decode(response).await
    }

    pub(crate) async fn send_json<B, T>(
        &self,
        method: Method,
        credential: &Credential,
        path: &str,
        body: &B,
    ) -> ProviderResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(method, credential, path).json(body);
        let response = self.execute(request).await?;
        self.decode(response).await
    }

    pub(crate) async fn delete(&self, credential: &Credential, path: &str) -> ProviderResult<()> {
        let request = self.request(Method::DELETE, credential, path);
        self.execute(request).await?;
        Ok(())
    }

    /// Sends the request and turns any non-2xx answer into an error.
    async fn execute(&self, request: RequestBuilder) -> ProviderResult<Response> {
        let response = request.send().await.map_err(|e| {
            let err = if e.is_timeout() {
                ProviderError::network("request timeout")
            } else if e.is_connect() {
                ProviderError::network(format!("connection failed: {}", e))
            } else {
                ProviderError::network(format!("request failed: {}", e))
            };
            err.with_provider(self.provider).with_source(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(status.as_u16(), &body).with_provider(self.provider))
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> ProviderResult<T> {
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e))
                .with_provider(self.provider)
        })?;

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
                .with_provider(self.provider)
        })
    }
}

/// Google's JSON error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Builds an error from a failed API response, keeping Google's message.
pub(crate) fn error_from_response(status: u16, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.message.or(e.error.status))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no error details".to_string()
            } else {
                trimmed.to_string()
            }
        });

    ProviderError::from_status(status, format!("API error ({}): {}", status, detail))
}
