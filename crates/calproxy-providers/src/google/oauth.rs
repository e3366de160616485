//! OAuth 2.0 token endpoint client and PKCE helpers for Google.
//!
//! This module knows how to talk to Google's token endpoint (authorization
//! code exchange and refresh) and how to build a PKCE authorization URL. How
//! the user gets from that URL back to an authorization code is the job of an
//! [`Authorizer`](super::authorize::Authorizer).

use std::collections::BTreeSet;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;

use super::config::OAuthCredentials;
use super::tokens::Credential;

/// Google OAuth endpoints.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Access token data returned by a refresh grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
    /// Set only when the provider rotates the refresh token.
    pub refresh_token: Option<String>,
    /// Set only when the provider reports the granted scopes.
    pub scopes: Option<BTreeSet<String>>,
    pub token_type: Option<String>,
}

/// Something that can trade a refresh token for a new access token.
pub trait TokenRefresher: Send + Sync {
    /// Performs a refresh grant.
    ///
    /// An `AuthenticationFailed` error means the grant itself was rejected
    /// (revoked or expired refresh token). Any other code is transient.
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, ProviderResult<RefreshedToken>>;
}

/// OAuth client for Google's token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
    token_url: String,
}

impl OAuthClient {
    /// Creates a new OAuth client with the given credentials.
    pub fn new(credentials: OAuthCredentials, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            credentials,
            http_client,
            token_url: GOOGLE_TOKEN_URL.to_string(),
        })
    }

    /// Overrides the token endpoint (used against mock servers).
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn client_id(&self) -> &str {
        &self.credentials.client_id
    }

    /// Builds the consent page URL for `pkce`.
    pub fn authorization_url(&self, pkce: &PkceFlow, redirect_uri: &str, scopes: &[String]) -> String {
        pkce.build_auth_url(GOOGLE_AUTH_URL, &self.credentials.client_id, redirect_uri, scopes)
    }

    /// Exchanges an authorization code for a fresh credential.
    ///
    /// The granted scopes come from the response when Google reports them,
    /// otherwise the requested scopes are assumed.
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> ProviderResult<Credential> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let token = self.post_token(&params, "token exchange").await?;

        let granted = token
            .granted_scopes()
            .unwrap_or_else(|| scopes.iter().cloned().collect());

        if token.refresh_token.is_none() {
            warn!("token exchange returned no refresh token; the credential cannot be renewed silently");
        }

        info!("obtained new credential from authorization code");
        let mut credential = Credential::new(
            token.access_token,
            token.refresh_token,
            token.expires_in,
            granted,
        );
        if let Some(token_type) = token.token_type {
            credential.token_type = token_type;
        }
        Ok(credential)
    }

    /// Refreshes an expired access token using the refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> ProviderResult<RefreshedToken> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token = self.post_token(&params, "token refresh").await?;
        info!("refreshed access token");

        Ok(RefreshedToken {
            scopes: token.granted_scopes(),
            access_token: token.access_token,
            expires_in: token.expires_in,
            refresh_token: token.refresh_token,
            token_type: token.token_type,
        })
    }

    async fn post_token(&self, params: &[(&str, &str)], what: &str) -> ProviderResult<TokenResponse> {
        debug!(url = %self.token_url, "{} request", what);

        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("{} request failed: {}", what, e))
                    .with_provider("oauth")
                    .with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read {} response: {}", what, e))
                .with_provider("oauth")
        })?;

        if !status.is_success() {
            return Err(classify_token_error(status.as_u16(), &body, what));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid {} response: {}", what, e))
                .with_provider("oauth")
        })
    }
}

impl TokenRefresher for OAuthClient {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, ProviderResult<RefreshedToken>> {
        Box::pin(self.refresh_token(refresh_token))
    }
}

/// Maps a failed token endpoint response to an error.
///
/// 400/401 mean Google looked at the grant and refused it; everything else
/// is treated as a transient failure of the endpoint.
fn classify_token_error(status: u16, body: &str, what: &str) -> ProviderError {
    let detail = serde_json::from_str::<TokenErrorResponse>(body)
        .map(|e| match e.error_description {
            Some(desc) => format!("{}: {}", e.error, desc),
            None => e.error,
        })
        .unwrap_or_else(|_| body.trim().to_string());

    let message = format!("{} failed ({}): {}", what, status, detail);
    let err = match status {
        400 | 401 => ProviderError::authentication(message),
        429 => ProviderError::new(crate::ProviderErrorCode::RateLimited, message),
        _ => ProviderError::server(message),
    };
    err.with_status(status).with_provider("oauth")
}

/// PKCE flow state and utilities.
///
/// Implements RFC 7636 (Proof Key for Code Exchange).
#[derive(Debug, Clone)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = random_urlsafe(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_urlsafe(16),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Builds the authorization URL against `auth_url`.
    ///
    /// `access_type=offline` and `prompt=consent` make Google issue a refresh
    /// token every time.
    pub fn build_auth_url(
        &self,
        auth_url: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            auth_url,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_urlsafe(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    /// Space separated list of granted scopes.
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn granted_scopes(&self) -> Option<BTreeSet<String>> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(String::from).collect())
            .filter(|set: &BTreeSet<String>| !set.is_empty())
    }
}

/// Error body from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}
