//! Interactive authorization strategies.
//!
//! When no refreshable credential exists, the lifecycle manager asks an
//! [`Authorizer`] for a brand new grant. Which one runs is an operator choice
//! ([`AuthMode`]):
//!
//! - `browser`: PKCE with a loopback redirect. A one-shot listener on
//!   `127.0.0.1` receives Google's redirect and the browser is opened on the
//!   consent page.
//! - `console`: the consent URL is printed and the operator pastes back the
//!   code (or the whole redirected URL) on stdin.
//! - `disabled`: never prompts. Headless deployments provision the credential
//!   ahead of time with `calproxy auth google`.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;

use super::oauth::{OAuthClient, PkceFlow};
use super::tokens::Credential;

/// How long the loopback listener waits for Google's redirect.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// How long one loopback connection may take to send its request.
const CONNECTION_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Obtains a new credential through user consent.
pub trait Authorizer: Send + Sync {
    /// Runs one authorization attempt for `scopes`.
    fn authorize<'a>(&'a self, scopes: &'a [String]) -> BoxFuture<'a, ProviderResult<Credential>>;
}

/// Authorization strategy selected in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Browser,
    Console,
    Disabled,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Console => "console",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the authorizer for `mode`.
pub fn authorizer_for(
    mode: AuthMode,
    oauth: Arc<OAuthClient>,
    port_range: (u16, u16),
) -> Arc<dyn Authorizer> {
    match mode {
        AuthMode::Browser => Arc::new(LoopbackAuthorizer::new(oauth, port_range)),
        AuthMode::Console => Arc::new(ConsoleAuthorizer::new(oauth, port_range.0)),
        AuthMode::Disabled => Arc::new(DisabledAuthorizer),
    }
}

/// Parameters Google appends to the redirect URI.
#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// Extracts the code. A missing state is accepted only when
    /// `state_required` is false.
    fn into_code(self, expected_state: &str, state_required: bool) -> ProviderResult<String> {
        if let Some(error) = self.error {
            return Err(ProviderError::authentication(format!(
                "authorization denied: {}",
                error
            )));
        }

        match self.state.as_deref() {
            Some(state) if state != expected_state => {
                return Err(ProviderError::authentication(
                    "OAuth state mismatch - possible CSRF attack",
                ));
            }
            None if state_required => {
                return Err(ProviderError::authentication("OAuth callback carried no state"));
            }
            _ => {}
        }

        self.code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ProviderError::authentication("no authorization code received"))
    }
}

type Launcher = Arc<dyn Fn(&str) -> io::Result<()> + Send + Sync>;

/// Browser based PKCE flow with a loopback redirect.
pub struct LoopbackAuthorizer {
    oauth: Arc<OAuthClient>,
    port_range: (u16, u16),
    callback_timeout: Duration,
    launcher: Launcher,
}

impl LoopbackAuthorizer {
    pub fn new(oauth: Arc<OAuthClient>, port_range: (u16, u16)) -> Self {
        Self {
            oauth,
            port_range,
            callback_timeout: CALLBACK_TIMEOUT,
            launcher: Arc::new(|url: &str| open::that(url)),
        }
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Replaces the function that opens the consent page.
    pub fn with_launcher<F>(mut self, launcher: F) -> Self
    where
        F: Fn(&str) -> io::Result<()> + Send + Sync + 'static,
    {
        self.launcher = Arc::new(launcher);
        self
    }

    async fn run(&self, scopes: &[String]) -> ProviderResult<Credential> {
        let pkce = PkceFlow::new();

        let (listener, port) = bind_loopback(self.port_range).await?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", port);
        let auth_url = self.oauth.authorization_url(&pkce, &redirect_uri, scopes);

        info!(port, client_id = self.oauth.client_id(), "starting OAuth flow, opening browser");
        if let Err(e) = (self.launcher)(&auth_url) {
            warn!("failed to open browser: {}", e);
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        let params = tokio::time::timeout(self.callback_timeout, wait_for_callback(listener, CONNECTION_READ_TIMEOUT))
            .await
            .map_err(|_| ProviderError::authentication("OAuth callback timeout"))??;

        let code = params.into_code(&pkce.state, true)?;
        info!("received authorization code, exchanging for tokens");

        self.oauth
            .exchange_code(&code, &pkce.verifier, &redirect_uri, scopes)
            .await
    }
}

impl fmt::Debug for LoopbackAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackAuthorizer")
            .field("port_range", &self.port_range)
            .field("callback_timeout", &self.callback_timeout)
            .finish_non_exhaustive()
    }
}

impl Authorizer for LoopbackAuthorizer {
    fn authorize<'a>(&'a self, scopes: &'a [String]) -> BoxFuture<'a, ProviderResult<Credential>> {
        Box::pin(self.run(scopes))
    }
}

/// Binds the first free port in `port_range` on the loopback interface.
async fn bind_loopback(port_range: (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
    for port in port_range.0..=port_range.1 {
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => {
                debug!("bound loopback server on port {}", port);
                return Ok((listener, port));
            }
            Err(e) => debug!("port {} unavailable: {}", port, e),
        }
    }
    Err(ProviderError::configuration(format!(
        "no available port in range {}-{}",
        port_range.0, port_range.1
    )))
}

/// Accepts connections until one hits `/callback`.
///
/// A connection that sends nothing within `read_timeout` is dropped so it
/// cannot hold up the redirect. Browsers open speculative connections.
async fn wait_for_callback(listener: TcpListener, read_timeout: Duration) -> ProviderResult<CallbackParams> {
    loop {
        let (stream, peer) = listener.accept().await.map_err(|e| {
            ProviderError::internal(format!("failed to accept callback connection: {}", e))
        })?;
        debug!(%peer, "callback connection");

        match tokio::time::timeout(read_timeout, handle_callback(stream)).await {
            Ok(Some(params)) => return Ok(params),
            Ok(None) => {}
            Err(_) => debug!(%peer, "callback connection idle, dropping it"),
        }
    }
}

/// Reads one request. Returns `None` for anything that is not the redirect
/// (favicon requests, health checks).
async fn handle_callback(stream: TcpStream) -> Option<CallbackParams> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.ok()?;

    // GET /callback?code=...&state=... HTTP/1.1
    let mut parts = request_line.split_whitespace();
    let (method, target) = (parts.next()?, parts.next()?);

    // Drain the headers so closing the socket does not reset the connection.
    let mut header = String::new();
    loop {
        header.clear();
        match reader.read_line(&mut header).await {
            Ok(0) | Err(_) => break,
            Ok(_) if header.trim().is_empty() => break,
            Ok(_) => {}
        }
    }

    let mut stream = reader.into_inner();
    if method != "GET" || !target.starts_with("/callback") {
        let _ = stream
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await;
        return None;
    }

    let query = target.split_once('?').map(|(_, q)| q).unwrap_or("");
    let params = CallbackParams::from_query(query);

    let (status, title, text) = if params.error.is_some() || params.code.is_none() {
        ("400 Bad Request", "Authorization Failed", "You can close this window.")
    } else {
        (
            "200 OK",
            "Authorization Successful",
            "You can close this window and return to the terminal.",
        )
    };
    let body = format!("<html><body><h1>{}</h1><p>{}</p></body></html>", title, text);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;

    Some(params)
}

/// Copy/paste flow for machines without a browser.
#[derive(Debug)]
pub struct ConsoleAuthorizer {
    oauth: Arc<OAuthClient>,
    redirect_uri: String,
}

impl ConsoleAuthorizer {
    /// Nothing listens on `redirect_port`; the operator copies the redirected
    /// URL out of the browser's address bar.
    pub fn new(oauth: Arc<OAuthClient>, redirect_port: u16) -> Self {
        Self {
            oauth,
            redirect_uri: format!("http://127.0.0.1:{}/callback", redirect_port),
        }
    }

    async fn run(&self, scopes: &[String]) -> ProviderResult<Credential> {
        let pkce = PkceFlow::new();
        let auth_url = self.oauth.authorization_url(&pkce, &self.redirect_uri, scopes);

        eprintln!(
            "\nOpen this URL in a browser and grant access:\n\n{}\n\n\
             Then paste the authorization code, or the full URL the browser was \
             redirected to:",
            auth_url
        );

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(|e| ProviderError::internal(format!("failed to read from stdin: {}", e)))?;

        let code = parse_pasted(&line, &pkce.state)?;
        info!("exchanging pasted authorization code");

        self.oauth
            .exchange_code(&code, &pkce.verifier, &self.redirect_uri, scopes)
            .await
    }
}

impl Authorizer for ConsoleAuthorizer {
    fn authorize<'a>(&'a self, scopes: &'a [String]) -> BoxFuture<'a, ProviderResult<Credential>> {
        Box::pin(self.run(scopes))
    }
}

/// Accepts either a bare code or a redirected URL carrying `code`/`state`.
fn parse_pasted(input: &str, expected_state: &str) -> ProviderResult<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ProviderError::authentication("no authorization code entered"));
    }

    match url::Url::parse(input) {
        Ok(url) => CallbackParams::from_query(url.query().unwrap_or("")).into_code(expected_state, false),
        Err(_) => Ok(input.to_string()),
    }
}

/// Refuses to prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledAuthorizer;

impl Authorizer for DisabledAuthorizer {
    fn authorize<'a>(&'a self, _scopes: &'a [String]) -> BoxFuture<'a, ProviderResult<Credential>> {
        Box::pin(async {
            Err(ProviderError::authentication(
                "no usable credential and interactive authorization is disabled; \
                 run `calproxy auth google` to provision one",
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderErrorCode;
    use crate::google::config::OAuthCredentials;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scopes() -> Vec<String> {
        vec!["https://www.googleapis.com/auth/calendar".to_string()]
    }

    fn oauth(token_url: String) -> Arc<OAuthClient> {
        Arc::new(
            OAuthClient::new(
                OAuthCredentials::new("id.apps.googleusercontent.com", "secret"),
                Duration::from_secs(5),
            )
            .unwrap()
            .with_token_url(token_url),
        )
    }

    fn query_value(url: &url::Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn auth_mode_serde() {
        assert_eq!(serde_json::to_string(&AuthMode::Console).unwrap(), "\"console\"");
        assert_eq!(
            serde_json::from_str::<AuthMode>("\"disabled\"").unwrap(),
            AuthMode::Disabled
        );
        assert_eq!(AuthMode::default(), AuthMode::Browser);
        assert_eq!(AuthMode::Browser.to_string(), "browser");
    }

    #[test]
    fn callback_params_parsing() {
        let params = CallbackParams::from_query("code=4%2F0Ab&state=xyz&scope=a+b");
        assert_eq!(params.code.as_deref(), Some("4/0Ab"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
        assert_eq!(params.into_code("xyz", true).unwrap(), "4/0Ab");
    }

    #[test]
    fn callback_state_checks() {
        let mismatch = CallbackParams::from_query("code=c&state=evil");
        assert!(mismatch.into_code("good", true).is_err());

        let missing = CallbackParams::from_query("code=c");
        assert!(CallbackParams::from_query("code=c").into_code("good", true).is_err());
        assert_eq!(missing.into_code("good", false).unwrap(), "c");
    }

    #[test]
    fn callback_error_is_reported() {
        let err = CallbackParams::from_query("error=access_denied&state=s")
            .into_code("s", true)
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert!(err.message().contains("access_denied"));
    }

    #[test]
    fn pasted_input_forms() {
        assert_eq!(parse_pasted("  4/raw-code\n", "s").unwrap(), "4/raw-code");
        assert_eq!(
            parse_pasted("http://127.0.0.1:8080/callback?state=s&code=abc", "s").unwrap(),
            "abc"
        );
        assert!(parse_pasted("http://127.0.0.1:8080/callback?state=x&code=abc", "s").is_err());
        assert!(parse_pasted("\n", "s").is_err());
    }

    #[tokio::test]
    async fn disabled_never_prompts() {
        let err = DisabledAuthorizer.authorize(&scopes()).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
    }

    #[tokio::test]
    async fn loopback_flow_exchanges_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=loopback-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access",
                "refresh_token": "refresh",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        // Plays the browser: follows the consent URL straight to the redirect.
        let authorizer = LoopbackAuthorizer::new(oauth(format!("{}/token", server.uri())), (18480, 18499))
            .with_callback_timeout(Duration::from_secs(10))
            .with_launcher(|auth_url: &str| {
                let auth_url = url::Url::parse(auth_url).map_err(io::Error::other)?;
                let redirect = query_value(&auth_url, "redirect_uri").unwrap_or_default();
                let state = query_value(&auth_url, "state").unwrap_or_default();
                tokio::spawn(async move {
                    let target = format!("{}?code=loopback-code&state={}", redirect, state);
                    let _ = reqwest::get(target).await;
                });
                Ok(())
            });

        let credential = authorizer.authorize(&scopes()).await.unwrap();
        assert_eq!(credential.access_token, "access");
        assert_eq!(credential.refresh_token.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn loopback_flow_times_out() {
        let authorizer = LoopbackAuthorizer::new(oauth("http://127.0.0.1:1/token".into()), (18500, 18519))
            .with_callback_timeout(Duration::from_millis(100))
            .with_launcher(|_| Ok(()));

        let err = authorizer.authorize(&scopes()).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert!(err.message().contains("timeout"));
    }

    #[tokio::test]
    async fn loopback_ignores_unrelated_requests() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let waiter = tokio::spawn(wait_for_callback(listener, CONNECTION_READ_TIMEOUT));

        let favicon = reqwest::get(format!("http://127.0.0.1:{}/favicon.ico", port))
            .await
            .unwrap();
        assert_eq!(favicon.status().as_u16(), 404);

        let callback = reqwest::get(format!("http://127.0.0.1:{}/callback?code=c&state=s", port))
            .await
            .unwrap();
        assert_eq!(callback.status().as_u16(), 200);

        let params = waiter.await.unwrap().unwrap();
        assert_eq!(params.code.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn loopback_drops_idle_connections() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let waiter = tokio::spawn(wait_for_callback(listener, Duration::from_millis(200)));

        // Connects first and never sends a request line.
        let _idle = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let callback = reqwest::get(format!("http://127.0.0.1:{}/callback?code=late&state=s", port))
            .await
            .unwrap();
        assert_eq!(callback.status().as_u16(), 200);

        let params = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("callback not handled after idle connection")
            .unwrap()
            .unwrap();
        assert_eq!(params.code.as_deref(), Some("late"));
    }
}
