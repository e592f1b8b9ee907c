use std::borrow::Cow;

use anyhow::Context;
use chrono::{DateTime, Utc};
use oauth2::{
    basic::{
        BasicClient, BasicErrorResponse, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenResponse,
    },
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError, Scope,
    StandardRevocableToken, TokenResponse, TokenUrl,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as AsyncBufReader};
use tracing::{debug, warn};

use crate::config;

const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// The loopback listener binds here, and the redirect URI names the same address.
const LOOPBACK_HOST: &str = "127.0.0.1";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid {0} '{1}': {2}")]
    InvalidEndpoint(&'static str, String, String),
    #[error("unable to build http client: {0}")]
    HttpClient(String),
    #[error("no authorization code was received")]
    MissingCode,
    #[error("authorization was denied: {0}")]
    Denied(String),
    #[error("authorization response state does not match the request")]
    StateMismatch,
    #[error("unable to retrieve token from web: {0}")]
    Exchange(String),
    #[error("unable to refresh token: {0}")]
    Refresh(String),
}

pub struct OAuth2Client {
    client: oauth2::Client<
        BasicErrorResponse,
        BasicTokenResponse,
        BasicTokenIntrospectionResponse,
        StandardRevocableToken,
        BasicRevocationErrorResponse,
        EndpointSet,    // Auth URL
        EndpointNotSet, // Device auth
        EndpointNotSet, // Introspection
        EndpointNotSet, // Revocation
        EndpointSet,    // Token URL
    >,
    http_client: reqwest::Client,
    redirect: RedirectMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RedirectMode {
    /// Google redirects the browser to a local listener. Port 0 picks a free one.
    Loopback { port: u16 },
    /// The user copies the code by hand.
    Manual(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

impl Token {
    pub fn from_token_response(response: &BasicTokenResponse, now: DateTime<Utc>) -> Self {
        let expires_at = response
            .expires_in()
            .map(|duration| now.timestamp() + duration.as_secs() as i64);

        Token {
            access_token: response.access_token().secret().clone(),
            refresh_token: response.refresh_token().map(|r| r.secret().clone()),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => exp - EXPIRY_SKEW_SECS <= now.timestamp(),
            None => false,
        }
    }
}

impl OAuth2Client {
    pub fn new(secret: &config::ClientSecret) -> Result<Self, AuthError> {
        let auth_url = AuthUrl::new(secret.auth_uri.clone()).map_err(|e| {
            AuthError::InvalidEndpoint("auth_uri", secret.auth_uri.clone(), e.to_string())
        })?;
        let token_url = TokenUrl::new(secret.token_uri.clone()).map_err(|e| {
            AuthError::InvalidEndpoint("token_uri", secret.token_uri.clone(), e.to_string())
        })?;

        // The token endpoint must not be allowed to redirect us.
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AuthError::HttpClient(e.to_string()))?;

        Ok(Self {
            client: BasicClient::new(ClientId::new(secret.client_id.clone()))
                .set_client_secret(ClientSecret::new(secret.client_secret.clone()))
                .set_auth_uri(auth_url)
                .set_token_uri(token_url),
            http_client,
            redirect: redirect_mode(&secret.redirect_uris),
        })
    }

    /// Runs the interactive authorization-code exchange.
    pub async fn oauth_flow(&self) -> anyhow::Result<Token> {
        match &self.redirect {
            RedirectMode::Loopback { port } => self.loopback_flow(*port).await,
            RedirectMode::Manual(uri) => self.manual_flow(uri).await,
        }
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> anyhow::Result<Token> {
        let refresh_token = RefreshToken::new(refresh_token.to_string());
        let token_response = self
            .client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http_client)
            .await
            .map_err(|e| AuthError::Refresh(describe_token_error(e)))?;

        Ok(Token::from_token_response(&token_response, Utc::now()))
    }

    fn authorize_url(&self, redirect: &RedirectUrl) -> (Url, CsrfToken, PkceCodeVerifier) {
        let (pkce_code_challenge, pkce_code_verifier) = PkceCodeChallenge::new_random_sha256();

        let (authorize_url, csrf_state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(CALENDAR_READONLY_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .set_pkce_challenge(pkce_code_challenge)
            .set_redirect_uri(Cow::Borrowed(redirect))
            .url();

        (authorize_url, csrf_state, pkce_code_verifier)
    }

    async fn loopback_flow(&self, port: u16) -> anyhow::Result<Token> {
        let listener = tokio::net::TcpListener::bind((LOOPBACK_HOST, port))
            .await
            .with_context(|| format!("Unable to listen for the OAuth redirect on port {}", port))?;

        let redirect_url = loopback_redirect_url(listener.local_addr()?.port());
        let redirect = RedirectUrl::new(redirect_url.clone())
            .map_err(|e| AuthError::InvalidEndpoint("redirect_uri", redirect_url, e.to_string()))?;

        let (authorize_url, csrf_state, pkce_code_verifier) = self.authorize_url(&redirect);

        println!(
            "Go to the following link in your browser to authorize access: \n{}",
            authorize_url
        );
        if let Err(e) = webbrowser::open(authorize_url.as_str()) {
            warn!("unable to open a browser: {}", e);
        }

        let (mut stream, peer) = listener.accept().await?;
        debug!(%peer, "received OAuth redirect");

        let mut reader = AsyncBufReader::new(&mut stream);
        let mut redirect_request_line = String::new();
        reader.read_line(&mut redirect_request_line).await?;

        let parsed = parse_redirect_request(&redirect_request_line);

        let message = match &parsed {
            Ok(_) => "Authorization received. Go back to your terminal :)",
            Err(_) => "Authorization failed. Check your terminal for details.",
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            message.len(),
            message
        );
        stream.write_all(response.as_bytes()).await?;

        let (code, state) = parsed?;
        if state != *csrf_state.secret() {
            return Err(AuthError::StateMismatch.into());
        }

        self.exchange(code, pkce_code_verifier, redirect).await
    }

    async fn manual_flow(&self, redirect_uri: &str) -> anyhow::Result<Token> {
        let redirect = RedirectUrl::new(redirect_uri.to_string()).map_err(|e| {
            AuthError::InvalidEndpoint("redirect_uri", redirect_uri.to_string(), e.to_string())
        })?;

        let (authorize_url, _csrf_state, pkce_code_verifier) = self.authorize_url(&redirect);

        println!(
            "Go to the following link in your browser then type the authorization code: \n{}",
            authorize_url
        );

        let mut line = String::new();
        AsyncBufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context("Unable to read authorization code")?;

        let code = extract_code(&line).ok_or(AuthError::MissingCode)?;

        self.exchange(code, pkce_code_verifier, redirect).await
    }

    async fn exchange(
        &self,
        code: String,
        pkce_code_verifier: PkceCodeVerifier,
        redirect: RedirectUrl,
    ) -> anyhow::Result<Token> {
        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_code_verifier)
            .set_redirect_uri(Cow::Owned(redirect))
            .request_async(&self.http_client)
            .await
            .map_err(|e| AuthError::Exchange(describe_token_error(e)))?;

        Ok(Token::from_token_response(&token_response, Utc::now()))
    }
}

fn describe_token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> String
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => response.to_string(),
        RequestTokenError::Request(e) => e.to_string(),
        other => other.to_string(),
    }
}

fn loopback_redirect_url(port: u16) -> String {
    format!("http://{}:{}", LOOPBACK_HOST, port)
}

/// A registered `http://localhost` redirect is served on the loopback address,
/// since `localhost` may resolve to `::1` in the browser.
fn redirect_mode(redirect_uris: &[String]) -> RedirectMode {
    let Some(first) = redirect_uris.first() else {
        return RedirectMode::Loopback { port: 0 };
    };

    match Url::parse(first) {
        Ok(url)
            if url.scheme() == "http"
                && matches!(url.host_str(), Some("localhost") | Some("127.0.0.1")) =>
        {
            RedirectMode::Loopback {
                port: url.port().unwrap_or(0),
            }
        }
        _ => RedirectMode::Manual(first.clone()),
    }
}

/// Pulls `(code, state)` out of the first line of the browser's redirect request.
fn parse_redirect_request(request_line: &str) -> Result<(String, String), AuthError> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or(AuthError::MissingCode)?;

    let url = Url::parse(&format!("http://localhost{}", target))
        .map_err(|_| AuthError::MissingCode)?;

    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    if let Some(error) = param("error") {
        return Err(AuthError::Denied(error));
    }

    let code = param("code").ok_or(AuthError::MissingCode)?;
    let state = param("state").ok_or(AuthError::StateMismatch)?;

    Ok((code, state))
}

/// Accepts either the bare code or the full redirect URL pasted from the browser.
fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    match Url::parse(input) {
        Ok(url) if url.query().is_some() => url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, code)| code.into_owned()),
        _ => Some(input.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn secret(redirect_uris: &[&str]) -> config::ClientSecret {
        config::ClientSecret {
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            redirect_uris: redirect_uris.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let token = |expires_at| Token {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at,
        };

        assert!(!token(None).is_expired_at(now));
        assert!(!token(Some(now.timestamp() + 3600)).is_expired_at(now));
        assert!(token(Some(now.timestamp() + 30)).is_expired_at(now));
        assert!(token(Some(now.timestamp() - 1)).is_expired_at(now));
    }

    #[test]
    fn test_token_json_shape() -> anyhow::Result<()> {
        let token: Token = serde_json::from_str(
            r#"{"access_token": "ya29.a0", "refresh_token": "1//0g", "expires_at": 1704103200}"#,
        )?;
        assert_eq!(token.refresh_token.as_deref(), Some("1//0g"));
        assert_eq!(token.expires_at, Some(1704103200));
        Ok(())
    }

    #[test]
    fn test_redirect_mode() {
        assert_eq!(redirect_mode(&[]), RedirectMode::Loopback { port: 0 });
        assert_eq!(
            redirect_mode(&["http://localhost".to_string()]),
            RedirectMode::Loopback { port: 0 }
        );
        assert_eq!(
            redirect_mode(&["http://localhost:8085".to_string()]),
            RedirectMode::Loopback { port: 8085 }
        );
        assert_eq!(
            redirect_mode(&["http://127.0.0.1:9004".to_string()]),
            RedirectMode::Loopback { port: 9004 }
        );
        assert_eq!(
            redirect_mode(&["urn:ietf:wg:oauth:2.0:oob".to_string()]),
            RedirectMode::Manual("urn:ietf:wg:oauth:2.0:oob".to_string())
        );
        assert_eq!(
            redirect_mode(&["https://example.com/callback".to_string()]),
            RedirectMode::Manual("https://example.com/callback".to_string())
        );
    }

    #[test]
    fn test_parse_redirect_request() {
        let line = "GET /?state=abc123&code=4%2F0AX4XfWh&scope=https://www.googleapis.com/auth/calendar.readonly HTTP/1.1\r\n";
        let (code, state) = parse_redirect_request(line).unwrap();
        assert_eq!(code, "4/0AX4XfWh");
        assert_eq!(state, "abc123");
    }

    #[test]
    fn test_parse_redirect_request_errors() {
        assert!(matches!(
            parse_redirect_request("GET /?error=access_denied&state=abc HTTP/1.1"),
            Err(AuthError::Denied(ref e)) if e == "access_denied"
        ));
        assert!(matches!(
            parse_redirect_request("GET /?state=abc HTTP/1.1"),
            Err(AuthError::MissingCode)
        ));
        assert!(matches!(
            parse_redirect_request("GET /?code=xyz HTTP/1.1"),
            Err(AuthError::StateMismatch)
        ));
        assert!(matches!(
            parse_redirect_request(""),
            Err(AuthError::MissingCode)
        ));
    }

    #[test]
    fn test_extract_code() {
        assert_eq!(extract_code("  4/0AX4XfWh\n"), Some("4/0AX4XfWh".to_string()));
        assert_eq!(
            extract_code("http://localhost/?state=s&code=4%2Fabc&scope=x"),
            Some("4/abc".to_string())
        );
        assert_eq!(extract_code("\n"), None);
        assert_eq!(extract_code("http://localhost/?state=s"), None);
    }

    #[tokio::test]
    async fn test_loopback_redirect_matches_listener() -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind((LOOPBACK_HOST, 0)).await?;
        let addr = listener.local_addr()?;

        let redirect = Url::parse(&loopback_redirect_url(addr.port()))?;

        assert_eq!(redirect.host_str(), Some(addr.ip().to_string().as_str()));
        assert_eq!(redirect.port(), Some(addr.port()));
        Ok(())
    }

    #[test]
    fn test_authorize_url() -> anyhow::Result<()> {
        let client = OAuth2Client::new(&secret(&["http://localhost"]))?;
        let redirect = RedirectUrl::new(loopback_redirect_url(8123))?;

        let (url, state, _verifier) = client.authorize_url(&redirect);

        let pairs: std::collections::HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(pairs["client_id"], "test_client_id");
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:8123");
        assert_eq!(pairs["scope"], CALENDAR_READONLY_SCOPE);
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(&pairs["state"], state.secret());

        Ok(())
    }

    #[test]
    fn test_invalid_endpoint() {
        let mut bad = secret(&[]);
        bad.token_uri = "not a url".to_string();

        assert!(matches!(
            OAuth2Client::new(&bad),
            Err(AuthError::InvalidEndpoint("token_uri", _, _))
        ));
    }
}
