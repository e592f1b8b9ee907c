use anyhow::Context;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{self, Config};
use crate::google::calendar::client::GoogleCalendarClient;
use crate::google::oauth::{OAuth2Client, Token};
use crate::shared::utils::path::display_path;

/// The cached authorization token, stored as JSON.
pub struct TokenStore {
    path: PathBuf,
}

/// What the token cache allows us to do without user interaction.
#[derive(Debug, PartialEq, Eq)]
pub enum CachedToken {
    Valid(Token),
    Expired { refresh_token: String },
    Missing,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cached token. An unreadable or corrupt cache counts as no token.
    pub fn load(&self) -> Option<Token> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("no cached token at {}: {}", display_path(&self.path), e);
                return None;
            }
        };

        match serde_json::from_str::<Token>(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(
                    "ignoring invalid token cache {}: {}",
                    display_path(&self.path),
                    e
                );
                None
            }
        }
    }

    pub fn save(&self, token: &Token) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(token)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(&self.path)
            .with_context(|| format!("Unable to cache oauth token at {}", display_path(&self.path)))?;
        file.write_all(text.as_bytes())?;

        Ok(())
    }
}

pub fn classify(token: Option<Token>, now: DateTime<Utc>) -> CachedToken {
    match token {
        Some(token) if !token.is_expired_at(now) => CachedToken::Valid(token),
        Some(Token {
            refresh_token: Some(refresh_token),
            ..
        }) => CachedToken::Expired { refresh_token },
        _ => CachedToken::Missing,
    }
}

/// Keeps the previous refresh token when the refresh response has none, as Google's usually doesn't.
pub fn carry_refresh_token(mut refreshed: Token, previous: String) -> Token {
    refreshed.refresh_token.get_or_insert(previous);
    refreshed
}

/// Produces an authenticated calendar client from the cached token, a
/// refresh, or an interactive authorization.
pub struct CredentialProvider {
    oauth2_client: OAuth2Client,
    store: TokenStore,
}

impl CredentialProvider {
    /// Reads the client secret. Fails before any network work if it is missing or malformed.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let secret = config::load_client_secret(&config.credentials_path)?;
        let oauth2_client = OAuth2Client::new(&secret)?;

        Ok(Self {
            oauth2_client,
            store: TokenStore::new(&config.token_path),
        })
    }

    pub async fn obtain_client(&self) -> anyhow::Result<GoogleCalendarClient> {
        let token = match classify(self.store.load(), Utc::now()) {
            CachedToken::Valid(token) => token,
            CachedToken::Expired { refresh_token } => {
                match self.oauth2_client.refresh_token(&refresh_token).await {
                    Ok(refreshed) => {
                        let refreshed = carry_refresh_token(refreshed, refresh_token);
                        info!("refreshed access token");
                        self.store.save(&refreshed)?;
                        refreshed
                    }
                    Err(e) => {
                        warn!("{:#}; requesting a new authorization", e);
                        self.authorize().await?
                    }
                }
            }
            CachedToken::Missing => self.authorize().await?,
        };

        GoogleCalendarClient::new(token.access_token)
    }

    async fn authorize(&self) -> anyhow::Result<Token> {
        let token = self.oauth2_client.oauth_flow().await?;
        println!(
            "Saving credential file to: {}",
            display_path(self.store.path())
        );
        self.store.save(&token)?;
        Ok(token)
    }
}
