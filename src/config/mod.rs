pub mod error;

use crate::config::error::ConfigError;
use crate::shared::utils;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

const CREDENTIALS_FILE_ENV: &str = "CALDAY_CREDENTIALS_FILE";
const TOKEN_FILE_ENV: &str = "CALDAY_TOKEN_FILE";
const FETCH_CONCURRENCY_ENV: &str = "CALDAY_FETCH_CONCURRENCY";

const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";
const DEFAULT_TOKEN_FILE: &str = "token.json";
const DEFAULT_FETCH_CONCURRENCY: usize = 4;

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, PartialEq, Eq)]
pub struct Config {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub fetch_concurrency: usize,
}

/// OAuth client registration as downloaded from the Google Cloud console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

pub fn init() -> anyhow::Result<Config> {
    let config = from_lookup(|key| env::var(key).ok())?;
    Ok(config)
}

fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let path_from = |key: &str, default: &str| {
        let raw = lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string());
        utils::path::expand_tilde(&raw).ok_or(ConfigError::HomeDirUnavailable(raw))
    };

    let fetch_concurrency = match lookup(FETCH_CONCURRENCY_ENV) {
        Some(raw) => parse_concurrency(raw.trim())?,
        None => DEFAULT_FETCH_CONCURRENCY,
    };

    Ok(Config {
        credentials_path: path_from(CREDENTIALS_FILE_ENV, DEFAULT_CREDENTIALS_FILE)?,
        token_path: path_from(TOKEN_FILE_ENV, DEFAULT_TOKEN_FILE)?,
        fetch_concurrency,
    })
}

fn parse_concurrency(raw: &str) -> Result<usize, ConfigError> {
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ConfigError::InvalidValue(
            FETCH_CONCURRENCY_ENV.to_string(),
            raw.to_string(),
            "expected a positive integer".to_string(),
        )),
    }
}

pub fn load_client_secret(path: &Path) -> Result<ClientSecret, ConfigError> {
    let shown = utils::path::display_path(path);

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::CredentialsFileUnreadable(shown.clone(), e.to_string()))?;

    let file: ClientSecretFile = serde_json::from_str(&content)
        .map_err(|e| ConfigError::MalformedCredentials(shown.clone(), e.to_string()))?;

    file.installed
        .or(file.web)
        .ok_or(ConfigError::MissingClientSection(shown))
}
