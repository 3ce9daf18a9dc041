use crate::errors::ConfigError;
use dotenv::dotenv;
use log::debug;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Asset configuration handed over by the host platform.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    /// Contents of the service account JSON key file
    pub key_json: String,
    /// Admin account the service account impersonates for directory calls
    pub login_email: String,
}

impl AssetConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // If DOTENV_PATH is set, use that path, otherwise use default
        if let Ok(path) = env::var("DOTENV_PATH") {
            let _ = dotenv::from_path(path);
        } else {
            let _ = dotenv();
        }

        debug!("Loading asset configuration from environment");

        let key_json = env::var("GSGMAIL_KEY_JSON")
            .map_err(|_| ConfigError::MissingEnvVar("GSGMAIL_KEY_JSON".to_string()))?;

        let login_email = env::var("GSGMAIL_LOGIN_EMAIL")
            .map_err(|_| ConfigError::MissingEnvVar("GSGMAIL_LOGIN_EMAIL".to_string()))?;

        debug!("Asset configuration loaded for {}", login_email);

        Ok(AssetConfig {
            key_json,
            login_email,
        })
    }
}

/// Base URLs of the two Google APIs the connector talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub gmail: String,
    pub directory: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            gmail: GMAIL_API_BASE_URL.to_string(),
            directory: DIRECTORY_API_BASE_URL.to_string(),
        }
    }
}

impl Endpoints {
    pub fn from_env() -> Self {
        let defaults = Endpoints::default();
        Endpoints {
            gmail: env::var("GSGMAIL_GMAIL_BASE_URL").unwrap_or(defaults.gmail),
            directory: env::var("GSGMAIL_DIRECTORY_BASE_URL").unwrap_or(defaults.directory),
        }
    }
}

/// Basic shape check: one `@`, non-empty local part, dotted domain, no whitespace.
pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

// API URL constants
pub const GMAIL_API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";
pub const DIRECTORY_API_BASE_URL: &str = "https://admin.googleapis.com/admin/directory/v1";

// OAuth scopes
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";
pub const GMAIL_FULL_SCOPE: &str = "https://mail.google.com/";
pub const DIRECTORY_USER_SCOPE: &str = "https://www.googleapis.com/auth/admin.directory.user";

// Action parameter defaults
pub const DEFAULT_MAX_RESULTS: u64 = 100;
pub const DEFAULT_MAX_ITEMS: u64 = 500;

/// Google rejects service account assertions valid for more than an hour.
pub const MAX_TOKEN_LIFETIME_SECONDS: u64 = 3600;

/// Lifetime requested for the signed service account assertion.
///
/// Read from `TOKEN_LIFETIME_SECONDS`; unset, unparseable or zero values use
/// the maximum, larger values are clamped to it.
pub fn get_token_lifetime_seconds() -> u64 {
    env::var("TOKEN_LIFETIME_SECONDS")
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map_or(MAX_TOKEN_LIFETIME_SECONDS, |secs| {
            secs.min(MAX_TOKEN_LIFETIME_SECONDS)
        })
}

/// Input file for the command-line debug entry point.
///
/// ```json
/// { "identifier": "run_query", "config": { ... }, "parameters": [ { ... } ] }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TestBundle {
    #[serde(alias = "action")]
    pub identifier: String,
    #[serde(default)]
    pub config: Option<AssetConfig>,
    #[serde(default)]
    pub parameters: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl TestBundle {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidBundle(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|e| ConfigError::InvalidBundle(e.to_string()))
    }

    /// Asset config from the bundle, or from the environment when absent.
    pub fn asset_config(&self) -> Result<AssetConfig, ConfigError> {
        match &self.config {
            Some(config) => Ok(config.clone()),
            None => AssetConfig::from_env(),
        }
    }
}
