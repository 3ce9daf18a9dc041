use crate::config::get_token_lifetime_seconds;
use crate::errors::{ConfigError, ConnectorError, ConnectorResult, RemoteError};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Service account key as downloaded from the Google Cloud console.
///
/// Every field is optional here; completeness is checked when credentials
/// are built so that a syntactically valid but incomplete key fails the
/// action rather than the whole session.
#[derive(Clone, Default, Deserialize)]
pub struct ServiceKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceKey {
    pub fn from_json(key_json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(key_json).map_err(|e| ConfigError::InvalidKeyJson(e.to_string()))
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceKey")
            .field("type", &self.key_type)
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("client_email", &self.client_email)
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
    scope: String,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    #[allow(dead_code)]
    expires_in: u64,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: String,
}

/// Scoped service account credentials, optionally delegated to a subject.
#[derive(Clone)]
pub struct Credentials {
    client_email: String,
    token_uri: String,
    key_id: Option<String>,
    signing_key: EncodingKey,
    scopes: Vec<String>,
    subject: Option<String>,
}

impl Credentials {
    pub fn from_service_account_info(key: &ServiceKey, scopes: &[&str]) -> ConnectorResult<Self> {
        let missing: Vec<&str> = [
            ("client_email", &key.client_email),
            ("private_key", &key.private_key),
            ("token_uri", &key.token_uri),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(ConnectorError::ServiceKey(format!(
                "Service account info was not in the expected format, missing fields {}.",
                missing.join(", ")
            )));
        }

        let pem = key.private_key.as_deref().unwrap_or_default();
        let signing_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| ConnectorError::ServiceKey(format!("Invalid private key: {}", e)))?;

        Ok(Credentials {
            client_email: key.client_email.clone().unwrap_or_default(),
            token_uri: key.token_uri.clone().unwrap_or_default(),
            key_id: key.private_key_id.clone(),
            signing_key,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            subject: None,
        })
    }

    /// Re-derive the credentials so calls are authorized as `subject`.
    pub fn with_subject(self, subject: &str) -> ConnectorResult<Self> {
        let subject = subject.trim();
        if !crate::config::is_email(subject) {
            return Err(ConnectorError::Credentials(format!(
                "Delegated subject '{}' is not a valid email address",
                subject
            )));
        }

        Ok(Credentials {
            subject: Some(subject.to_string()),
            ..self
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    fn signed_assertion(&self) -> Result<String, RemoteError> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RemoteError::Signing(e.to_string()))?
            .as_secs();

        let claims = Claims {
            iss: &self.client_email,
            sub: self.subject.as_deref(),
            scope: self.scopes.join(" "),
            aud: &self.token_uri,
            iat,
            exp: iat.saturating_add(get_token_lifetime_seconds()),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|e| RemoteError::Signing(format!("Failed to sign JWT: {}", e)))
    }

    /// Exchange a signed assertion for an access token.
    pub async fn fetch_token(&self, client: &Client) -> Result<String, RemoteError> {
        debug!(
            "Requesting token from {} for {} (subject: {})",
            self.token_uri,
            self.client_email,
            self.subject.as_deref().unwrap_or("<none>")
        );

        let assertion = self.signed_assertion()?;
        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        let response = client.post(&self.token_uri).form(&params).send().await?;

        let status = response.status();
        debug!("Token response status: {}", status);

        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(format!("Failed to get token response: {}", e)))?;

        if !status.is_success() {
            error!("Token exchange failed. Status: {}, Error: {}", status, body);
            return Err(RemoteError::Token {
                status: status.as_u16(),
                body,
            });
        }

        let token_data: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse token response: {}", e);
            RemoteError::MalformedResponse(format!("Failed to parse token response: {}", e))
        })?;

        // Never log the full token
        if log::log_enabled!(log::Level::Debug) {
            let token = &token_data.access_token;
            let token_trunc = if token.len() > 10 {
                format!("{}...{}", &token[..4], &token[token.len().saturating_sub(4)..])
            } else {
                "<short-token>".to_string()
            };
            debug!("Token (truncated): {}", token_trunc);
        }

        Ok(token_data.access_token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("scopes", &self.scopes)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}
