use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub const ERR_CODE_UNAVAILABLE: &str = "Error code unavailable";
pub const ERR_MESSAGE_UNAVAILABLE: &str =
    "Error message unavailable. Please check the asset configuration and|or action parameters";

pub const EMAIL_FETCH_FAILURE: &str = "Unable to fetch email details";
pub const USERS_FETCH_FAILURE: &str = "Unable to fetch users";

/// Errors raised while loading the asset configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unable to load the key json. {0}")]
    InvalidKeyJson(String),

    #[error("Asset config 'login_email' failed validation")]
    InvalidLoginEmail(String),

    #[error("Unable to read test bundle: {0}")]
    InvalidBundle(String),
}

/// A failed call against a Google endpoint.
///
/// Status-bearing variants carry two fields (status and body), the others a
/// single message. `describe` turns any of them into a code/message pair.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    Api { status: u16, body: String },
    Token { status: u16, body: String },
    Transport(String),
    Signing(String),
    MalformedResponse(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        describe(self).fmt(f)
    }
}

impl RemoteError {
    /// Gmail answers unknown, malformed or foreign message ids with 400, 403 or 404.
    pub fn is_missing_message(&self) -> bool {
        matches!(self, RemoteError::Api { status: 400 | 403 | 404, .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDescription {
    pub code: String,
    pub message: String,
}

impl fmt::Display for ErrorDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error Code: {}. Error Message: {}", self.code, self.message)
    }
}

/// Reduce a remote failure to a stable code/message pair.
///
/// Structured `{"error": {...}}` payloads win over the raw status and body,
/// then the raw fields, then the sentinels.
pub fn describe(err: &RemoteError) -> ErrorDescription {
    let (code, message) = match err {
        RemoteError::Api { status, body } | RemoteError::Token { status, body } => {
            let (code, message) = decode_error_body(body);
            (
                code.unwrap_or_else(|| status.to_string()),
                message.unwrap_or_else(|| body.clone()),
            )
        }
        RemoteError::Transport(msg)
        | RemoteError::Signing(msg)
        | RemoteError::MalformedResponse(msg) => (ERR_CODE_UNAVAILABLE.to_string(), msg.clone()),
    };

    ErrorDescription {
        code: if code.trim().is_empty() {
            ERR_CODE_UNAVAILABLE.to_string()
        } else {
            code
        },
        message: if message.trim().is_empty() {
            ERR_MESSAGE_UNAVAILABLE.to_string()
        } else {
            message
        },
    }
}

// Non-JSON bodies yield (None, None) and the raw fields are kept.
fn decode_error_body(body: &str) -> (Option<String>, Option<String>) {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return (None, None),
    };

    match parsed.get("error") {
        Some(Value::Object(error)) => {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .map(str::to_string);
            let code = error.get("code").and_then(scalar_to_string);
            (code, message)
        }
        // OAuth token endpoint shape
        Some(Value::String(code)) => {
            let message = parsed
                .get("error_description")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .map(str::to_string);
            (Some(code.clone()).filter(|c| !c.is_empty()), message)
        }
        _ => (None, None),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) if n.as_i64() != Some(0) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Everything that can fail an action invocation.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("{0}")]
    InvalidParameter(String),

    #[error("Unable to create load the key json. {0}")]
    ServiceKey(String),

    #[error("Unable to create delegated credentials. {0}")]
    Credentials(String),

    #[error(
        "Failed to create service object for API: {api}-{version}. {reason} Please make sure the user '{}' is valid and the service account has the proper scopes enabled.",
        .subject.as_deref().unwrap_or("None")
    )]
    ServiceBuild {
        api: String,
        version: String,
        subject: Option<String>,
        reason: String,
    },

    #[error("{context}. {source}")]
    Remote {
        context: String,
        #[source]
        source: RemoteError,
    },

    #[error("Error checking email. ID: {id} Reason: {source}.")]
    EmailCheck {
        id: String,
        #[source]
        source: RemoteError,
    },

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),
}

impl ConnectorError {
    pub fn remote(context: impl Into<String>, source: RemoteError) -> Self {
        ConnectorError::Remote {
            context: context.into(),
            source,
        }
    }
}

pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;
