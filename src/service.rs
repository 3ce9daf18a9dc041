//! Scoped Google API handles.
//!
//! A [`ScopedService`] is built per action from the service account key, a
//! set of scopes and an optional delegated subject. The access token is
//! fetched lazily on the first call and reused for the life of the handle.
//! Scopes are never checked locally: a call outside the granted scopes is
//! rejected by the remote API.

use crate::auth::{Credentials, ServiceKey};
use crate::config::Endpoints;
use crate::errors::{ConnectorError, ConnectorResult, RemoteError};
use log::{debug, error};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoogleApi {
    Gmail,
    Directory,
}

impl GoogleApi {
    pub fn name(&self) -> &'static str {
        match self {
            GoogleApi::Gmail => "gmail",
            GoogleApi::Directory => "admin",
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            GoogleApi::Gmail => "v1",
            GoogleApi::Directory => "directory_v1",
        }
    }

    fn base_url<'a>(&self, endpoints: &'a Endpoints) -> &'a str {
        match self {
            GoogleApi::Gmail => &endpoints.gmail,
            GoogleApi::Directory => &endpoints.directory,
        }
    }
}

/// Response format for `users.messages.get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Minimal,
    Metadata,
}

impl MessageFormat {
    fn as_str(&self) -> &'static str {
        match self {
            MessageFormat::Minimal => "minimal",
            MessageFormat::Metadata => "metadata",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: String,
    #[serde(rename = "threadId", default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(rename = "nextPageToken", default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserList {
    #[serde(default)]
    pub users: Vec<Value>,
    #[serde(rename = "nextPageToken", default)]
    pub next_page_token: Option<String>,
}

pub struct ScopedService {
    api: GoogleApi,
    base: Url,
    credentials: Credentials,
    http: Client,
    token: OnceCell<String>,
}

/// Build a scoped, optionally delegated, handle for `api`.
pub fn create_service(
    key: &ServiceKey,
    scopes: &[&str],
    api: GoogleApi,
    endpoints: &Endpoints,
    delegated_subject: Option<&str>,
) -> ConnectorResult<ScopedService> {
    let mut credentials = Credentials::from_service_account_info(key, scopes)?;

    if let Some(subject) = delegated_subject {
        credentials = credentials.with_subject(subject)?;
    }

    let build_error = |reason: String| ConnectorError::ServiceBuild {
        api: api.name().to_string(),
        version: api.version().to_string(),
        subject: delegated_subject.map(str::to_string),
        reason,
    };

    // Validate the endpoint now so a bad override fails as a service build error
    let base = Url::parse(api.base_url(endpoints))
        .map_err(|e| build_error(format!("Invalid base URL: {}.", e)))?;
    if base.cannot_be_a_base() {
        return Err(build_error(format!("Invalid base URL: {}.", base)));
    }

    let http = Client::builder()
        .build()
        .map_err(|e| build_error(format!("Failed to build HTTP client: {}.", e)))?;

    debug!(
        "Created {}-{} service with scopes {:?}",
        api.name(),
        api.version(),
        credentials.scopes()
    );

    Ok(ScopedService {
        api,
        base,
        credentials,
        http,
        token: OnceCell::new(),
    })
}

impl ScopedService {
    pub fn api(&self) -> GoogleApi {
        self.api
    }

    pub fn scopes(&self) -> &[String] {
        self.credentials.scopes()
    }

    pub fn subject(&self) -> Option<&str> {
        self.credentials.subject()
    }

    /// `users.messages.list`
    pub async fn list_messages(
        &self,
        user_id: &str,
        query: &str,
        max_results: u64,
        page_token: Option<&str>,
    ) -> Result<MessageList, RemoteError> {
        let url = self.url(&["users", user_id, "messages"])?;
        let mut params = vec![
            ("q", query.to_string()),
            ("maxResults", max_results.to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let response = self.execute(self.http.get(url).query(&params)).await?;
        parse_response(response)
    }

    /// `users.messages.get`
    pub async fn get_message(
        &self,
        user_id: &str,
        message_id: &str,
        format: MessageFormat,
    ) -> Result<Map<String, Value>, RemoteError> {
        let url = self.url(&["users", user_id, "messages", message_id])?;
        let response = self
            .execute(self.http.get(url).query(&[("format", format.as_str())]))
            .await?;
        parse_response(response)
    }

    /// `users.messages.batchDelete`
    pub async fn batch_delete(&self, user_id: &str, ids: &[String]) -> Result<(), RemoteError> {
        let url = self.url(&["users", user_id, "messages", "batchDelete"])?;
        self.execute(self.http.post(url).json(&json!({ "ids": ids })))
            .await
            .map(|_| ())
    }

    /// Directory `users.list`, ordered by primary email ascending.
    pub async fn list_users(
        &self,
        domain: &str,
        max_results: u64,
        page_token: Option<&str>,
    ) -> Result<UserList, RemoteError> {
        let url = self.url(&["users"])?;
        let mut params = vec![
            ("domain", domain.to_string()),
            ("maxResults", max_results.to_string()),
            ("orderBy", "email".to_string()),
            ("sortOrder", "ASCENDING".to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let response = self.execute(self.http.get(url).query(&params)).await?;
        parse_response(response)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        // Segments are percent-encoded individually, so ids and mailboxes stay one segment
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Transport(format!("Invalid base URL: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn access_token(&self) -> Result<&str, RemoteError> {
        self.token
            .get_or_try_init(|| self.credentials.fetch_token(&self.http))
            .await
            .map(String::as_str)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value, RemoteError> {
        // First call on this handle performs the token exchange
        let token = self.access_token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        debug!("{} response status: {}", self.api.name(), status);

        let body = response.text().await?;

        if !status.is_success() {
            error!("{} API error. Status: {}, Body: {}", self.api.name(), status, body);
            return Err(RemoteError::Api {
                status: status.as_u16(),
                body,
            });
        }

        // batchDelete answers 204 with no body
        if body.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        serde_json::from_str(&body)
            .map_err(|e| RemoteError::MalformedResponse(format!("Failed to parse response: {}", e)))
    }
}

fn parse_response<T: DeserializeOwned>(value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value)
        .map_err(|e| RemoteError::MalformedResponse(format!("Unexpected response shape: {}", e)))
}
