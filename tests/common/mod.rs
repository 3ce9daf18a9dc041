//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use gsgmail_connector::{AssetConfig, Endpoints, GmailConnector};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{json, Map, Value};

pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test_service_account.pem");
pub const CLIENT_EMAIL: &str = "connector@test-project.iam.gserviceaccount.com";
pub const LOGIN_EMAIL: &str = "admin@example.com";
pub const MAILBOX: &str = "user@example.com";
pub const ACCESS_TOKEN: &str = "ya29.test-access-token";

/// Service account key JSON whose token endpoint is `token_uri`.
pub fn key_json(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "project_id": "test-project",
        "private_key_id": "0123456789abcdef",
        "private_key": TEST_PRIVATE_KEY,
        "client_email": CLIENT_EMAIL,
        "client_id": "100000000000000000001",
        "token_uri": token_uri,
    })
    .to_string()
}

pub fn endpoints(server: &ServerGuard) -> Endpoints {
    Endpoints {
        gmail: format!("{}/gmail/v1", server.url()),
        directory: format!("{}/admin/directory/v1", server.url()),
    }
}

/// Connector wired to the mock server for the token endpoint and both APIs.
pub fn connector(server: &ServerGuard) -> GmailConnector {
    let config = AssetConfig {
        key_json: key_json(&format!("{}/token", server.url())),
        login_email: LOGIN_EMAIL.to_string(),
    };
    GmailConnector::initialize(&config)
        .expect("test config should initialize")
        .with_endpoints(endpoints(server))
}

pub async fn mock_token(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/token")
        .match_body(Matcher::UrlEncoded(
            "grant_type".into(),
            "urn:ietf:params:oauth:grant-type:jwt-bearer".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "access_token": ACCESS_TOKEN,
                "expires_in": 3599,
                "token_type": "Bearer"
            })
            .to_string(),
        )
        .create_async()
        .await
}

pub fn messages_path(mailbox: &str) -> String {
    format!("/gmail/v1/users/{}/messages", mailbox)
}

pub fn message_path(mailbox: &str, id: &str) -> String {
    format!("/gmail/v1/users/{}/messages/{}", mailbox, id)
}

pub fn not_found_body() -> String {
    json!({
        "error": {
            "code": 404,
            "message": "Requested entity was not found.",
            "status": "NOT_FOUND"
        }
    })
    .to_string()
}

pub fn params(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
