/// Service Module Tests
///
/// Tests for scoped service construction and the raw API calls behind
/// each action.
mod common;

use common::*;
use gsgmail_connector::auth::ServiceKey;
use gsgmail_connector::config::{DIRECTORY_USER_SCOPE, GMAIL_FULL_SCOPE, GMAIL_READONLY_SCOPE};
use gsgmail_connector::service::{create_service, GoogleApi, MessageFormat};
use gsgmail_connector::{ConnectorError, Endpoints, RemoteError};
use mockito::Matcher;
use serde_json::json;

fn key(server: &mockito::ServerGuard) -> ServiceKey {
    ServiceKey::from_json(&key_json(&format!("{}/token", server.url()))).unwrap()
}

#[cfg(test)]
mod construction_tests {
    use super::*;

    #[test]
    fn test_api_names() {
        assert_eq!(GoogleApi::Gmail.name(), "gmail");
        assert_eq!(GoogleApi::Gmail.version(), "v1");
        assert_eq!(GoogleApi::Directory.name(), "admin");
        assert_eq!(GoogleApi::Directory.version(), "directory_v1");
    }

    #[tokio::test]
    async fn test_service_carries_scopes_and_subject() {
        let server = mockito::Server::new_async().await;
        let service = create_service(
            &key(&server),
            &[GMAIL_FULL_SCOPE],
            GoogleApi::Gmail,
            &endpoints(&server),
            Some(MAILBOX),
        )
        .unwrap();

        assert_eq!(service.api(), GoogleApi::Gmail);
        assert_eq!(service.scopes(), &[GMAIL_FULL_SCOPE.to_string()]);
        assert_eq!(service.subject(), Some(MAILBOX));

        let undelegated = create_service(
            &key(&server),
            &[DIRECTORY_USER_SCOPE],
            GoogleApi::Directory,
            &endpoints(&server),
            None,
        )
        .unwrap();
        assert_eq!(undelegated.subject(), None);
    }

    #[test]
    fn test_bad_base_url() {
        let endpoints = Endpoints {
            gmail: "not a url".to_string(),
            ..Endpoints::default()
        };
        let err = create_service(
            &ServiceKey::from_json(&key_json("https://oauth2.googleapis.com/token")).unwrap(),
            &[GMAIL_READONLY_SCOPE],
            GoogleApi::Gmail,
            &endpoints,
            Some(MAILBOX),
        )
        .err()
        .unwrap();

        assert!(matches!(err, ConnectorError::ServiceBuild { .. }));
        let message = err.to_string();
        assert!(message.starts_with("Failed to create service object for API: gmail-v1."));
        assert!(message.contains("Please make sure the user 'user@example.com' is valid"));
    }

    #[test]
    fn test_construction_errors_come_from_credentials() {
        let incomplete = ServiceKey::from_json(r#"{"client_email": "svc@example.com"}"#).unwrap();
        let err = create_service(
            &incomplete,
            &[GMAIL_READONLY_SCOPE],
            GoogleApi::Gmail,
            &Endpoints::default(),
            Some(MAILBOX),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ConnectorError::ServiceKey(_)));

        let err = create_service(
            &ServiceKey::from_json(&key_json("https://oauth2.googleapis.com/token")).unwrap(),
            &[GMAIL_READONLY_SCOPE],
            GoogleApi::Gmail,
            &Endpoints::default(),
            Some("mailbox-without-domain"),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ConnectorError::Credentials(_)));
    }
}

#[cfg(test)]
mod call_tests {
    use super::*;

    #[tokio::test]
    async fn test_token_is_fetched_once_per_service() {
        let mut server = mockito::Server::new_async().await;
        let token = mock_token(&mut server).await.expect(1);
        let message = server
            .mock("GET", message_path(MAILBOX, "m1").as_str())
            .match_query(Matcher::UrlEncoded("format".into(), "minimal".into()))
            .with_status(200)
            .with_body(json!({ "id": "m1", "labelIds": ["INBOX"] }).to_string())
            .expect(2)
            .create_async()
            .await;

        let service = create_service(
            &key(&server),
            &[GMAIL_FULL_SCOPE],
            GoogleApi::Gmail,
            &endpoints(&server),
            Some(MAILBOX),
        )
        .unwrap();

        for _ in 0..2 {
            let details = service
                .get_message(MAILBOX, "m1", MessageFormat::Minimal)
                .await
                .unwrap();
            assert_eq!(details["id"], "m1");
        }

        token.assert_async().await;
        message.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_messages_without_results() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _mock = server
            .mock("GET", messages_path(MAILBOX).as_str())
            .match_query(Matcher::UrlEncoded("q".into(), "".into()))
            .with_status(200)
            .with_body(json!({ "resultSizeEstimate": 0 }).to_string())
            .create_async()
            .await;

        let service = create_service(
            &key(&server),
            &[GMAIL_READONLY_SCOPE],
            GoogleApi::Gmail,
            &endpoints(&server),
            Some(MAILBOX),
        )
        .unwrap();

        let listing = service.list_messages(MAILBOX, "", 100, None).await.unwrap();
        assert!(listing.messages.is_empty());
        assert!(listing.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_non_json_success_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _mock = server
            .mock("GET", "/admin/directory/v1/users")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>captive portal</html>")
            .create_async()
            .await;

        let service = create_service(
            &key(&server),
            &[DIRECTORY_USER_SCOPE],
            GoogleApi::Directory,
            &endpoints(&server),
            Some(LOGIN_EMAIL),
        )
        .unwrap();

        let err = service.list_users("example.com", 1, None).await.unwrap_err();
        assert!(matches!(err, RemoteError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_scopes_are_enforced_remotely() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let batch = server
            .mock("POST", format!("{}/batchDelete", messages_path(MAILBOX)).as_str())
            .with_status(403)
            .with_body(
                json!({ "error": { "code": 403, "message": "Insufficient Permission" } })
                    .to_string(),
            )
            .create_async()
            .await;

        // A read-only handle still sends the call; the API refuses it
        let service = create_service(
            &key(&server),
            &[GMAIL_READONLY_SCOPE],
            GoogleApi::Gmail,
            &endpoints(&server),
            Some(MAILBOX),
        )
        .unwrap();

        let err = service
            .batch_delete(MAILBOX, &["m1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 403, .. }));
        assert!(err.is_missing_message());
        batch.assert_async().await;
    }
}
