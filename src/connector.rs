//! Action handlers for the G Suite Gmail connector.
//!
//! Every handler validates its parameters before touching the network,
//! builds its own scoped service and finalizes exactly one [`ActionResult`].

use crate::auth::ServiceKey;
use crate::config::{
    is_email, AssetConfig, Endpoints, TestBundle, DEFAULT_MAX_ITEMS, DEFAULT_MAX_RESULTS,
    DIRECTORY_USER_SCOPE, GMAIL_FULL_SCOPE, GMAIL_READONLY_SCOPE,
};
use crate::errors::{
    ConfigError, ConnectorError, ConnectorResult, EMAIL_FETCH_FAILURE, USERS_FETCH_FAILURE,
};
use crate::result::{ActionResult, ActionResultBuilder, ActionStatus};
use crate::service::{create_service, GoogleApi, MessageFormat, ScopedService};
use crate::utils::{
    build_query, format_id_list, map_email_details, parse_ids, push_unique, validate_integer,
    QueryFilters,
};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    RunQuery,
    DeleteEmail,
    GetUsers,
    TestConnectivity,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::RunQuery => "run_query",
            Action::DeleteEmail => "delete_email",
            Action::GetUsers => "get_users",
            Action::TestConnectivity => "test_connectivity",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run_query" => Ok(Action::RunQuery),
            "delete_email" => Ok(Action::DeleteEmail),
            "get_users" => Ok(Action::GetUsers),
            "test_connectivity" => Ok(Action::TestConnectivity),
            other => Err(ConnectorError::UnsupportedAction(other.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunQueryParams {
    email: String,
    #[serde(flatten)]
    filters: QueryFilters,
    #[serde(default)]
    max_results: Option<Value>,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteEmailParams {
    email: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct GetUsersParams {
    #[serde(default)]
    max_items: Option<Value>,
    #[serde(default)]
    page_token: Option<String>,
}

fn parse_params<T: DeserializeOwned>(param: &Map<String, Value>) -> ConnectorResult<T> {
    serde_json::from_value(Value::Object(param.clone()))
        .map_err(|e| ConnectorError::InvalidParameter(format!("Invalid action parameters: {}", e)))
}

fn integer_param(value: Option<Value>, key: &str, default: u64) -> ConnectorResult<u64> {
    let value = value
        .filter(|v| !v.is_null())
        .unwrap_or_else(|| Value::from(default));
    validate_integer(&value, key, false)
}

fn non_empty(token: &Option<String>) -> Option<&str> {
    token.as_deref().filter(|t| !t.is_empty())
}

/// Connector state shared by all actions of a session.
///
/// Set once by [`GmailConnector::initialize`] and read-only afterwards.
#[derive(Debug, Clone)]
pub struct GmailConnector {
    key: ServiceKey,
    login_email: String,
    domain: String,
    endpoints: Endpoints,
}

impl GmailConnector {
    pub fn initialize(config: &AssetConfig) -> Result<Self, ConfigError> {
        let key = ServiceKey::from_json(&config.key_json)?;

        let login_email = config.login_email.trim().to_string();
        if !is_email(&login_email) {
            return Err(ConfigError::InvalidLoginEmail(login_email));
        }

        let domain = match login_email.split_once('@') {
            Some((_, domain)) => domain.to_string(),
            None => return Err(ConfigError::InvalidLoginEmail(login_email)),
        };

        info!("Connector initialized for domain {}", domain);

        Ok(GmailConnector {
            key,
            login_email,
            domain,
            endpoints: Endpoints::from_env(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn login_email(&self) -> &str {
        &self.login_email
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Run the action named by `action` with one parameter set.
    pub async fn handle_action(&self, action: &str, param: &Map<String, Value>) -> ActionResult {
        debug!("action_id {}", action);

        match action.parse::<Action>() {
            Ok(Action::RunQuery) => self.run_query(param).await,
            Ok(Action::DeleteEmail) => self.delete_email(param).await,
            Ok(Action::GetUsers) => self.get_users(param).await,
            Ok(Action::TestConnectivity) => self.test_connectivity(param).await,
            Err(err) => {
                error!("{}", err);
                ActionResultBuilder::new(action, param)
                    .finish(ActionStatus::Failed, Some(err.to_string()))
            }
        }
    }

    /// Run every parameter set of a test bundle in order.
    ///
    /// A bundle without parameters runs the action once with no parameters.
    pub async fn run_bundle(&self, bundle: &TestBundle) -> Vec<ActionResult> {
        if bundle.parameters.is_empty() {
            return vec![self.handle_action(&bundle.identifier, &Map::new()).await];
        }

        let mut results = Vec::with_capacity(bundle.parameters.len());
        for param in &bundle.parameters {
            results.push(self.handle_action(&bundle.identifier, param).await);
        }
        results
    }

    pub async fn run_query(&self, param: &Map<String, Value>) -> ActionResult {
        let mut result = start(Action::RunQuery, param);
        let outcome = self.run_query_inner(param, &mut result).await;
        finalize(result, outcome)
    }

    pub async fn delete_email(&self, param: &Map<String, Value>) -> ActionResult {
        let mut result = start(Action::DeleteEmail, param);
        let outcome = self.delete_email_inner(param, &mut result).await;
        finalize(result, outcome)
    }

    pub async fn get_users(&self, param: &Map<String, Value>) -> ActionResult {
        let mut result = start(Action::GetUsers, param);
        let outcome = self.get_users_inner(param, &mut result).await;
        finalize(result, outcome)
    }

    pub async fn test_connectivity(&self, param: &Map<String, Value>) -> ActionResult {
        let mut result = start(Action::TestConnectivity, param);
        let outcome = self.test_connectivity_inner(&mut result).await;
        if outcome.is_err() {
            result.save_progress("Test Connectivity Failed");
        }
        finalize(result, outcome)
    }

    fn gmail_service(&self, scope: &str, mailbox: &str) -> ConnectorResult<ScopedService> {
        create_service(
            &self.key,
            &[scope],
            GoogleApi::Gmail,
            &self.endpoints,
            Some(mailbox),
        )
    }

    fn directory_service(&self) -> ConnectorResult<ScopedService> {
        create_service(
            &self.key,
            &[DIRECTORY_USER_SCOPE],
            GoogleApi::Directory,
            &self.endpoints,
            Some(&self.login_email),
        )
    }

    async fn run_query_inner(
        &self,
        param: &Map<String, Value>,
        result: &mut ActionResultBuilder,
    ) -> ConnectorResult<Option<String>> {
        // Reject bad parameters before any credentials are built
        let params: RunQueryParams = parse_params(param)?;
        let max_results = integer_param(params.max_results, "max_results", DEFAULT_MAX_RESULTS)?;
        let query = build_query(&params.filters);
        debug!("Gmail query for {}: {:?}", params.email, query);

        result.save_progress("Creating GMail service object");
        let service = self.gmail_service(GMAIL_READONLY_SCOPE, &params.email)?;

        let listing = service
            .list_messages(&params.email, &query, max_results, non_empty(&params.page_token))
            .await
            .map_err(|e| ConnectorError::remote("Failed to get messages", e))?;

        // Counts every listed id, even ones whose details fail to load below
        result.update_summary("total_messages_returned", listing.messages.len());

        for message in &listing.messages {
            match service
                .get_message(&params.email, &message.id, MessageFormat::Metadata)
                .await
            {
                Ok(details) => result.add_data(Value::Object(map_email_details(details))),
                Err(e) => warn!("{} for message {}: {}", EMAIL_FETCH_FAILURE, message.id, e),
            }
        }

        if let Some(next_page) = non_empty(&listing.next_page_token) {
            result.update_summary("next_page_token", next_page);
        }

        Ok(None)
    }

    async fn delete_email_inner(
        &self,
        param: &Map<String, Value>,
        result: &mut ActionResultBuilder,
    ) -> ConnectorResult<Option<String>> {
        let params: DeleteEmailParams = parse_params(param)?;
        let email_ids = parse_ids(&params.id);
        if email_ids.is_empty() {
            return Err(ConnectorError::InvalidParameter(
                "Please provide valid value for 'id' action parameter".to_string(),
            ));
        }

        result.save_progress("Creating GMail service object");
        let service = self.gmail_service(GMAIL_FULL_SCOPE, &params.email)?;

        // Sort ids into present and already gone; anything else stops the action
        let mut good_ids: Vec<String> = Vec::new();
        let mut bad_ids: Vec<String> = Vec::new();

        for email_id in &email_ids {
            match service
                .get_message(&params.email, email_id, MessageFormat::Minimal)
                .await
            {
                Ok(_) => push_unique(&mut good_ids, email_id),
                Err(e) if e.is_missing_message() => {
                    debug!("Message {} is already gone: {}", email_id, e);
                    push_unique(&mut bad_ids, email_id);
                }
                Err(e) => {
                    return Err(ConnectorError::EmailCheck {
                        id: email_id.clone(),
                        source: e,
                    })
                }
            }
        }

        // Nothing left to delete, skip the batch call
        if good_ids.is_empty() {
            result.update_summary("deleted_emails", Vec::<String>::new());
            result.update_summary("ignored_ids", bad_ids.clone());
            return Ok(Some(format!(
                "All the provided emails were already deleted, Ignored Ids : {}",
                format_id_list(&bad_ids)
            )));
        }

        // The batch carries every requested id; already-gone ones are no-ops upstream
        service
            .batch_delete(&params.email, &email_ids)
            .await
            .map_err(|e| ConnectorError::remote("Failed to delete messages", e))?;

        result.update_summary("deleted_emails", good_ids);
        result.update_summary("ignored_ids", bad_ids.clone());

        Ok(Some(format!(
            "Messages deleted, Ignored Ids : {}",
            format_id_list(&bad_ids)
        )))
    }

    async fn get_users_inner(
        &self,
        param: &Map<String, Value>,
        result: &mut ActionResultBuilder,
    ) -> ConnectorResult<Option<String>> {
        let params: GetUsersParams = parse_params(param)?;
        let max_items = integer_param(params.max_items, "max_items", DEFAULT_MAX_ITEMS)?;

        result.save_progress("Creating AdminSDK service object");
        // Directory calls run as the admin account, not as a mailbox user
        let service = self.directory_service()?;

        result.save_progress(format!("Getting list of users for domain: {}", self.domain));
        let listing = service
            .list_users(&self.domain, max_items, non_empty(&params.page_token))
            .await
            .map_err(|e| ConnectorError::remote(USERS_FETCH_FAILURE, e))?;

        result.update_summary("total_users_returned", listing.users.len());

        if let Some(next_page) = non_empty(&listing.next_page_token) {
            result.update_summary("next_page_token", next_page);
        }

        for user in listing.users {
            result.add_data(user);
        }

        Ok(None)
    }

    async fn test_connectivity_inner(
        &self,
        result: &mut ActionResultBuilder,
    ) -> ConnectorResult<Option<String>> {
        result.save_progress("Creating AdminSDK service object");
        let service = self.directory_service()?;

        result.save_progress(format!("Getting list of users for domain: {}", self.domain));
        // A single user is enough to prove key, delegation and scope
        service
            .list_users(&self.domain, 1, None)
            .await
            .map_err(|e| ConnectorError::remote("Failed to get users", e))?;

        result.save_progress("Test Connectivity Passed");
        Ok(None)
    }
}

fn start(action: Action, param: &Map<String, Value>) -> ActionResultBuilder {
    let mut result = ActionResultBuilder::new(action.as_str(), param);
    result.save_progress(format!("In action handler for: {}", action));
    result
}

fn finalize(result: ActionResultBuilder, outcome: ConnectorResult<Option<String>>) -> ActionResult {
    match outcome {
        Ok(message) => result.finish(ActionStatus::Success, message),
        Err(err) => {
            error!("Action failed: {}", err);
            result.finish(ActionStatus::Failed, Some(err.to_string()))
        }
    }
}
