//! G Suite connector for Gmail and the Admin Directory
//!
//! Lets an automation platform run a fixed set of actions against a Google
//! Workspace domain through a service account with domain-wide delegation.
//!
//! # Actions
//!
//! - `run_query`: search a mailbox and return message metadata
//! - `delete_email`: delete messages by id, ignoring ones already gone
//! - `get_users`: list the users of the configured domain
//! - `test_connectivity`: verify the key, delegation and scopes
//!
//! Every action runs its remote calls once, in sequence, and reports a single
//! success or failure with an optional continuation token.

pub mod auth;
pub mod config;
pub mod connector;
pub mod errors;
pub mod logging;
pub mod result;
pub mod service;
pub mod utils;

pub use crate::config::{AssetConfig, Endpoints, TestBundle};
pub use crate::connector::{Action, GmailConnector};
pub use crate::errors::{describe, ConfigError, ConnectorError, RemoteError};
pub use crate::logging::setup_logging;
pub use crate::result::{ActionResult, ActionStatus};
