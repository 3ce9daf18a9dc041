use log::info;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Failed,
}

/// Outcome of one action invocation for one parameter set.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub action: String,
    pub parameter: Map<String, Value>,
    pub data: Vec<Value>,
    pub summary: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub progress: Vec<String>,
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionResult {
    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }
}

/// Accumulates records, summary and progress while a handler runs.
///
/// `finish` consumes the builder, so a result is finalized exactly once.
#[derive(Debug)]
pub(crate) struct ActionResultBuilder {
    action: String,
    parameter: Map<String, Value>,
    data: Vec<Value>,
    summary: Map<String, Value>,
    progress: Vec<String>,
}

impl ActionResultBuilder {
    pub(crate) fn new(action: &str, parameter: &Map<String, Value>) -> Self {
        ActionResultBuilder {
            action: action.to_string(),
            parameter: parameter.clone(),
            data: Vec::new(),
            summary: Map::new(),
            progress: Vec::new(),
        }
    }

    pub(crate) fn save_progress(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("[{}] {}", self.action, message);
        self.progress.push(message);
    }

    pub(crate) fn add_data(&mut self, record: Value) {
        self.data.push(record);
    }

    pub(crate) fn update_summary(&mut self, key: &str, value: impl Into<Value>) {
        self.summary.insert(key.to_string(), value.into());
    }

    pub(crate) fn finish(self, status: ActionStatus, message: Option<String>) -> ActionResult {
        ActionResult {
            action: self.action,
            parameter: self.parameter,
            data: self.data,
            summary: self.summary,
            progress: self.progress,
            status,
            message,
        }
    }
}
