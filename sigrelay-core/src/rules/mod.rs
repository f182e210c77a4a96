//! Workflow definitions and the condition evaluator.
//!
//! A workflow definition is stored as JSON in one of two shapes:
//!
//! ```json
//! {"actions": [ ... ]}
//! {"rules": {"if": [ ... ], "then": [ ... ], "else": [ ... ]}}
//! ```

mod evaluator;

pub use evaluator::{Branch, evaluate_condition, select, select_actions};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowDefinition {
    Conditional { rules: RuleSet },
    Flat { actions: Vec<Action> },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(rename = "if", default)]
    pub conditions: Vec<Condition>,
    #[serde(rename = "then", default)]
    pub then: Vec<Action>,
    #[serde(rename = "else", default)]
    pub otherwise: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dot path into the payload.
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    Empty,
    NotEmpty,
    /// Any other name. Never satisfied.
    Unknown(String),
}

impl From<String> for Operator {
    fn from(value: String) -> Self {
        match value.as_str() {
            "equals" => Operator::Equals,
            "not_equals" => Operator::NotEquals,
            "contains" => Operator::Contains,
            "not_contains" => Operator::NotContains,
            "greater_than" => Operator::GreaterThan,
            "less_than" => Operator::LessThan,
            "empty" => Operator::Empty,
            "not_empty" => Operator::NotEmpty,
            _ => Operator::Unknown(value),
        }
    }
}

impl From<Operator> for String {
    fn from(value: Operator) -> Self {
        match value {
            Operator::Equals => "equals".to_string(),
            Operator::NotEquals => "not_equals".to_string(),
            Operator::Contains => "contains".to_string(),
            Operator::NotContains => "not_contains".to_string(),
            Operator::GreaterThan => "greater_than".to_string(),
            Operator::LessThan => "less_than".to_string(),
            Operator::Empty => "empty".to_string(),
            Operator::NotEmpty => "not_empty".to_string(),
            Operator::Unknown(name) => name,
        }
    }
}

/// One side effect against the CRM, the document provider or a notifier.
///
/// Text parameters (`value`, `subject`, `body`, `message`) are `{{path}}`
/// templates resolved against the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    UpdateRecord {
        module: Option<String>,
        field: String,
        value: String,
    },
    /// Sync the mapped fields, optionally only the listed tokens.
    SyncFields {
        module: Option<String>,
        tokens: Option<Vec<String>>,
    },
    /// Sync every active mapping of the target module.
    SyncAllFields { module: Option<String> },
    AttachFile {
        module: Option<String>,
        file_name: Option<String>,
    },
    CreateNote {
        module: Option<String>,
        subject: String,
        #[serde(default)]
        body: String,
    },
    /// Recorded locally in the audit trail and the log. No remote call.
    LogActivity { message: String },
    SendNotification { message: String, url: Option<String> },
}

impl Action {
    /// Wire name of the action, as in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::UpdateRecord { .. } => "update_record",
            Action::SyncFields { .. } => "sync_fields",
            Action::SyncAllFields { .. } => "sync_all_fields",
            Action::AttachFile { .. } => "attach_file",
            Action::CreateNote { .. } => "create_note",
            Action::LogActivity { .. } => "log_activity",
            Action::SendNotification { .. } => "send_notification",
        }
    }

    /// Module named on the action itself.
    pub fn module(&self) -> Option<&str> {
        match self {
            Action::UpdateRecord { module, .. }
            | Action::SyncFields { module, .. }
            | Action::SyncAllFields { module }
            | Action::AttachFile { module, .. }
            | Action::CreateNote { module, .. } => module.as_deref(),
            Action::LogActivity { .. } | Action::SendNotification { .. } => None,
        }
    }
}
