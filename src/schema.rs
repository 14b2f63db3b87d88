use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::agent::tool_extractor::ToolFinding;
use crate::error::FieldError;

/// The four datasets the tool server has trained models for.
///
/// The serialized name doubles as the directory name under `data/` on the
/// tool server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSet {
    Digits,
    Iris,
    Wine,
    BreastCancer,
}

impl DataSet {
    pub const ALL: [DataSet; 4] = [
        DataSet::Digits,
        DataSet::Iris,
        DataSet::Wine,
        DataSet::BreastCancer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSet::Digits => "digits",
            DataSet::Iris => "iris",
            DataSet::Wine => "wine",
            DataSet::BreastCancer => "breast_cancer",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == name)
    }
}

impl fmt::Display for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body for `/ask`.
///
/// - `user_input`: the question or command for F1 score or SHAP plot
/// - `data_set`: one of the supported dataset names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub user_input: String,
    pub data_set: DataSet,
}

/// Request body for `/verify`. The dataset is accepted but the guard never sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub user_input: String,
    pub data_set: DataSet,
}

/// Which agent produced the final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentName {
    Guard,
    Model,
}

/// Response from `/ask`.
///
/// Tool fields are always serialized (as `null` when absent) so clients can
/// rely on the keys being present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub agent_response: String,
    pub agent_name: AgentName,
    pub tool_used: Option<String>,
    pub tool_output: Option<Value>,
}

impl AskResponse {
    /// Short-circuit answer from the guard. Never carries tool fields.
    pub fn from_guard(message: String) -> Self {
        Self {
            agent_response: message,
            agent_name: AgentName::Guard,
            tool_used: None,
            tool_output: None,
        }
    }

    pub fn from_model(output: String, finding: ToolFinding) -> Self {
        Self {
            agent_response: output,
            agent_name: AgentName::Model,
            tool_used: finding.tool_used,
            tool_output: finding.tool_output,
        }
    }
}

/// Response from `/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub is_valid: bool,
    pub message: String,
}

/// Label assigned by the guard agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardKind {
    Greeting,
    Error,
    Proceed,
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GuardKind::Greeting => "greeting",
            GuardKind::Error => "error",
            GuardKind::Proceed => "proceed",
        };
        f.write_str(label)
    }
}

/// Structured result from the guardrail agent.
///
/// `proceed` conventionally comes with an empty message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardResult {
    #[serde(rename = "type")]
    pub kind: GuardKind,
    pub message: String,
}

impl GuardResult {
    pub fn is_proceed(&self) -> bool {
        self.kind == GuardKind::Proceed
    }

    /// JSON schema handed to the completion service as the required output shape.
    pub fn json_schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["greeting", "error", "proceed"]
                },
                "message": { "type": "string" }
            },
            "required": ["type", "message"],
            "additionalProperties": false
        })
    }
}

/// Request bodies that report every field problem at once before deserializing.
pub trait RequestSchema: serde::de::DeserializeOwned {
    fn field_errors(body: &Value) -> Vec<FieldError>;
}

impl RequestSchema for AskRequest {
    fn field_errors(body: &Value) -> Vec<FieldError> {
        query_field_errors(body)
    }
}

impl RequestSchema for VerifyRequest {
    fn field_errors(body: &Value) -> Vec<FieldError> {
        query_field_errors(body)
    }
}

fn query_field_errors(body: &Value) -> Vec<FieldError> {
    let Some(fields) = body.as_object() else {
        return vec![FieldError::new(
            "model_attributes_type",
            vec!["body".to_string()],
            "Input should be a valid dictionary or object to extract fields from",
            body.clone(),
        )];
    };

    let mut errors = Vec::new();

    match fields.get("user_input") {
        None => errors.push(FieldError::missing("user_input", body)),
        Some(Value::String(_)) => {}
        Some(other) => errors.push(FieldError::new(
            "string_type",
            vec!["body".to_string(), "user_input".to_string()],
            "Input should be a valid string",
            other.clone(),
        )),
    }

    match fields.get("data_set") {
        None => errors.push(FieldError::missing("data_set", body)),
        Some(Value::String(name)) if DataSet::from_name(name).is_some() => {}
        Some(other) => errors.push(FieldError::new(
            "literal_error",
            vec!["body".to_string(), "data_set".to_string()],
            "Input should be 'digits', 'iris', 'wine' or 'breast_cancer'",
            other.clone(),
        )),
    }

    errors
}
