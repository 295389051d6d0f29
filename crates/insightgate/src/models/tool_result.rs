use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::failure::{FailureKind, GatewayError};

/// Uniform two-shape result returned by every analytics operation:
/// `{"success": true, "data": ...}` or `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip)]
    failure_kind: Option<FailureKind>,
}

#[derive(Debug, Clone)]
pub struct ToolResultFailure {
    result: ToolResult,
}

impl ToolResultFailure {
    #[must_use]
    pub fn new(result: ToolResult) -> Self {
        Self { result }
    }

    #[must_use]
    pub fn result(&self) -> &ToolResult {
        &self.result
    }
}

impl Display for ToolResultFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.result) {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => f.write_str("tool result serialization failure"),
        }
    }
}

impl std::error::Error for ToolResultFailure {}

impl ToolResult {
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            failure_kind: None,
        }
    }

    #[must_use]
    pub fn error(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            failure_kind: Some(kind),
        }
    }

    #[must_use]
    pub fn from_error(error: &GatewayError) -> Self {
        Self::error(error.kind(), error.caller_message())
    }

    #[must_use]
    pub fn from_outcome(outcome: Result<Value, GatewayError>) -> Self {
        match outcome {
            Ok(data) => Self::ok(data),
            Err(error) => Self::from_error(&error),
        }
    }

    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure_kind
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
