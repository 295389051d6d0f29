use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// The only text a caller ever sees for datastore-level failures.
pub const EXECUTION_FAILURE_MESSAGE: &str = "Query execution failed (internal error).";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationReason {
    EmptyStatement,
    CommentInjection,
    MultiStatement,
    UnsupportedStatement,
    ForbiddenKeyword,
    LimitOutOfRange,
    OffsetOutOfRange,
    InvalidArgument,
    UnknownTool,
}

impl ViolationReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyStatement => "empty_statement",
            Self::CommentInjection => "comment_injection",
            Self::MultiStatement => "multi_statement",
            Self::UnsupportedStatement => "unsupported_statement",
            Self::ForbiddenKeyword => "forbidden_keyword",
            Self::LimitOutOfRange => "limit_out_of_range",
            Self::OffsetOutOfRange => "offset_out_of_range",
            Self::InvalidArgument => "invalid_argument",
            Self::UnknownTool => "unknown_tool",
        }
    }
}

/// A recoverable rejection of caller input or of a statement.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationFailure {
    pub reason: ViolationReason,
    pub message: String,
    pub details: Value,
}

impl ValidationFailure {
    #[must_use]
    pub fn new(reason: ViolationReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            details: json!({ "reason": reason.as_str() }),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        let mut merged = json!({ "reason": self.reason.as_str() });
        if let (Some(target), Value::Object(extra)) = (merged.as_object_mut(), details) {
            target.extend(extra);
        }
        self.details = merged;
        self
    }

    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ViolationReason::InvalidArgument, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    NotFound,
    Execution,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// `detail` carries datastore error text for the audit log only.
    #[error("query execution failed")]
    Execution { detail: String },

    #[error("datastore connection failed")]
    Connection { detail: String },
}

impl GatewayError {
    #[must_use]
    pub fn execution(detail: impl Into<String>) -> Self {
        Self::Execution {
            detail: detail.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::Validation,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Execution { .. } | Self::Connection { .. } => FailureKind::Execution,
        }
    }

    /// Message safe to hand to an untrusted caller.
    #[must_use]
    pub fn caller_message(&self) -> String {
        match self {
            Self::Validation(failure) => failure.message.clone(),
            Self::NotFound { entity } => format!("{entity} not found"),
            Self::Execution { .. } | Self::Connection { .. } => {
                EXECUTION_FAILURE_MESSAGE.to_string()
            }
        }
    }

    #[must_use]
    pub fn internal_detail(&self) -> Option<&str> {
        match self {
            Self::Execution { detail } | Self::Connection { detail } => Some(detail),
            Self::Validation(_) | Self::NotFound { .. } => None,
        }
    }
}
