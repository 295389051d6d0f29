//! Append-only activity log.
//!
//! Every record is a single line: `<UTC seconds>Z [CATEGORY] key=value ...`.
//! String values are JSON-quoted after whitespace is condensed, so embedded
//! newlines in prompts or statements can never split a record.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;

use crate::utils::time::{format_utc_seconds, now_utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditCategory {
    Agent,
    Query,
    Tool,
    Sql,
}

impl AuditCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "AGENT",
            Self::Query => "QUERY",
            Self::Tool => "TOOL",
            Self::Sql => "SQL",
        }
    }
}

/// How a statement ended, as recorded in the `SQL` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementOutcome<'a> {
    Rows(usize),
    Failed(&'a str),
}

#[derive(Debug)]
enum AuditTarget {
    File(PathBuf),
    Memory(Vec<String>),
    Disabled,
}

#[derive(Debug)]
pub struct AuditSink {
    target: Mutex<AuditTarget>,
}

impl AuditSink {
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::with_target(AuditTarget::File(path.into()))
    }

    /// Keeps lines in memory; read them back with [`AuditSink::lines`].
    #[must_use]
    pub fn memory() -> Self {
        Self::with_target(AuditTarget::Memory(Vec::new()))
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::with_target(AuditTarget::Disabled)
    }

    fn with_target(target: AuditTarget) -> Self {
        Self {
            target: Mutex::new(target),
        }
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        match &*self.lock() {
            AuditTarget::Memory(lines) => lines.clone(),
            AuditTarget::File(_) | AuditTarget::Disabled => Vec::new(),
        }
    }

    pub fn log_agent_start(&self, agent: &str) {
        self.write(
            AuditCategory::Agent,
            &render_fields(&[("agent", Value::from(agent)), ("status", Value::from("started"))]),
        );
    }

    pub fn log_user_query(&self, agent: &str, prompt: &str) {
        self.write(
            AuditCategory::Query,
            &render_fields(&[("agent", Value::from(agent)), ("prompt", Value::from(prompt))]),
        );
    }

    /// Null-valued fields are omitted.
    pub fn log_tool_call(&self, tool: &str, fields: &[(&str, Value)]) {
        let mut all = Vec::with_capacity(fields.len() + 1);
        all.push(("tool", Value::from(tool)));
        all.extend(
            fields
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (*key, value.clone())),
        );
        self.write(AuditCategory::Tool, &render_fields(&all));
    }

    pub fn record_statement(
        &self,
        caller: &str,
        text: &str,
        params: &[Value],
        outcome: StatementOutcome<'_>,
        elapsed: Duration,
    ) {
        let mut fields = vec![
            ("caller", Value::from(caller)),
            ("statement", Value::from(text)),
            ("params", Value::Array(params.to_vec())),
        ];
        match outcome {
            StatementOutcome::Rows(rows) => fields.push(("rows", Value::from(rows))),
            StatementOutcome::Failed(detail) => fields.push(("error", Value::from(detail))),
        }
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        fields.push(("duration_ms", Value::from(duration_ms)));
        self.write(AuditCategory::Sql, &render_fields(&fields));
    }

    fn write(&self, category: AuditCategory, payload: &str) {
        let line = format!(
            "{} [{}] {payload}",
            format_utc_seconds(now_utc()),
            category.as_str()
        );

        let mut target = self.lock();
        match &mut *target {
            AuditTarget::File(path) => {
                if let Err(error) = append_line(path, &line) {
                    tracing::warn!(
                        path = %path.display(),
                        error = %error,
                        "failed to append audit record"
                    );
                }
            }
            AuditTarget::Memory(lines) => lines.push(line),
            AuditTarget::Disabled => {}
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuditTarget> {
        self.target
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut record = String::with_capacity(line.len() + 1);
    record.push_str(line);
    record.push('\n');
    file.write_all(record.as_bytes())
}

fn render_fields(fields: &[(&str, Value)]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={}", render_value(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => Value::String(condense(text)).to_string(),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(render_value).collect::<Vec<_>>().join(",")
        ),
        other => other.to_string(),
    }
}

fn condense(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
