//! Name-based dispatch from an agent's tool call to an analytics operation.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::analytics::Analytics;
use crate::analytics::catalog::Family;
use crate::models::{GatewayError, ToolResult, ValidationFailure, ViolationReason};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,

    #[serde(default)]
    pub arguments: Value,

    /// Natural-language request that led to this call, audited as a `QUERY` line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl ToolCall {
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            prompt: None,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CommitIdArgs {
    pub commit_id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PrIdArgs {
    pub pr_id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PeriodArgs {
    /// Phrase such as `last 7 days`, `this week`, `last month`, `today`.
    #[serde(default)]
    pub period: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CommitPageArgs {
    #[serde(default)]
    pub period: String,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PrPageArgs {
    #[serde(default)]
    pub period: String,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub min_cycle_time_minutes: Option<f64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CustomQueryArgs {
    /// A single SELECT or WITH statement; `?` / `?N` placeholders bind `params`.
    pub sql: String,
    #[serde(default)]
    pub params: Vec<Value>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TableArgs {
    pub table_name: String,
}

pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    input_schema: fn() -> Value,
}

impl ToolSpec {
    #[must_use]
    pub fn input_schema(&self) -> Value {
        (self.input_schema)()
    }
}

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

pub const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "commit.get_table_schema",
        description: "Column names and types of a datastore table.",
        input_schema: schema_of::<TableArgs>,
    },
    ToolSpec {
        name: "commit.get_commit_summary",
        description: "One commit by id.",
        input_schema: schema_of::<CommitIdArgs>,
    },
    ToolSpec {
        name: "commit.get_commit_count_period",
        description: "Number of commits in a period.",
        input_schema: schema_of::<PeriodArgs>,
    },
    ToolSpec {
        name: "commit.get_commits_period",
        description: "Page of commits in a period, newest first, with the period total.",
        input_schema: schema_of::<CommitPageArgs>,
    },
    ToolSpec {
        name: "commit.run_custom_commit_query",
        description: "Read-only SQL over commit data; scoped to the tenant and row-limited.",
        input_schema: schema_of::<CustomQueryArgs>,
    },
    ToolSpec {
        name: "pr.list_tables",
        description: "Names of the datastore tables.",
        input_schema: schema_of::<NoArgs>,
    },
    ToolSpec {
        name: "pr.get_table_schema",
        description: "Column names and types of a datastore table.",
        input_schema: schema_of::<TableArgs>,
    },
    ToolSpec {
        name: "pr.get_pr_summary",
        description: "Every stored column of one pull request.",
        input_schema: schema_of::<PrIdArgs>,
    },
    ToolSpec {
        name: "pr.get_cycle_time",
        description: "Cycle time of one pull request, in minutes.",
        input_schema: schema_of::<PrIdArgs>,
    },
    ToolSpec {
        name: "pr.get_review_time",
        description: "Open-to-review time of one pull request, in minutes.",
        input_schema: schema_of::<PrIdArgs>,
    },
    ToolSpec {
        name: "pr.get_pr_count_period",
        description: "Number of pull requests created in a period.",
        input_schema: schema_of::<PeriodArgs>,
    },
    ToolSpec {
        name: "pr.get_prs_by_period",
        description: "Page of pull requests created in a period, optionally above a cycle time.",
        input_schema: schema_of::<PrPageArgs>,
    },
    ToolSpec {
        name: "pr.get_churn_metrics",
        description: "Line churn, churn per file and commit count of one pull request.",
        input_schema: schema_of::<PrIdArgs>,
    },
    ToolSpec {
        name: "pr.run_custom_pr_query",
        description: "Read-only SQL over pull request data; scoped to the tenant and row-limited.",
        input_schema: schema_of::<CustomQueryArgs>,
    },
];

#[must_use]
pub fn tool_catalog() -> Value {
    Value::Array(
        TOOLS
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema(),
                })
            })
            .collect(),
    )
}

pub fn dispatch(analytics: &Analytics, call: &ToolCall) -> ToolResult {
    if let Some(prompt) = call.prompt.as_deref() {
        let agent = call.name.split('.').next().unwrap_or_default();
        analytics.audit().log_user_query(agent, prompt);
    }

    match call.name.as_str() {
        "commit.get_table_schema" => with_args(call, |args: TableArgs| {
            analytics.get_table_schema(Family::Commit, &args.table_name)
        }),
        "commit.get_commit_summary" => with_args(call, |args: CommitIdArgs| {
            analytics.get_commit_summary(args.commit_id)
        }),
        "commit.get_commit_count_period" => with_args(call, |args: PeriodArgs| {
            analytics.get_commit_count_period(&args.period)
        }),
        "commit.get_commits_period" => with_args(call, |args: CommitPageArgs| {
            analytics.get_commits_period(&args.period, args.offset, args.limit)
        }),
        "commit.run_custom_commit_query" => with_args(call, |args: CustomQueryArgs| {
            analytics.run_custom_commit_query(&args.sql, args.params, args.limit)
        }),
        "pr.list_tables" => with_args(call, |_: NoArgs| analytics.list_tables(Family::Pr)),
        "pr.get_table_schema" => with_args(call, |args: TableArgs| {
            analytics.get_table_schema(Family::Pr, &args.table_name)
        }),
        "pr.get_pr_summary" => with_args(call, |args: PrIdArgs| analytics.get_pr_summary(args.pr_id)),
        "pr.get_cycle_time" => with_args(call, |args: PrIdArgs| analytics.get_cycle_time(args.pr_id)),
        "pr.get_review_time" => {
            with_args(call, |args: PrIdArgs| analytics.get_review_time(args.pr_id))
        }
        "pr.get_pr_count_period" => with_args(call, |args: PeriodArgs| {
            analytics.get_pr_count_period(&args.period)
        }),
        "pr.get_prs_by_period" => with_args(call, |args: PrPageArgs| {
            analytics.get_prs_by_period(
                &args.period,
                args.offset,
                args.limit,
                args.min_cycle_time_minutes,
            )
        }),
        "pr.get_churn_metrics" => {
            with_args(call, |args: PrIdArgs| analytics.get_churn_metrics(args.pr_id))
        }
        "pr.run_custom_pr_query" => with_args(call, |args: CustomQueryArgs| {
            analytics.run_custom_pr_query(&args.sql, args.params, args.limit)
        }),
        unknown => failure(
            ValidationFailure::new(ViolationReason::UnknownTool, format!("unknown tool `{unknown}`"))
                .with_details(json!({ "tool": unknown })),
        ),
    }
}

fn with_args<T: DeserializeOwned>(call: &ToolCall, run: impl FnOnce(T) -> ToolResult) -> ToolResult {
    match parse_arguments::<T>(&call.name, &call.arguments) {
        Ok(args) => run(args),
        Err(validation) => failure(validation),
    }
}

pub fn parse_arguments<T: DeserializeOwned>(
    tool: &str,
    arguments: &Value,
) -> Result<T, ValidationFailure> {
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other.clone(),
    };
    serde_json::from_value(arguments).map_err(|error| {
        ValidationFailure::invalid_argument(format!("invalid arguments for `{tool}`: {error}"))
    })
}

fn failure(validation: ValidationFailure) -> ToolResult {
    ToolResult::from_error(&GatewayError::from(validation))
}
