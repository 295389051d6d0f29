use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use super::RuntimeSettings;
use crate::models::{GatewayError, ToolResult, ToolResultFailure, ValidationFailure};
use crate::tools::{ToolCall, dispatch};

#[derive(Debug, Clone, Args)]
pub struct CallArgs {
    /// Tool name, e.g. `commit.get_commits_period`.
    #[arg(value_name = "TOOL")]
    pub tool: String,

    /// Tool arguments as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub args: Option<String>,

    /// Natural-language request to record alongside the call.
    #[arg(long, value_name = "TEXT")]
    pub prompt: Option<String>,
}

pub fn run(args: &CallArgs, settings: &RuntimeSettings) -> Result<()> {
    let analytics = settings.analytics()?;

    let result = match parse_call(args) {
        Ok(call) => dispatch(&analytics, &call),
        Err(validation) => ToolResult::from_error(&GatewayError::from(validation)),
    };

    let line = result
        .to_json_line()
        .context("failed to serialize tool result")?;
    println!("{line}");

    if result.success {
        Ok(())
    } else {
        Err(ToolResultFailure::new(result).into())
    }
}

fn parse_call(args: &CallArgs) -> Result<ToolCall, ValidationFailure> {
    let arguments = match args.args.as_deref().map(str::trim) {
        None | Some("") => Value::Null,
        Some(raw) => serde_json::from_str::<Value>(raw).map_err(|error| {
            ValidationFailure::invalid_argument(format!("--args must be valid JSON: {error}"))
        })?,
    };

    let mut call = ToolCall::new(args.tool.clone(), arguments);
    call.prompt.clone_from(&args.prompt);
    Ok(call)
}
