use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use clap::Args;

use super::RuntimeSettings;
use crate::analytics::Analytics;
use crate::models::{GatewayError, ToolResult, ValidationFailure};
use crate::tools::{ToolCall, dispatch};

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Name written to the activity log when the session starts.
    #[arg(long, value_name = "NAME", default_value = "insightgate")]
    pub agent_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub calls: usize,
    pub failures: usize,
}

pub fn run(args: &ServeArgs, settings: &RuntimeSettings) -> Result<()> {
    let analytics = settings.analytics()?;
    analytics.audit().log_agent_start(&args.agent_name);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let stats = serve_lines(&analytics, stdin.lock(), stdout.lock())?;
    tracing::info!(
        calls = stats.calls,
        failures = stats.failures,
        "serve session ended"
    );
    Ok(())
}

/// One JSON tool call per input line, one JSON result per output line.
/// Blank lines are skipped; a malformed line yields a failure result.
pub fn serve_lines<R: BufRead, W: Write>(
    analytics: &Analytics,
    reader: R,
    mut writer: W,
) -> Result<ServeStats> {
    let mut stats = ServeStats::default();

    for line in reader.lines() {
        let line = line.context("failed to read tool call from input")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let result = match serde_json::from_str::<ToolCall>(trimmed) {
            Ok(call) => dispatch(analytics, &call),
            Err(error) => ToolResult::from_error(&GatewayError::from(
                ValidationFailure::invalid_argument(format!("invalid tool call: {error}")),
            )),
        };

        stats.calls += 1;
        if !result.success {
            stats.failures += 1;
        }

        let encoded = result
            .to_json_line()
            .context("failed to serialize tool result")?;
        writeln!(writer, "{encoded}").context("failed to write tool result")?;
        writer.flush().context("failed to flush tool result")?;
    }

    Ok(stats)
}
