use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value, json};

use super::{Analytics, PageWindow, optional_f64, window_fields};
use crate::models::{GatewayError, ToolResult, ValidationFailure};

pub const PULL_REQUEST_COLUMNS: &str = "pr_id, title, state, author_id, created_on, merged_on, \
     cycle_time_minutes, open_to_review_minutes, commit_to_open_minutes, lines_added, \
     lines_removed, modified_files_count";

const PR_ENTITY: &str = "PR";

impl Analytics {
    /// Every stored column of one pull request.
    pub fn get_pr_summary(&self, pr_id: i64) -> ToolResult {
        const TOOL: &str = "pr.get_pr_summary";
        self.audit.log_tool_call(TOOL, &[("pr_id", json!(pr_id))]);
        let outcome = self
            .pr_lookup(
                TOOL,
                "SELECT * FROM pull_requests WHERE organization_id = ?1 AND pr_id = ?2 LIMIT 1",
                pr_id,
            )
            .map(|row| json!({ "pr_data": row }));
        ToolResult::from_outcome(outcome)
    }

    pub fn get_cycle_time(&self, pr_id: i64) -> ToolResult {
        const TOOL: &str = "pr.get_cycle_time";
        self.audit.log_tool_call(TOOL, &[("pr_id", json!(pr_id))]);
        let outcome = self
            .pr_lookup(
                TOOL,
                "SELECT cycle_time_minutes FROM pull_requests \
                 WHERE organization_id = ?1 AND pr_id = ?2 LIMIT 1",
                pr_id,
            )
            .map(|row| json!({ "cycle_time_minutes": optional_f64(row.get("cycle_time_minutes")) }));
        ToolResult::from_outcome(outcome)
    }

    pub fn get_review_time(&self, pr_id: i64) -> ToolResult {
        const TOOL: &str = "pr.get_review_time";
        self.audit.log_tool_call(TOOL, &[("pr_id", json!(pr_id))]);
        let outcome = self
            .pr_lookup(
                TOOL,
                "SELECT open_to_review_minutes AS review_time_minutes FROM pull_requests \
                 WHERE organization_id = ?1 AND pr_id = ?2 LIMIT 1",
                pr_id,
            )
            .map(|row| {
                json!({ "review_time_minutes": optional_f64(row.get("review_time_minutes")) })
            });
        ToolResult::from_outcome(outcome)
    }

    pub fn get_pr_count_period(&self, period: &str) -> ToolResult {
        const TOOL: &str = "pr.get_pr_count_period";
        self.audit.log_tool_call(TOOL, &[("period", json!(period))]);
        ToolResult::from_outcome(self.pr_count_period(TOOL, period))
    }

    fn pr_count_period(&self, caller: &str, period: &str) -> Result<Value, GatewayError> {
        let window = self.window(period);
        let session = self.session(caller)?;
        let count = self.count_in_window(
            &session,
            &format!(
                "SELECT COUNT(*) AS pr_count FROM pull_requests \
                 WHERE organization_id = ?1 AND {} LIMIT 1",
                window.range_predicate("created_on", 2)
            ),
            vec![
                self.tenant(),
                SqlValue::Text(window.start_utc()),
                SqlValue::Text(window.end_utc()),
            ],
        )?;

        let (period, start, end) = window_fields(period, &window);
        Ok(json!({
            "period": period,
            "start": start,
            "end": end,
            "pr_count": count,
        }))
    }

    pub fn get_prs_by_period(
        &self,
        period: &str,
        offset: Option<i64>,
        limit: Option<i64>,
        min_cycle_time_minutes: Option<f64>,
    ) -> ToolResult {
        const TOOL: &str = "pr.get_prs_by_period";
        self.audit.log_tool_call(
            TOOL,
            &[
                ("period", json!(period)),
                ("offset", json!(offset)),
                ("limit", json!(limit)),
                ("min_cycle_time", json!(min_cycle_time_minutes)),
            ],
        );
        ToolResult::from_outcome(self.prs_by_period(
            TOOL,
            period,
            offset,
            limit,
            min_cycle_time_minutes,
        ))
    }

    fn prs_by_period(
        &self,
        caller: &str,
        period: &str,
        offset: Option<i64>,
        limit: Option<i64>,
        min_cycle_time_minutes: Option<f64>,
    ) -> Result<Value, GatewayError> {
        let list_limit = self.config.pull_request_limits.list;
        let page = PageWindow::new(offset, limit, list_limit)?;
        if min_cycle_time_minutes.is_some_and(|minutes| !minutes.is_finite()) {
            return Err(ValidationFailure::invalid_argument(
                "min_cycle_time_minutes must be a finite number",
            )
            .into());
        }

        let window = self.window(period);
        let mut filter = format!(
            "organization_id = ?1 AND {}",
            window.range_predicate("created_on", 2)
        );
        let mut params = vec![
            self.tenant(),
            SqlValue::Text(window.start_utc()),
            SqlValue::Text(window.end_utc()),
        ];
        if let Some(minutes) = min_cycle_time_minutes {
            params.push(SqlValue::Real(minutes));
            filter.push_str(&format!(" AND cycle_time_minutes >= ?{}", params.len()));
        }

        let session = self.session(caller)?;
        let total = self.count_in_window(
            &session,
            &format!("SELECT COUNT(*) AS pr_count FROM pull_requests WHERE {filter} LIMIT 1"),
            params.clone(),
        )?;

        let limit_index = params.len() + 1;
        let list_sql = format!(
            "SELECT {PULL_REQUEST_COLUMNS} FROM pull_requests WHERE {filter} \
             ORDER BY created_on DESC, pr_id DESC LIMIT ?{limit_index} OFFSET ?{}",
            limit_index + 1
        );
        params.push(SqlValue::Integer(i64::from(page.limit)));
        params.push(SqlValue::Integer(page.offset));
        let rows = self.run_scoped(
            &session,
            &list_sql,
            params,
            Some(i64::from(page.limit)),
            list_limit,
        )?;

        let (period, start, end) = window_fields(period, &window);
        Ok(json!({
            "period": period,
            "start": start,
            "end": end,
            "offset": page.offset,
            "limit": page.limit,
            "pr_count": total,
            "prs": rows.rows,
        }))
    }

    pub fn get_churn_metrics(&self, pr_id: i64) -> ToolResult {
        const TOOL: &str = "pr.get_churn_metrics";
        self.audit.log_tool_call(TOOL, &[("pr_id", json!(pr_id))]);
        let outcome = self
            .pr_lookup(
                TOOL,
                "SELECT lines_added, lines_removed, modified_files_count, commits_count \
                 FROM pull_requests WHERE organization_id = ?1 AND pr_id = ?2 LIMIT 1",
                pr_id,
            )
            .map(|row| churn_metrics(&row));
        ToolResult::from_outcome(outcome)
    }

    pub fn run_custom_pr_query(
        &self,
        sql: &str,
        params: Vec<Value>,
        limit: Option<i64>,
    ) -> ToolResult {
        const TOOL: &str = "pr.run_custom_pr_query";
        self.audit.log_tool_call(TOOL, &[("limit", json!(limit))]);
        ToolResult::from_outcome(self.run_custom_query(
            TOOL,
            sql,
            params,
            limit,
            self.config.pull_request_limits.raw_query,
        ))
    }

    fn pr_lookup(&self, caller: &str, sql: &str, pr_id: i64) -> Result<Value, GatewayError> {
        self.lookup_one(
            caller,
            sql,
            vec![self.tenant(), SqlValue::Integer(pr_id)],
            PR_ENTITY,
        )
    }
}

/// Churn is added plus removed lines; per-file churn needs a positive file count.
fn churn_metrics(row: &Value) -> Value {
    let added = row.get("lines_added").and_then(Value::as_f64);
    let removed = row.get("lines_removed").and_then(Value::as_f64);
    let files_changed = row.get("modified_files_count").and_then(Value::as_i64);
    let commits_count = row.get("commits_count").and_then(Value::as_i64);

    let churn_lines = match (added, removed) {
        (None, None) => None,
        (added, removed) => Some(round2(added.unwrap_or(0.0) + removed.unwrap_or(0.0))),
    };
    let churn_per_file = match (churn_lines, files_changed) {
        (Some(churn), Some(files)) if files > 0 => Some(round2(churn / files as f64)),
        _ => None,
    };

    let mut metrics = Map::new();
    metrics.insert("churn_lines".to_string(), json!(churn_lines));
    metrics.insert("churn_per_file".to_string(), json!(churn_per_file));
    if let Some(files) = files_changed {
        metrics.insert("files_changed".to_string(), json!(files));
    }
    if let Some(commits) = commits_count {
        metrics.insert("commits_count".to_string(), json!(commits));
    }
    Value::Object(metrics)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
