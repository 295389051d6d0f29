use rusqlite::types::Value as SqlValue;
use serde_json::{Value, json};

use super::{Analytics, PageWindow, window_fields};
use crate::models::{GatewayError, ToolResult};
use crate::period::TimeWindow;

pub const COMMIT_COLUMNS: &str = "id, commit_sha, author_id, message, repo_id, branch, \
     committed_at, lines_added, lines_removed, html_link, type";

fn window_filter(window: &TimeWindow) -> String {
    format!(
        "organization_id = ?1 AND {}",
        window.range_predicate("committed_at", 2)
    )
}

fn count_in_window_sql(filter: &str) -> String {
    format!("SELECT COUNT(*) AS commit_count FROM commits WHERE {filter} LIMIT 1")
}

impl Analytics {
    pub fn get_commit_summary(&self, commit_id: i64) -> ToolResult {
        const TOOL: &str = "commit.get_commit_summary";
        self.audit.log_tool_call(TOOL, &[("commit_id", json!(commit_id))]);

        let sql = format!(
            "SELECT {COMMIT_COLUMNS} FROM commits WHERE organization_id = ?1 AND id = ?2 LIMIT 1"
        );
        let outcome = self
            .lookup_one(
                TOOL,
                &sql,
                vec![self.tenant(), SqlValue::Integer(commit_id)],
                "Commit",
            )
            .map(|commit| json!({ "commit": commit }));
        ToolResult::from_outcome(outcome)
    }

    pub fn get_commit_count_period(&self, period: &str) -> ToolResult {
        const TOOL: &str = "commit.get_commit_count_period";
        self.audit.log_tool_call(TOOL, &[("period", json!(period))]);
        ToolResult::from_outcome(self.commit_count_period(TOOL, period))
    }

    fn commit_count_period(&self, caller: &str, period: &str) -> Result<Value, GatewayError> {
        let window = self.window(period);
        let session = self.session(caller)?;
        let count = self.count_in_window(
            &session,
            &count_in_window_sql(&window_filter(&window)),
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
            "commit_count": count,
        }))
    }

    pub fn get_commits_period(
        &self,
        period: &str,
        offset: Option<i64>,
        limit: Option<i64>,
    ) -> ToolResult {
        const TOOL: &str = "commit.get_commits_period";
        self.audit.log_tool_call(
            TOOL,
            &[
                ("period", json!(period)),
                ("offset", json!(offset)),
                ("limit", json!(limit)),
            ],
        );
        ToolResult::from_outcome(self.commits_period(TOOL, period, offset, limit))
    }

    fn commits_period(
        &self,
        caller: &str,
        period: &str,
        offset: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Value, GatewayError> {
        let list_limit = self.config.commit_limits.list;
        let page = PageWindow::new(offset, limit, list_limit)?;
        let window = self.window(period);
        let window_params = vec![
            self.tenant(),
            SqlValue::Text(window.start_utc()),
            SqlValue::Text(window.end_utc()),
        ];

        let session = self.session(caller)?;
        let filter = window_filter(&window);
        let total =
            self.count_in_window(&session, &count_in_window_sql(&filter), window_params.clone())?;

        let list_sql = format!(
            "SELECT {COMMIT_COLUMNS} FROM commits \
             WHERE {filter} \
             ORDER BY committed_at DESC, id DESC LIMIT ?4 OFFSET ?5"
        );
        let mut list_params = window_params;
        list_params.push(SqlValue::Integer(i64::from(page.limit)));
        list_params.push(SqlValue::Integer(page.offset));
        let rows = self.run_scoped(
            &session,
            &list_sql,
            list_params,
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
            "commit_count": total,
            "commits": rows.rows,
        }))
    }

    /// Caller-written statement over commit data, scoped and bounded before it runs.
    pub fn run_custom_commit_query(
        &self,
        sql: &str,
        params: Vec<Value>,
        limit: Option<i64>,
    ) -> ToolResult {
        const TOOL: &str = "commit.run_custom_commit_query";
        self.audit.log_tool_call(TOOL, &[("limit", json!(limit))]);
        ToolResult::from_outcome(self.run_custom_query(
            TOOL,
            sql,
            params,
            limit,
            self.config.commit_limits.raw_query,
        ))
    }
}
