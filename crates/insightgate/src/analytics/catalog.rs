//! Datastore metadata. Catalog rows are not tenant data, so these statements
//! pass the guard and carry their own bound limit but skip scope injection.

use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::Analytics;
use crate::config::CATALOG_ROW_LIMIT;
use crate::guard::check_read_only;
use crate::models::{GatewayError, Statement, ToolResult, ValidationFailure};
use crate::sqlite::SCHEMA_META_TABLE;

/// Operation family a catalog call is issued under; it only affects the
/// tool name recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Commit,
    Pr,
}

impl Family {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Pr => "pr",
        }
    }
}

impl Analytics {
    pub fn list_tables(&self, family: Family) -> ToolResult {
        let tool = format!("{}.list_tables", family.prefix());
        self.audit.log_tool_call(&tool, &[]);
        ToolResult::from_outcome(self.catalog_tables(&tool))
    }

    fn catalog_tables(&self, caller: &str) -> Result<Value, GatewayError> {
        let sql = format!(
            "SELECT name AS table_name FROM sqlite_schema \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name <> '{SCHEMA_META_TABLE}' \
             ORDER BY name LIMIT ?1"
        );
        let rows = self.run_catalog(
            caller,
            &sql,
            vec![SqlValue::Integer(i64::from(CATALOG_ROW_LIMIT))],
        )?;
        let tables = rows
            .into_iter()
            .filter_map(|row| row.get("table_name").cloned())
            .collect::<Vec<_>>();
        Ok(json!({ "tables": tables }))
    }

    pub fn get_table_schema(&self, family: Family, table_name: &str) -> ToolResult {
        let tool = format!("{}.get_table_schema", family.prefix());
        self.audit
            .log_tool_call(&tool, &[("table", json!(table_name))]);
        ToolResult::from_outcome(self.catalog_columns(&tool, table_name))
    }

    fn catalog_columns(&self, caller: &str, table_name: &str) -> Result<Value, GatewayError> {
        if table_name.trim().is_empty() {
            return Err(ValidationFailure::invalid_argument("table_name must be non-empty").into());
        }
        let rows = self.run_catalog(
            caller,
            "SELECT name AS column_name, type AS data_type FROM pragma_table_info(?1) \
             ORDER BY cid LIMIT ?2",
            vec![
                SqlValue::Text(table_name.to_string()),
                SqlValue::Integer(i64::from(CATALOG_ROW_LIMIT)),
            ],
        )?;
        Ok(json!({ "columns": rows }))
    }

    fn run_catalog(
        &self,
        caller: &str,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<Vec<Value>, GatewayError> {
        let sanitized = check_read_only(sql)?;
        let session = self.session(caller)?;
        let rows = session.execute(&Statement::new(sanitized, params))?;
        Ok(rows.rows)
    }
}
