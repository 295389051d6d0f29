use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params_from_iter};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::audit::{AuditSink, StatementOutcome};
use crate::models::{GatewayError, Statement, json_value_from_sql};
use crate::sqlite::open_read_only_connection;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRows {
    pub column_names: Vec<String>,
    pub rows: Vec<Value>,
    pub row_count: usize,
}

impl QueryRows {
    #[must_use]
    pub fn first(&self) -> Option<&Value> {
        self.rows.first()
    }

    /// First column of the first row as an integer, for `COUNT(*)` queries.
    #[must_use]
    pub fn scalar_i64(&self) -> Option<i64> {
        let column = self.column_names.first()?;
        self.first()?.get(column)?.as_i64()
    }
}

/// Hands out one read-only session per operation. Holds no connection itself.
#[derive(Debug, Clone)]
pub struct ExecutionGateway {
    database_path: PathBuf,
    audit: Arc<AuditSink>,
}

impl ExecutionGateway {
    #[must_use]
    pub fn new(database_path: impl Into<PathBuf>, audit: Arc<AuditSink>) -> Self {
        Self {
            database_path: database_path.into(),
            audit,
        }
    }

    pub fn open_session(&self, caller: &str) -> Result<GatewaySession<'_>, GatewayError> {
        let connection = open_read_only_connection(&self.database_path).map_err(|error| {
            tracing::error!(
                caller,
                database = %self.database_path.display(),
                error = %error,
                "analytics datastore unavailable"
            );
            GatewayError::Connection {
                detail: error.to_string(),
            }
        })?;

        Ok(GatewaySession {
            connection,
            caller: caller.to_string(),
            audit: &self.audit,
        })
    }
}

/// A single operation's connection. Dropping the session closes it.
pub struct GatewaySession<'a> {
    connection: Connection,
    caller: String,
    audit: &'a AuditSink,
}

impl GatewaySession<'_> {
    pub fn execute(&self, statement: &Statement) -> Result<QueryRows, GatewayError> {
        let started = Instant::now();
        let outcome = run_statement(&self.connection, &statement.text, &statement.params);
        let params_json = statement.params_json();

        match &outcome {
            Ok(rows) => self.audit.record_statement(
                &self.caller,
                &statement.text,
                &params_json,
                StatementOutcome::Rows(rows.row_count),
                started.elapsed(),
            ),
            Err(error) => self.audit.record_statement(
                &self.caller,
                &statement.text,
                &params_json,
                StatementOutcome::Failed(&error.to_string()),
                started.elapsed(),
            ),
        }

        outcome.map_err(|error| GatewayError::execution(error.to_string()))
    }
}

fn run_statement(
    connection: &Connection,
    sql: &str,
    params: &[SqlValue],
) -> rusqlite::Result<QueryRows> {
    let mut statement = connection.prepare(sql)?;
    let column_names = statement
        .column_names()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    let mut rows = statement.query(params_from_iter(params.iter()))?;
    let mut result_rows = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Map::new();
        for (index, column_name) in column_names.iter().enumerate() {
            let value = row.get::<usize, SqlValue>(index)?;
            record.insert(column_name.clone(), json_value_from_sql(value));
        }
        result_rows.push(Value::Object(record));
    }

    Ok(QueryRows {
        column_names,
        row_count: result_rows.len(),
        rows: result_rows,
    })
}
