//! Tenant-scoped analytics operations.
//!
//! Every operation opens one gateway session, routes each statement through
//! guard and enforcer, and folds the outcome into a [`crate::models::ToolResult`].

pub mod catalog;
pub mod commits;
pub mod pull_requests;

use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::audit::AuditSink;
use crate::config::{GatewayConfig, RowLimit};
use crate::enforce::{ScopeEnforcer, validate_limit};
use crate::gateway::{ExecutionGateway, GatewaySession, QueryRows};
use crate::guard::check_read_only;
use crate::models::{
    GatewayError, Statement, ValidationFailure, ViolationReason, sql_value_from_json,
};
use crate::period::{TimeWindow, resolve_period_at};
use crate::utils::time::now_utc;

const SINGLE_ROW: RowLimit = RowLimit {
    default: 1,
    ceiling: 1,
};

/// Offset and row count for one page of a period listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub offset: i64,
    pub limit: u32,
}

impl PageWindow {
    pub fn new(
        offset: Option<i64>,
        limit: Option<i64>,
        row_limit: RowLimit,
    ) -> Result<Self, ValidationFailure> {
        let offset = offset.unwrap_or(0);
        if offset < 0 {
            return Err(ValidationFailure::new(
                ViolationReason::OffsetOutOfRange,
                "offset must be non-negative",
            ));
        }
        let limit = validate_limit(limit, row_limit)?;
        Ok(Self { offset, limit })
    }
}

pub struct Analytics {
    config: GatewayConfig,
    audit: Arc<AuditSink>,
    gateway: ExecutionGateway,
    enforcer: ScopeEnforcer,
    fixed_now: Option<OffsetDateTime>,
}

impl Analytics {
    #[must_use]
    pub fn new(config: GatewayConfig, audit: Arc<AuditSink>) -> Self {
        let gateway = ExecutionGateway::new(config.database_path.clone(), Arc::clone(&audit));
        let enforcer = ScopeEnforcer::new(config.tenant_id);
        Self {
            config,
            audit,
            gateway,
            enforcer,
            fixed_now: None,
        }
    }

    /// Pins "now" for period resolution.
    #[must_use]
    pub fn with_fixed_now(mut self, now: OffsetDateTime) -> Self {
        self.fixed_now = Some(now);
        self
    }

    #[must_use]
    pub fn audit(&self) -> &AuditSink {
        &self.audit
    }

    fn window(&self, period: &str) -> TimeWindow {
        resolve_period_at(period, self.fixed_now.unwrap_or_else(now_utc))
    }

    fn tenant(&self) -> SqlValue {
        SqlValue::Integer(self.config.tenant_id)
    }

    fn session(&self, caller: &str) -> Result<GatewaySession<'_>, GatewayError> {
        self.gateway.open_session(caller)
    }

    /// Guard then enforce; nothing reaches the datastore before both pass.
    fn prepare_scoped(
        &self,
        sql: &str,
        params: Vec<SqlValue>,
        requested_limit: Option<i64>,
        row_limit: RowLimit,
    ) -> Result<Statement, ValidationFailure> {
        let sanitized = check_read_only(sql)?;
        let enforced = self
            .enforcer
            .enforce(&sanitized, params, requested_limit, row_limit)?;
        Ok(enforced.statement)
    }

    fn run_scoped(
        &self,
        session: &GatewaySession<'_>,
        sql: &str,
        params: Vec<SqlValue>,
        requested_limit: Option<i64>,
        row_limit: RowLimit,
    ) -> Result<QueryRows, GatewayError> {
        let statement = self.prepare_scoped(sql, params, requested_limit, row_limit)?;
        session.execute(&statement)
    }

    /// Single-row lookup; no row means the entity does not exist for this tenant.
    fn lookup_one(
        &self,
        caller: &str,
        sql: &str,
        params: Vec<SqlValue>,
        entity: &'static str,
    ) -> Result<Value, GatewayError> {
        let session = self.session(caller)?;
        let rows = self.run_scoped(&session, sql, params, None, SINGLE_ROW)?;
        rows.rows
            .into_iter()
            .next()
            .ok_or(GatewayError::NotFound { entity })
    }

    fn count_in_window(
        &self,
        session: &GatewaySession<'_>,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<i64, GatewayError> {
        let rows = self.run_scoped(session, sql, params, None, SINGLE_ROW)?;
        Ok(rows.scalar_i64().unwrap_or(0))
    }

    /// The caller-supplied statement path shared by both families.
    fn run_custom_query(
        &self,
        caller: &str,
        sql: &str,
        params: Vec<Value>,
        limit: Option<i64>,
        row_limit: RowLimit,
    ) -> Result<Value, GatewayError> {
        let params = params
            .into_iter()
            .map(sql_value_from_json)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| {
                ValidationFailure::invalid_argument(format!("invalid params: {message}"))
            })?;
        let statement = self.prepare_scoped(sql, params, limit, row_limit)?;
        let rows = self.session(caller)?.execute(&statement)?;
        Ok(json!({
            "rows": rows.rows,
            "rowcount": rows.row_count,
        }))
    }
}

fn window_fields(period: &str, window: &TimeWindow) -> (Value, Value, Value) {
    let summary = window.describe(period);
    (
        Value::from(summary.period),
        Value::from(summary.start),
        Value::from(summary.end),
    )
}

fn optional_f64(value: Option<&Value>) -> Value {
    value
        .and_then(Value::as_f64)
        .map_or(Value::Null, Value::from)
}
