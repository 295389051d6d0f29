pub mod call;
pub mod init_db;
pub mod serve;
pub mod tools;

use std::sync::Arc;

use anyhow::{Result, anyhow};

use crate::analytics::Analytics;
use crate::audit::AuditSink;
use crate::config::{GatewayConfig, RuntimePaths};

/// Resolved process settings shared by the commands that talk to the datastore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub paths: RuntimePaths,
    pub tenant_id: Option<i64>,
    pub audit_enabled: bool,
}

impl RuntimeSettings {
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let tenant_id = self.tenant_id.ok_or_else(|| {
            anyhow!("tenant id is required; pass --tenant-id or set INSIGHTGATE_TENANT_ID")
        })?;
        GatewayConfig::from_runtime_paths(tenant_id, &self.paths)
    }

    pub fn analytics(&self) -> Result<Analytics> {
        let config = self.gateway_config()?;
        let audit = if self.audit_enabled {
            AuditSink::file(config.audit_log_path.clone())
        } else {
            AuditSink::disabled()
        };
        tracing::debug!(
            tenant_id = config.tenant_id,
            database = %config.database_path.display(),
            audit = self.audit_enabled,
            "analytics gateway configured"
        );
        Ok(Analytics::new(config, Arc::new(audit)))
    }
}
