use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use serde::Serialize;

pub const DEFAULT_STATE_DIR: &str = ".insightgate";
pub const DEFAULT_DATABASE_FILE: &str = "analytics.sqlite";
pub const DEFAULT_AUDIT_LOG_FILE: &str = "logs/activity.log";

/// Row bound for one call site: the value used when the caller gives none,
/// and the largest value a caller may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowLimit {
    pub default: u32,
    pub ceiling: u32,
}

/// Ceilings for one operation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FamilyLimits {
    pub list: RowLimit,
    pub raw_query: RowLimit,
}

pub const COMMIT_LIMITS: FamilyLimits = FamilyLimits {
    list: RowLimit {
        default: 50,
        ceiling: 100,
    },
    raw_query: RowLimit {
        default: 50,
        ceiling: 500,
    },
};

pub const PULL_REQUEST_LIMITS: FamilyLimits = FamilyLimits {
    list: RowLimit {
        default: 10,
        ceiling: 50,
    },
    raw_query: RowLimit {
        default: 10,
        ceiling: 50,
    },
};

/// Metadata listings are not tenant data but are still bounded.
pub const CATALOG_ROW_LIMIT: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub database_path: PathBuf,
    pub audit_log_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub tenant_id: i64,
    pub database_path: PathBuf,
    pub audit_log_path: PathBuf,
    pub commit_limits: FamilyLimits,
    pub pull_request_limits: FamilyLimits,
}

impl GatewayConfig {
    pub fn new(
        tenant_id: i64,
        database_path: impl Into<PathBuf>,
        audit_log_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        if tenant_id <= 0 {
            bail!("tenant id must be a positive integer, got {tenant_id}");
        }
        Ok(Self {
            tenant_id,
            database_path: database_path.into(),
            audit_log_path: audit_log_path.into(),
            commit_limits: COMMIT_LIMITS,
            pull_request_limits: PULL_REQUEST_LIMITS,
        })
    }

    pub fn from_runtime_paths(tenant_id: i64, paths: &RuntimePaths) -> Result<Self> {
        Self::new(
            tenant_id,
            paths.database_path.clone(),
            paths.audit_log_path.clone(),
        )
    }
}

pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    database_override: Option<&Path>,
    audit_log_override: Option<&Path>,
) -> Result<RuntimePaths> {
    if !home_dir.is_absolute() {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }

    let home_dir = normalize_lexical(home_dir);
    let cwd = normalize_lexical(cwd);
    let state_dir = home_dir.join(DEFAULT_STATE_DIR);

    let database_path = match database_override {
        Some(path) => resolve_user_path(path, &home_dir, &cwd)?,
        None => state_dir.join(DEFAULT_DATABASE_FILE),
    };
    let audit_log_path = match audit_log_override {
        Some(path) => resolve_user_path(path, &home_dir, &cwd)?,
        None => state_dir.join(DEFAULT_AUDIT_LOG_FILE),
    };

    Ok(RuntimePaths {
        home_dir,
        cwd,
        database_path: normalize_lexical(&database_path),
        audit_log_path: normalize_lexical(&audit_log_path),
    })
}

fn resolve_user_path(path: &Path, home_dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(path, home_dir)?;
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    Ok(normalize_lexical(&resolved))
}

fn expand_tilde(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}
