use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, params};
use serde::{Deserialize, Serialize};

use crate::utils::time::{format_utc_seconds, normalize_utc_millis, now_utc};

pub const SQLITE_SCHEMA_VERSION: &str = "insightgate.analytics.v1";
pub const COMMITS_TABLE: &str = "commits";
pub const PULL_REQUESTS_TABLE: &str = "pull_requests";
pub const SCHEMA_META_TABLE: &str = "insightgate_schema_meta";
pub const READ_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_COMMITS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS commits (
    id INTEGER NOT NULL PRIMARY KEY,
    organization_id INTEGER NOT NULL,
    commit_sha TEXT NOT NULL,
    author_id INTEGER,
    message TEXT,
    repo_id INTEGER,
    branch TEXT,
    committed_at TEXT NOT NULL,
    lines_added INTEGER,
    lines_removed INTEGER,
    html_link TEXT,
    type TEXT
);
"#;

const CREATE_INDEX_COMMITS_TENANT_TIME_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_commits_tenant_time
ON commits (organization_id, committed_at, id);
"#;

const CREATE_PULL_REQUESTS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS pull_requests (
    pr_id INTEGER NOT NULL PRIMARY KEY,
    organization_id INTEGER NOT NULL,
    title TEXT,
    state TEXT,
    author_id INTEGER,
    created_on TEXT NOT NULL,
    merged_on TEXT,
    cycle_time_minutes REAL,
    open_to_review_minutes REAL,
    commit_to_open_minutes REAL,
    lines_added INTEGER,
    lines_removed INTEGER,
    modified_files_count INTEGER,
    commits_count INTEGER
);
"#;

const CREATE_INDEX_PULL_REQUESTS_TENANT_TIME_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_pull_requests_tenant_time
ON pull_requests (organization_id, created_on, pr_id);
"#;

const CREATE_META_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS insightgate_schema_meta (
    schema_version TEXT NOT NULL,
    applied_at_utc TEXT NOT NULL
);
"#;

#[must_use]
pub fn schema_statements() -> &'static [&'static str] {
    &[
        CREATE_COMMITS_TABLE_SQL,
        CREATE_INDEX_COMMITS_TENANT_TIME_SQL,
        CREATE_PULL_REQUESTS_TABLE_SQL,
        CREATE_INDEX_PULL_REQUESTS_TENANT_TIME_SQL,
        CREATE_META_TABLE_SQL,
    ]
}

#[must_use]
pub fn create_schema_sql() -> String {
    schema_statements().join("\n")
}

/// One commit row as stored. Timestamps use the fixed-width UTC form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: i64,
    pub organization_id: i64,
    pub commit_sha: String,
    pub author_id: Option<i64>,
    pub message: Option<String>,
    pub repo_id: Option<i64>,
    pub branch: Option<String>,
    pub committed_at: String,
    pub lines_added: Option<i64>,
    pub lines_removed: Option<i64>,
    pub html_link: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub pr_id: i64,
    pub organization_id: i64,
    pub title: Option<String>,
    pub state: Option<String>,
    pub author_id: Option<i64>,
    pub created_on: String,
    pub merged_on: Option<String>,
    pub cycle_time_minutes: Option<f64>,
    pub open_to_review_minutes: Option<f64>,
    pub commit_to_open_minutes: Option<f64>,
    pub lines_added: Option<i64>,
    pub lines_removed: Option<i64>,
    pub modified_files_count: Option<i64>,
    pub commits_count: Option<i64>,
}

/// Writable connection used only to bootstrap or load a local database.
pub fn open_sqlite_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create sqlite parent directory: {}",
                parent.display()
            )
        })?;
    }

    Connection::open(path)
        .with_context(|| format!("failed to open sqlite database: {}", path.display()))
}

/// Connection the gateway runs statements on. The file must already exist;
/// the handle refuses writes at both the open-flag and pragma level.
pub fn open_read_only_connection(path: &Path) -> rusqlite::Result<Connection> {
    let connection = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI,
    )?;
    connection.busy_timeout(READ_BUSY_TIMEOUT)?;
    connection.pragma_update(None, "query_only", true)?;
    Ok(connection)
}

pub fn ensure_analytics_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(&create_schema_sql())
        .context("failed to create analytics schema")?;

    if schema_meta_has_version(connection, SQLITE_SCHEMA_VERSION)? {
        return Ok(());
    }

    let applied_at_utc = format_utc_seconds(now_utc());
    connection
        .execute(
            &format!(
                "INSERT INTO {SCHEMA_META_TABLE} (schema_version, applied_at_utc) VALUES (?1, ?2)"
            ),
            params![SQLITE_SCHEMA_VERSION, applied_at_utc],
        )
        .context("failed to write schema meta row")?;

    tracing::info!(
        version = SQLITE_SCHEMA_VERSION,
        "applied analytics schema"
    );
    Ok(())
}

fn schema_meta_has_version(connection: &Connection, schema_version: &str) -> Result<bool> {
    let query = format!(
        "SELECT EXISTS(SELECT 1 FROM {SCHEMA_META_TABLE} WHERE schema_version = ?1 LIMIT 1)"
    );
    let exists = connection
        .query_row(&query, [schema_version], |row| row.get::<usize, i64>(0))
        .context("failed to query schema version metadata")?;
    Ok(exists != 0)
}

pub fn insert_commits(connection: &mut Connection, commits: &[CommitRecord]) -> Result<usize> {
    let tx = connection
        .transaction()
        .context("failed to open sqlite transaction")?;
    {
        let mut statement = tx
            .prepare_cached(
                "INSERT INTO commits (id, organization_id, commit_sha, author_id, message, repo_id, \
                 branch, committed_at, lines_added, lines_removed, html_link, type) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )
            .context("failed to prepare commit insert")?;
        for commit in commits {
            let committed_at = normalize_utc_millis(&commit.committed_at)
                .with_context(|| format!("commit {} has an invalid committed_at", commit.id))?;
            statement
                .execute(params![
                    commit.id,
                    commit.organization_id,
                    commit.commit_sha,
                    commit.author_id,
                    commit.message,
                    commit.repo_id,
                    commit.branch,
                    committed_at,
                    commit.lines_added,
                    commit.lines_removed,
                    commit.html_link,
                    commit.kind,
                ])
                .with_context(|| format!("failed to insert commit {}", commit.id))?;
        }
    }
    tx.commit().context("failed to commit sqlite transaction")?;
    Ok(commits.len())
}

pub fn insert_pull_requests(
    connection: &mut Connection,
    pull_requests: &[PullRequestRecord],
) -> Result<usize> {
    let tx = connection
        .transaction()
        .context("failed to open sqlite transaction")?;
    {
        let mut statement = tx
            .prepare_cached(
                "INSERT INTO pull_requests (pr_id, organization_id, title, state, author_id, \
                 created_on, merged_on, cycle_time_minutes, open_to_review_minutes, \
                 commit_to_open_minutes, lines_added, lines_removed, modified_files_count, \
                 commits_count) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )
            .context("failed to prepare pull request insert")?;
        for pr in pull_requests {
            let created_on = normalize_utc_millis(&pr.created_on)
                .with_context(|| format!("pull request {} has an invalid created_on", pr.pr_id))?;
            let merged_on = pr
                .merged_on
                .as_deref()
                .map(normalize_utc_millis)
                .transpose()
                .with_context(|| format!("pull request {} has an invalid merged_on", pr.pr_id))?;
            statement
                .execute(params![
                    pr.pr_id,
                    pr.organization_id,
                    pr.title,
                    pr.state,
                    pr.author_id,
                    created_on,
                    merged_on,
                    pr.cycle_time_minutes,
                    pr.open_to_review_minutes,
                    pr.commit_to_open_minutes,
                    pr.lines_added,
                    pr.lines_removed,
                    pr.modified_files_count,
                    pr.commits_count,
                ])
                .with_context(|| format!("failed to insert pull request {}", pr.pr_id))?;
        }
    }
    tx.commit().context("failed to commit sqlite transaction")?;
    Ok(pull_requests.len())
}
