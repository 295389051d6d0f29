#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use insightgate::Analytics;
use insightgate::audit::AuditSink;
use insightgate::config::GatewayConfig;
use insightgate::sqlite::{
    CommitRecord, PullRequestRecord, ensure_analytics_schema, insert_commits,
    insert_pull_requests, open_sqlite_connection,
};
use time::OffsetDateTime;
use time::macros::datetime;

pub const TENANT: i64 = 2133;
pub const OTHER_TENANT: i64 = 999;
pub const NOW: OffsetDateTime = datetime!(2026-10-15 14:30:45 UTC);

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}

pub fn commit(id: i64, organization_id: i64, committed_at: &str) -> CommitRecord {
    CommitRecord {
        id,
        organization_id,
        commit_sha: format!("{id:040x}"),
        author_id: Some(40 + id % 3),
        message: Some(format!("change #{id}")),
        repo_id: Some(7),
        branch: Some("main".to_string()),
        committed_at: committed_at.to_string(),
        lines_added: Some(10 * id),
        lines_removed: Some(id),
        html_link: Some(format!("https://git.example/commit/{id}")),
        kind: Some("feature".to_string()),
    }
}

pub fn pull_request(
    pr_id: i64,
    organization_id: i64,
    created_on: &str,
    cycle_time_minutes: Option<f64>,
) -> PullRequestRecord {
    PullRequestRecord {
        pr_id,
        organization_id,
        title: Some(format!("PR {pr_id}")),
        state: Some("merged".to_string()),
        author_id: Some(5),
        created_on: created_on.to_string(),
        merged_on: None,
        cycle_time_minutes,
        open_to_review_minutes: Some(12.0),
        commit_to_open_minutes: Some(3.5),
        lines_added: Some(10),
        lines_removed: Some(5),
        modified_files_count: Some(4),
        commits_count: Some(2),
    }
}

/// Tenant commits 1..=6 fall inside "last 7 days" relative to [`NOW`]
/// (1 and 2 share a timestamp); 7 is older; 8 belongs to another tenant.
pub fn seed_commits() -> Vec<CommitRecord> {
    vec![
        commit(1, TENANT, "2026-10-10T09:00:00.000Z"),
        commit(2, TENANT, "2026-10-10T09:00:00.000Z"),
        commit(3, TENANT, "2026-10-11T09:00:00.000Z"),
        commit(4, TENANT, "2026-10-12T09:00:00.000Z"),
        commit(5, TENANT, "2026-10-13T09:00:00.000Z"),
        commit(6, TENANT, "2026-10-14T09:00:00.000Z"),
        commit(7, TENANT, "2026-09-01T09:00:00.000Z"),
        commit(8, OTHER_TENANT, "2026-10-12T09:00:00.000Z"),
    ]
}

pub fn seed_pull_requests() -> Vec<PullRequestRecord> {
    let mut churnless = pull_request(103, TENANT, "2026-10-12T10:00:00.000Z", None);
    churnless.lines_added = None;
    churnless.lines_removed = None;
    churnless.modified_files_count = Some(0);
    churnless.commits_count = None;

    vec![
        pull_request(101, TENANT, "2026-10-10T10:00:00.000Z", Some(30.0)),
        pull_request(102, TENANT, "2026-10-11T10:00:00.000Z", Some(120.0)),
        churnless,
        pull_request(104, TENANT, "2026-10-13T10:00:00.000Z", Some(240.5)),
        pull_request(105, TENANT, "2026-10-14T10:00:00.000Z", Some(60.0)),
        pull_request(106, OTHER_TENANT, "2026-10-12T10:00:00.000Z", Some(90.0)),
    ]
}

pub fn seeded_database(label: &str) -> PathBuf {
    let path = unique_temp_dir(&format!("insightgate-{label}")).join("analytics.sqlite");
    let mut connection = open_sqlite_connection(&path).expect("database should open");
    ensure_analytics_schema(&connection).expect("schema should apply");
    insert_commits(&mut connection, &seed_commits()).expect("commits should insert");
    insert_pull_requests(&mut connection, &seed_pull_requests())
        .expect("pull requests should insert");
    path
}

pub fn analytics_for(database: &Path) -> Analytics {
    let config = GatewayConfig::new(TENANT, database, "/unused/activity.log")
        .expect("config should be valid");
    Analytics::new(config, Arc::new(AuditSink::memory())).with_fixed_now(NOW)
}

pub fn seeded_analytics(label: &str) -> Analytics {
    analytics_for(&seeded_database(label))
}
