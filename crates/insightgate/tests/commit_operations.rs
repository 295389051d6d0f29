mod common;

use common::{NOW, TENANT, analytics_for, commit, seeded_analytics, seeded_database, unique_temp_dir};
use insightgate::sqlite::{insert_commits, open_sqlite_connection};
use serde_json::{Value, json};

fn ids(result: &Value, key: &str) -> Vec<i64> {
    result[key]
        .as_array()
        .expect("list should be an array")
        .iter()
        .map(|row| row["id"].as_i64().expect("row id should be an integer"))
        .collect()
}

#[test]
fn commit_summary_returns_tenant_commit() {
    let analytics = seeded_analytics("commit-summary");
    let result = analytics.get_commit_summary(3);

    assert!(result.success, "{result:?}");
    let commit = &result.data.as_ref().expect("data")["commit"];
    assert_eq!(commit["id"], json!(3));
    assert_eq!(commit["committed_at"], json!("2026-10-11T09:00:00.000Z"));
    assert_eq!(commit["type"], json!("feature"));
    assert!(commit.get("organization_id").is_none());
}

#[test]
fn other_tenants_commit_is_not_found() {
    let analytics = seeded_analytics("commit-foreign");
    let result = analytics.get_commit_summary(8);

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Commit not found"));
}

#[test]
fn unavailable_datastore_is_a_generic_failure_not_a_miss() {
    let missing = unique_temp_dir("insightgate-missing").join("analytics.sqlite");
    let analytics = analytics_for(&missing);
    let result = analytics.get_commit_summary(3);

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Query execution failed (internal error).")
    );
}

#[test]
fn commit_count_covers_only_the_tenant_and_the_window() {
    let analytics = seeded_analytics("commit-count");
    let result = analytics.get_commit_count_period("last 7 days");

    assert!(result.success, "{result:?}");
    let data = result.data.expect("data");
    assert_eq!(data["commit_count"], json!(6));
    assert_eq!(data["period"], json!("last 7 days"));
    assert_eq!(data["start"], json!("2026-10-08T14:30:45.000Z"));
    assert_eq!(data["end"], json!("2026-10-15T14:30:45.000Z"));
}

#[test]
fn empty_period_means_trailing_thirty_days() {
    let analytics = seeded_analytics("commit-default-period");
    let empty = analytics.get_commit_count_period("").data.expect("data");
    let explicit = analytics
        .get_commit_count_period("last 30 days")
        .data
        .expect("data");

    assert_eq!(empty["start"], explicit["start"]);
    assert_eq!(empty["end"], explicit["end"]);
    assert_eq!(empty["commit_count"], json!(6));
}

#[test]
fn commit_pages_concatenate_to_the_full_listing() {
    let analytics = seeded_analytics("commit-pages");
    let full = analytics
        .get_commits_period("last 7 days", Some(0), Some(100))
        .data
        .expect("full listing");
    let full_ids = ids(&full, "commits");
    assert_eq!(full_ids, vec![6, 5, 4, 3, 2, 1]);

    let mut paged = Vec::new();
    for offset in [0, 2, 4, 6] {
        let page = analytics
            .get_commits_period("last 7 days", Some(offset), Some(2))
            .data
            .expect("page");
        assert_eq!(page["commit_count"], json!(6));
        assert_eq!(page["offset"], json!(offset));
        assert_eq!(page["limit"], json!(2));
        paged.extend(ids(&page, "commits"));
    }
    assert_eq!(paged, full_ids);
}

#[test]
fn commit_listing_defaults_to_fifty_rows() {
    let analytics = seeded_analytics("commit-default-limit");
    let data = analytics
        .get_commits_period("last month", None, None)
        .data
        .expect("data");
    assert_eq!(data["offset"], json!(0));
    assert_eq!(data["limit"], json!(50));
}

#[test]
fn commit_listing_rejects_bad_page_windows() {
    let analytics = seeded_analytics("commit-bad-window");

    let negative = analytics.get_commits_period("last 7 days", Some(-1), None);
    assert_eq!(negative.error.as_deref(), Some("offset must be non-negative"));

    for limit in [0, 101] {
        let result = analytics.get_commits_period("last 7 days", None, Some(limit));
        assert_eq!(
            result.error.as_deref(),
            Some("limit must be between 1 and 100")
        );
    }
}

#[test]
fn repeated_reads_are_identical() {
    let analytics = seeded_analytics("commit-idempotent");
    let first = analytics.get_commits_period("last 7 days", Some(1), Some(3));
    let second = analytics.get_commits_period("last 7 days", Some(1), Some(3));
    assert_eq!(first, second);
}

#[test]
fn custom_query_without_scope_is_filtered_to_tenant() {
    let analytics = seeded_analytics("commit-custom-scope");
    let result = analytics.run_custom_commit_query(
        "SELECT organization_id, id FROM commits ORDER BY id",
        Vec::new(),
        None,
    );

    assert!(result.success, "{result:?}");
    let data = result.data.expect("data");
    assert_eq!(data["rowcount"], json!(7));
    assert!(
        data["rows"]
            .as_array()
            .expect("rows")
            .iter()
            .all(|row| row["organization_id"] == json!(TENANT))
    );
}

#[test]
fn custom_query_naming_another_tenant_sees_nothing() {
    let analytics = seeded_analytics("commit-custom-foreign");
    let result = analytics.run_custom_commit_query(
        "SELECT organization_id, id FROM commits WHERE organization_id = ?",
        vec![json!(999)],
        None,
    );

    assert!(result.success, "{result:?}");
    assert_eq!(result.data.expect("data")["rowcount"], json!(0));
}

#[test]
fn custom_compound_query_cannot_reach_other_tenants() {
    let analytics = seeded_analytics("commit-custom-union");
    let result = analytics.run_custom_commit_query(
        "SELECT organization_id, id FROM commits WHERE organization_id = 2133 \
         UNION ALL SELECT organization_id, id FROM commits LIMIT 50",
        Vec::new(),
        None,
    );

    assert!(result.success, "{result:?}");
    let data = result.data.expect("data");
    assert_eq!(data["rowcount"], json!(14));
    assert!(
        data["rows"]
            .as_array()
            .expect("rows")
            .iter()
            .all(|row| row["organization_id"] == json!(TENANT))
    );
}

#[test]
fn custom_query_with_bound_tenant_gets_a_limit() {
    let analytics = seeded_analytics("commit-custom-limit");
    let result = analytics.run_custom_commit_query(
        "SELECT id FROM commits WHERE organization_id = ? ORDER BY id",
        vec![json!(TENANT)],
        Some(3),
    );

    assert!(result.success, "{result:?}");
    assert_eq!(result.data.expect("data")["rowcount"], json!(3));
}

#[test]
fn custom_query_without_scope_projection_fails_generically() {
    let analytics = seeded_analytics("commit-custom-projection");
    let result = analytics.run_custom_commit_query("SELECT id FROM commits", Vec::new(), None);

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Query execution failed (internal error).")
    );
}

#[test]
fn custom_query_rejections_never_reach_the_datastore() {
    let analytics = seeded_analytics("commit-custom-reject");
    let cases = [
        ("DROP TABLE x", "Only SELECT/CTE read queries are allowed."),
        ("SELECT 1; DROP TABLE x", "Only single read-only statements are permitted."),
        (
            "select * from t -- ; drop table x",
            "Comments may not contain statement separators or write keywords.",
        ),
        ("UPDATE t SET a=1", "Only SELECT/CTE read queries are allowed."),
        ("", "SQL must be a non-empty string."),
    ];

    for (sql, message) in cases {
        let result = analytics.run_custom_commit_query(sql, Vec::new(), None);
        assert!(!result.success, "{sql}");
        assert_eq!(result.error.as_deref(), Some(message), "{sql}");
    }

    assert!(
        analytics
            .audit()
            .lines()
            .iter()
            .all(|line| !line.contains("[SQL]"))
    );
}

#[test]
fn custom_query_limit_ceiling_is_five_hundred() {
    let analytics = seeded_analytics("commit-custom-ceiling");
    let at_ceiling = analytics.run_custom_commit_query(
        "SELECT organization_id, id FROM commits",
        Vec::new(),
        Some(500),
    );
    assert!(at_ceiling.success);

    let above = analytics.run_custom_commit_query(
        "SELECT organization_id, id FROM commits",
        Vec::new(),
        Some(501),
    );
    assert_eq!(
        above.error.as_deref(),
        Some("limit must be between 1 and 500")
    );
}

#[test]
fn custom_query_rejects_nested_params() {
    let analytics = seeded_analytics("commit-custom-params");
    let result = analytics.run_custom_commit_query(
        "SELECT organization_id, id FROM commits WHERE id = ?",
        vec![json!([1, 2])],
        None,
    );
    assert!(!result.success);
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|message| message.starts_with("invalid params:"))
    );
}

#[test]
fn fixed_clock_matches_window_end() {
    let analytics = seeded_analytics("commit-clock");
    let data = analytics
        .get_commit_count_period("today")
        .data
        .expect("data");
    assert_eq!(data["start"], json!("2026-10-15T00:00:00.000Z"));
    assert_eq!(
        data["end"],
        json!(insightgate::utils::time::format_utc_millis(NOW))
    );
}

#[test]
fn boundary_rows_belong_to_exactly_one_window() {
    let database = seeded_database("commit-boundaries");
    let mut connection = open_sqlite_connection(&database).expect("database should open");
    insert_commits(
        &mut connection,
        &[
            commit(20, TENANT, "2026-10-15T00:00:00.000Z"),
            commit(21, TENANT, "2026-09-30T23:59:59.000Z"),
            commit(22, TENANT, "2026-10-01T00:00:00.000Z"),
        ],
    )
    .expect("boundary commits should insert");
    drop(connection);

    let analytics = analytics_for(&database);
    let count = |period: &str| {
        analytics
            .get_commit_count_period(period)
            .data
            .expect("data")["commit_count"]
            .as_i64()
            .expect("count should be an integer")
    };

    assert_eq!(count("yesterday"), 1);
    assert_eq!(count("today"), 1);
    assert_eq!(count("last month"), 2);
    assert_eq!(count("this month"), 8);

    let listed = analytics
        .get_commits_period("yesterday", None, None)
        .data
        .expect("data");
    assert_eq!(ids(&listed, "commits"), vec![6]);
}
