//! Tenant-scope and row-limit enforcement for guard-approved statements.
//!
//! Rewrites are textual: an untrusted statement becomes the inner subquery of
//! `SELECT * FROM (<inner>) AS sub ...`. The inner statement must project
//! the scope column for the injected predicate to bind; when it does not, the
//! datastore rejects the statement and the caller sees a generic execution
//! failure.

use std::sync::LazyLock;

use regex::Regex;
use rusqlite::types::Value as SqlValue;
use serde::Serialize;
use serde_json::json;

use crate::config::RowLimit;
use crate::guard::words;
use crate::models::{Statement, ValidationFailure, ViolationReason};

pub const SCOPE_COLUMN: &str = "organization_id";

/// Set operators whose later arms may read rows without a tenant predicate.
pub const COMPOUND_OPERATORS: &[&str] = &["union", "intersect", "except"];

static SCOPE_EQUALITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\borganization_id\s*==?\s*(\?\d*|-?\d+)")
        .expect("scope equality pattern must compile")
});
static TRAILING_LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\blimit\s+(\?\d*|\d+)\s*(?:(,)\s*(\?\d*|\d+)|offset\s+\S+)?$")
        .expect("trailing limit pattern must compile")
});
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?(\d*)").expect("placeholder pattern must compile"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rewrite {
    /// Already bound to the tenant and closed by a limit in range.
    Unchanged,
    LimitAppended,
    ScopeAndLimitAppended,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnforcedStatement {
    pub statement: Statement,
    pub rewrite: Rewrite,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeEnforcer {
    tenant_id: i64,
}

impl ScopeEnforcer {
    #[must_use]
    pub const fn new(tenant_id: i64) -> Self {
        Self { tenant_id }
    }

    pub fn enforce(
        &self,
        sanitized: &str,
        params: Vec<SqlValue>,
        requested_limit: Option<i64>,
        row_limit: RowLimit,
    ) -> Result<EnforcedStatement, ValidationFailure> {
        let limit = validate_limit(requested_limit, row_limit)?;
        let placeholders = placeholder_indices(sanitized);
        let highest = placeholders.iter().map(|(_, index)| *index).max().unwrap_or(0);
        if highest > params.len() {
            return Err(ValidationFailure::invalid_argument(format!(
                "statement references {highest} parameter(s) but {} were supplied",
                params.len()
            )));
        }

        let scoped = self.scope_predicate_bound(sanitized, &params, &placeholders);
        let bounded =
            trailing_limit_within(sanitized, &params, &placeholders, row_limit.ceiling);
        let next = params.len() + 1;
        let mut params = params;

        let (text, rewrite) = if scoped && bounded {
            (sanitized.to_string(), Rewrite::Unchanged)
        } else if scoped {
            params.push(SqlValue::Integer(i64::from(limit)));
            (
                format!("SELECT * FROM ({sanitized}) AS sub LIMIT ?{next}"),
                Rewrite::LimitAppended,
            )
        } else {
            params.push(SqlValue::Integer(self.tenant_id));
            params.push(SqlValue::Integer(i64::from(limit)));
            (
                format!(
                    "SELECT * FROM ({sanitized}) AS sub WHERE sub.{SCOPE_COLUMN} = ?{next} LIMIT ?{}",
                    next + 1
                ),
                Rewrite::ScopeAndLimitAppended,
            )
        };

        if rewrite != Rewrite::Unchanged {
            tracing::debug!(?rewrite, limit, "wrapped statement for scope/limit enforcement");
        }

        Ok(EnforcedStatement {
            statement: Statement::new(text, params),
            rewrite,
            limit,
        })
    }

    /// True when the text is a single select that names the scope column and
    /// every equality on it resolves to this tenant, either as a literal or a
    /// bound parameter.
    fn scope_predicate_bound(
        &self,
        text: &str,
        params: &[SqlValue],
        placeholders: &[(usize, usize)],
    ) -> bool {
        if !references_scope_column(text) || is_compound(text) {
            return false;
        }

        let mut comparisons = 0usize;
        for captures in SCOPE_EQUALITY.captures_iter(text) {
            let Some(operand) = captures.get(1) else {
                return false;
            };
            comparisons += 1;
            let bound = resolve_integer(operand, params, placeholders);
            if bound != Some(self.tenant_id) {
                return false;
            }
        }
        comparisons > 0
    }
}

fn resolve_integer(
    operand: regex::Match<'_>,
    params: &[SqlValue],
    placeholders: &[(usize, usize)],
) -> Option<i64> {
    if !operand.as_str().starts_with('?') {
        return operand.as_str().parse::<i64>().ok();
    }
    let (_, index) = placeholders
        .iter()
        .find(|(position, _)| *position == operand.start())?;
    match params.get(index.checked_sub(1)?)? {
        SqlValue::Integer(value) => Some(*value),
        _ => None,
    }
}

pub fn validate_limit(
    requested_limit: Option<i64>,
    row_limit: RowLimit,
) -> Result<u32, ValidationFailure> {
    let Some(requested) = requested_limit else {
        return Ok(row_limit.default);
    };
    match u32::try_from(requested) {
        Ok(limit) if (1..=row_limit.ceiling).contains(&limit) => Ok(limit),
        _ => Err(ValidationFailure::new(
            ViolationReason::LimitOutOfRange,
            format!("limit must be between 1 and {}", row_limit.ceiling),
        )
        .with_details(json!({ "requested": requested, "ceiling": row_limit.ceiling }))),
    }
}

#[must_use]
pub fn references_scope_column(text: &str) -> bool {
    words(text).any(|word| word.eq_ignore_ascii_case(SCOPE_COLUMN))
}

#[must_use]
pub fn is_compound(text: &str) -> bool {
    words(text).any(|word| {
        COMPOUND_OPERATORS
            .iter()
            .any(|operator| word.eq_ignore_ascii_case(operator))
    })
}

/// True only when a `LIMIT n`, `LIMIT n OFFSET m` or `LIMIT m, n` closes the
/// statement and its row count, literal or bound, lies in `[1, ceiling]`.
#[must_use]
pub fn trailing_limit_within(
    text: &str,
    params: &[SqlValue],
    placeholders: &[(usize, usize)],
    ceiling: u32,
) -> bool {
    let Some(captures) = TRAILING_LIMIT.captures(text.trim_end()) else {
        return false;
    };
    let count = if captures.get(2).is_some() {
        captures.get(3)
    } else {
        captures.get(1)
    };
    count
        .and_then(|operand| resolve_integer(operand, params, placeholders))
        .is_some_and(|rows| rows >= 1 && rows <= i64::from(ceiling))
}

/// Byte offset and resolved 1-based index of every `?` / `?NNN` placeholder,
/// numbered the way SQLite numbers them.
#[must_use]
pub fn placeholder_indices(text: &str) -> Vec<(usize, usize)> {
    let mut highest = 0usize;
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let index = match captures.get(1).map(|digits| digits.as_str()) {
                Some(digits) if !digits.is_empty() => digits.parse::<usize>().ok()?,
                _ => highest + 1,
            };
            highest = highest.max(index);
            Some((whole.start(), index))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TENANT: i64 = 2133;
    const RAW: RowLimit = RowLimit {
        default: 50,
        ceiling: 500,
    };

    fn enforcer() -> ScopeEnforcer {
        ScopeEnforcer::new(TENANT)
    }

    #[test]
    fn injects_scope_and_limit_for_unscoped_statement() {
        let enforced = enforcer()
            .enforce("SELECT id, title FROM items", Vec::new(), None, RAW)
            .expect("unscoped statement should be wrapped");

        assert_eq!(enforced.rewrite, Rewrite::ScopeAndLimitAppended);
        insta::assert_snapshot!(
            enforced.statement.text,
            @"SELECT * FROM (SELECT id, title FROM items) AS sub WHERE sub.organization_id = ?1 LIMIT ?2"
        );
        assert_eq!(
            enforced.statement.params,
            vec![SqlValue::Integer(TENANT), SqlValue::Integer(50)]
        );
    }

    #[test]
    fn scoped_statement_without_limit_gets_only_a_limit() {
        let enforced = enforcer()
            .enforce(
                "SELECT id FROM commits WHERE organization_id = ?",
                vec![SqlValue::Integer(TENANT)],
                Some(20),
                RAW,
            )
            .expect("scoped statement should be limited");

        assert_eq!(enforced.rewrite, Rewrite::LimitAppended);
        insta::assert_snapshot!(
            enforced.statement.text,
            @"SELECT * FROM (SELECT id FROM commits WHERE organization_id = ?) AS sub LIMIT ?2"
        );
        assert_eq!(
            enforced.statement.params,
            vec![SqlValue::Integer(TENANT), SqlValue::Integer(20)]
        );
    }

    #[test]
    fn scoped_and_bounded_statement_runs_as_is() {
        let text = "SELECT id FROM commits WHERE organization_id = ?1 ORDER BY id LIMIT 25";
        let enforced = enforcer()
            .enforce(text, vec![SqlValue::Integer(TENANT)], None, RAW)
            .expect("bounded scoped statement should pass");

        assert_eq!(enforced.rewrite, Rewrite::Unchanged);
        assert_eq!(enforced.statement.text, text);
        assert_eq!(enforced.statement.params, vec![SqlValue::Integer(TENANT)]);
    }

    #[test]
    fn bound_limit_within_ceiling_runs_as_is() {
        let text = "SELECT id FROM commits WHERE organization_id = ?1 ORDER BY id DESC LIMIT ?2 OFFSET ?3";
        let enforced = enforcer()
            .enforce(
                text,
                vec![
                    SqlValue::Integer(TENANT),
                    SqlValue::Integer(10),
                    SqlValue::Integer(20),
                ],
                Some(10),
                RAW,
            )
            .expect("bound limit should pass");
        assert_eq!(enforced.rewrite, Rewrite::Unchanged);

        let oversized = enforcer()
            .enforce(
                text,
                vec![
                    SqlValue::Integer(TENANT),
                    SqlValue::Integer(10_000),
                    SqlValue::Integer(0),
                ],
                None,
                RAW,
            )
            .expect("oversized bound limit should be wrapped");
        assert_eq!(oversized.rewrite, Rewrite::LimitAppended);
        assert!(oversized.statement.text.ends_with("LIMIT ?4"));
    }

    #[test]
    fn literal_tenant_predicate_counts_as_scoped() {
        let enforced = enforcer()
            .enforce(
                "SELECT id FROM commits WHERE organization_id = 2133 LIMIT 5",
                Vec::new(),
                None,
                RAW,
            )
            .expect("literal tenant predicate should pass");
        assert_eq!(enforced.rewrite, Rewrite::Unchanged);
    }

    #[test]
    fn foreign_tenant_predicate_is_wrapped_with_configured_tenant() {
        for (text, params) in [
            (
                "SELECT organization_id, id FROM commits WHERE organization_id = 999 LIMIT 5",
                Vec::new(),
            ),
            (
                "SELECT organization_id, id FROM commits WHERE organization_id = ?1",
                vec![SqlValue::Integer(999)],
            ),
            (
                "SELECT organization_id, id FROM commits WHERE organization_id = 2133 OR organization_id = 999",
                Vec::new(),
            ),
            ("SELECT organization_id, id FROM commits", Vec::new()),
        ] {
            let enforced = enforcer()
                .enforce(text, params, None, RAW)
                .expect("statement should be wrapped");
            assert_eq!(enforced.rewrite, Rewrite::ScopeAndLimitAppended, "{text}");
            assert!(
                enforced
                    .statement
                    .params
                    .contains(&SqlValue::Integer(TENANT))
            );
        }
    }

    #[test]
    fn compound_statements_always_get_the_outer_tenant_predicate() {
        for text in [
            "SELECT * FROM commits WHERE organization_id = 2133 UNION ALL SELECT * FROM commits LIMIT 50",
            "SELECT organization_id FROM commits WHERE organization_id = 2133 \
             INTERSECT SELECT organization_id FROM pull_requests LIMIT 5",
            "SELECT organization_id FROM commits WHERE organization_id = 2133 \
             except SELECT organization_id FROM pull_requests WHERE organization_id = 2133 LIMIT 5",
        ] {
            let enforced = enforcer()
                .enforce(text, Vec::new(), None, RAW)
                .expect("compound statement should be wrapped");
            assert_eq!(enforced.rewrite, Rewrite::ScopeAndLimitAppended, "{text}");
            assert!(
                enforced
                    .statement
                    .text
                    .ends_with("AS sub WHERE sub.organization_id = ?1 LIMIT ?2")
            );
            assert_eq!(
                enforced.statement.params,
                vec![SqlValue::Integer(TENANT), SqlValue::Integer(50)]
            );
        }
    }

    #[test]
    fn limits_above_ceiling_or_unresolvable_are_rewrapped() {
        let cases = [
            "SELECT id FROM commits WHERE organization_id = 2133 LIMIT 100000",
            "SELECT id FROM commits WHERE organization_id = 2133 LIMIT 5, 100000",
            "SELECT id FROM commits WHERE organization_id = 2133 LIMIT (SELECT 9999)",
            "SELECT id FROM commits WHERE id IN (SELECT id FROM commits LIMIT 3) AND organization_id = 2133",
        ];
        for text in cases {
            let enforced = enforcer()
                .enforce(text, Vec::new(), None, RAW)
                .expect("statement should be bounded");
            assert_eq!(enforced.rewrite, Rewrite::LimitAppended, "{text}");
            assert_eq!(enforced.statement.params, vec![SqlValue::Integer(50)]);
        }
    }

    #[test]
    fn appended_placeholders_follow_caller_parameters() {
        let enforced = enforcer()
            .enforce(
                "SELECT organization_id, id FROM commits WHERE branch = ? AND author_id = ?",
                vec![SqlValue::Text("main".to_string()), SqlValue::Integer(7)],
                Some(3),
                RAW,
            )
            .expect("statement should be wrapped");

        assert!(enforced.statement.text.ends_with("= ?3 LIMIT ?4"));
        assert_eq!(
            enforced.statement.params,
            vec![
                SqlValue::Text("main".to_string()),
                SqlValue::Integer(7),
                SqlValue::Integer(TENANT),
                SqlValue::Integer(3),
            ]
        );
    }

    #[test]
    fn rejects_limits_outside_range() {
        for requested in [0, -1, 501, i64::MAX] {
            let failure = enforcer()
                .enforce("SELECT 1", Vec::new(), Some(requested), RAW)
                .expect_err("limit should be rejected");
            assert_eq!(failure.reason, ViolationReason::LimitOutOfRange);
            assert_eq!(failure.message, "limit must be between 1 and 500");
        }
    }

    #[test]
    fn rejects_placeholders_without_parameters() {
        let failure = enforcer()
            .enforce("SELECT id FROM commits WHERE id = ?2", vec![SqlValue::Integer(1)], None, RAW)
            .expect_err("missing parameters should be rejected");
        assert_eq!(failure.reason, ViolationReason::InvalidArgument);
    }

    #[test]
    fn placeholder_numbering_matches_sqlite_rules() {
        assert_eq!(
            placeholder_indices("a = ? AND b = ?5 AND c = ?"),
            vec![(4, 1), (14, 5), (25, 6)]
        );
    }

    #[test]
    fn every_enforced_statement_is_scoped_and_bounded() {
        let texts = [
            "SELECT id FROM items",
            "SELECT id FROM commits WHERE organization_id = 2133",
            "SELECT id FROM commits WHERE organization_id = 2133 LIMIT 7",
            "WITH a AS (SELECT organization_id FROM commits) SELECT * FROM a",
        ];
        for text in texts {
            let enforced = enforcer()
                .enforce(text, Vec::new(), Some(40), RAW)
                .expect("statement should be enforced");
            let final_text = &enforced.statement.text;
            assert!(references_scope_column(final_text));
            assert!(trailing_limit_within(
                final_text,
                &enforced.statement.params,
                &placeholder_indices(final_text),
                RAW.ceiling
            ));
            assert!(enforced.limit <= RAW.ceiling);
        }
    }
}
