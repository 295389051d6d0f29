//! Read-only statement guard.
//!
//! A conservative, pattern-based classifier: it never parses SQL, and any
//! construct it cannot prove harmless is rejected rather than repaired. Each
//! rule is a separate function so it can be exercised on its own.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

use crate::models::{ValidationFailure, ViolationReason};

pub const READ_STARTING_KEYWORDS: &[&str] = &["select", "with"];

/// Write/DDL verbs plus the SQLite statements that mutate a database file or
/// reconfigure the connection.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "create", "truncate", "grant", "revoke", "merge",
    "call", "replace", "attach", "detach", "pragma", "vacuum", "reindex", "analyze", "begin",
    "commit", "rollback",
];

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)--[^\n]*").expect("line comment pattern must compile"));
static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern must compile"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedStatement {
    pub text: String,
    pub comments: Vec<String>,
}

/// Classifies `raw_sql`; on success returns the text that must be executed in
/// place of the submitted text.
pub fn check_read_only(raw_sql: &str) -> Result<String, ValidationFailure> {
    reject_empty(raw_sql)?;

    let stripped = strip_comments(raw_sql);
    reject_comment_injection(&stripped)?;

    let candidate = strip_trailing_terminators(&stripped.text);
    if candidate.is_empty() {
        return Err(guard_violation(
            ViolationReason::EmptyStatement,
            "SQL cannot be empty after removing comments.",
            json!({}),
        ));
    }

    reject_multi_statement(candidate)?;

    let lowered = candidate.to_ascii_lowercase();
    require_read_start(&lowered)?;
    reject_forbidden_keywords(&lowered)?;

    Ok(normalize_whitespace(candidate))
}

pub fn reject_empty(raw_sql: &str) -> Result<(), ValidationFailure> {
    if raw_sql.trim().is_empty() || raw_sql.contains('\0') {
        return Err(guard_violation(
            ViolationReason::EmptyStatement,
            "SQL must be a non-empty string.",
            json!({}),
        ));
    }
    Ok(())
}

#[must_use]
pub fn strip_comments(raw_sql: &str) -> StrippedStatement {
    let mut comments = Vec::new();

    let without_line = LINE_COMMENT.replace_all(raw_sql, |captures: &regex::Captures<'_>| {
        comments.push(captures[0].to_string());
        " ".to_string()
    });
    let without_block = BLOCK_COMMENT.replace_all(&without_line, |captures: &regex::Captures<'_>| {
        comments.push(captures[0].to_string());
        " ".to_string()
    });

    StrippedStatement {
        text: without_block.trim().to_string(),
        comments,
    }
}

/// Comments that smuggle a separator or a write verb are refused, as are
/// unbalanced block-comment markers left behind after stripping.
pub fn reject_comment_injection(stripped: &StrippedStatement) -> Result<(), ValidationFailure> {
    if stripped.text.contains("/*") || stripped.text.contains("*/") {
        return Err(guard_violation(
            ViolationReason::CommentInjection,
            "Unterminated block comments are not allowed.",
            json!({}),
        ));
    }

    for comment in &stripped.comments {
        let lowered = comment.to_ascii_lowercase();
        let hidden_keyword = first_forbidden_keyword(&lowered);
        if lowered.contains(';') || hidden_keyword.is_some() {
            return Err(guard_violation(
                ViolationReason::CommentInjection,
                "Comments may not contain statement separators or write keywords.",
                json!({ "detected_keyword": hidden_keyword }),
            ));
        }
    }
    Ok(())
}

#[must_use]
pub fn strip_trailing_terminators(sql: &str) -> &str {
    sql.trim_end_matches(|ch: char| ch == ';' || ch.is_whitespace())
        .trim_start()
}

pub fn reject_multi_statement(candidate: &str) -> Result<(), ValidationFailure> {
    if candidate.contains(';') {
        return Err(guard_violation(
            ViolationReason::MultiStatement,
            "Only single read-only statements are permitted.",
            json!({}),
        ));
    }
    Ok(())
}

pub fn require_read_start(lowered: &str) -> Result<(), ValidationFailure> {
    let leading = leading_keyword(lowered);
    if !READ_STARTING_KEYWORDS.contains(&leading.as_str()) {
        return Err(guard_violation(
            ViolationReason::UnsupportedStatement,
            "Only SELECT/CTE read queries are allowed.",
            json!({ "leading_keyword": leading }),
        ));
    }
    Ok(())
}

pub fn reject_forbidden_keywords(lowered: &str) -> Result<(), ValidationFailure> {
    if let Some(keyword) = first_forbidden_keyword(lowered) {
        return Err(guard_violation(
            ViolationReason::ForbiddenKeyword,
            format!("Keyword '{keyword}' is not permitted in read-only mode."),
            json!({ "detected_keyword": keyword }),
        ));
    }
    Ok(())
}

#[must_use]
pub fn first_forbidden_keyword(lowered: &str) -> Option<&'static str> {
    words(lowered).find_map(|token| {
        FORBIDDEN_KEYWORDS
            .iter()
            .copied()
            .find(|keyword| *keyword == token)
    })
}

/// First word after any leading grouping parentheses.
#[must_use]
pub fn leading_keyword(lowered: &str) -> String {
    let unwrapped = lowered.trim_start_matches(|ch: char| ch == '(' || ch.is_whitespace());
    let first = unwrapped
        .split(|ch: char| !is_word_char(ch))
        .next()
        .unwrap_or_default();
    if first.is_empty() {
        "unknown".to_string()
    } else {
        first.to_string()
    }
}

#[must_use]
pub fn normalize_whitespace(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whole-word view of `sql`, so `created_on` never matches `create`.
pub fn words(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(|ch: char| !is_word_char(ch))
        .filter(|token| !token.is_empty())
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn guard_violation(
    reason: ViolationReason,
    message: impl Into<String>,
    details: Value,
) -> ValidationFailure {
    let mut payload = json!({
        "guardrail": "read_only_single_statement",
        "allowed_forms": ["SELECT ...", "WITH ... SELECT ..."],
    });
    if let (Some(target), Value::Object(extra)) = (payload.as_object_mut(), details) {
        target.extend(extra);
    }
    ValidationFailure::new(reason, message).with_details(payload)
}
