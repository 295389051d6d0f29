//! Natural-language period phrases resolved to concrete UTC windows.
//!
//! Resolution never fails: empty or unrecognized phrases fall back to the
//! trailing [`DEFAULT_TRAILING_DAYS`]-day window ending now.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use time::macros::time;
use time::{Duration, OffsetDateTime, Time, UtcOffset};

use crate::utils::time::{format_utc_millis, now_utc};

pub const DEFAULT_TRAILING_DAYS: i64 = 30;

static FIRST_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("first-integer pattern must compile"));

/// Half-open `[start, end)` interval in UTC.
///
/// `last month` is the one form whose `end` is an inclusive `23:59:59`
/// boundary rather than the next midnight; `end_inclusive` marks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub end_inclusive: bool,
}

impl TimeWindow {
    #[must_use]
    pub const fn half_open(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self {
            start,
            end,
            end_inclusive: false,
        }
    }

    #[must_use]
    pub const fn closed(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self {
            start,
            end,
            end_inclusive: true,
        }
    }

    /// SQL range test on `column`, with the bounds bound to `?{first_param}`
    /// and the placeholder after it.
    #[must_use]
    pub fn range_predicate(&self, column: &str, first_param: usize) -> String {
        let upper = if self.end_inclusive { "<=" } else { "<" };
        format!(
            "{column} >= ?{first_param} AND {column} {upper} ?{}",
            first_param + 1
        )
    }

    #[must_use]
    pub fn start_utc(&self) -> String {
        format_utc_millis(self.start)
    }

    #[must_use]
    pub fn end_utc(&self) -> String {
        format_utc_millis(self.end)
    }

    #[must_use]
    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    #[must_use]
    pub fn describe(&self, period: &str) -> PeriodSummary {
        PeriodSummary {
            period: period.to_string(),
            start: self.start_utc(),
            end: self.end_utc(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodSummary {
    pub period: String,
    pub start: String,
    pub end: String,
}

#[must_use]
pub fn resolve_period(period: &str) -> TimeWindow {
    resolve_period_at(period, now_utc())
}

#[must_use]
pub fn resolve_period_at(period: &str, now: OffsetDateTime) -> TimeWindow {
    let now = now.to_offset(UtcOffset::UTC);
    let today = now.replace_time(Time::MIDNIGHT);
    let phrase = period.trim().to_ascii_lowercase();

    if phrase.contains("last") && phrase.contains("day") {
        let days = FIRST_INTEGER
            .find(&phrase)
            .and_then(|digits| digits.as_str().parse::<i64>().ok())
            .unwrap_or(DEFAULT_TRAILING_DAYS);
        return trailing_days(now, days);
    }

    if phrase.contains("this week") {
        return TimeWindow::half_open(start_of_week(today), now);
    }

    if phrase.contains("last week") {
        let start = start_of_week(today) - Duration::days(7);
        return TimeWindow::half_open(start, start + Duration::days(7));
    }

    if phrase.contains("this month") {
        return TimeWindow::half_open(start_of_month(today), now);
    }

    if phrase.contains("last month") {
        let last_day_of_previous = start_of_month(today) - Duration::days(1);
        return TimeWindow::closed(
            start_of_month(last_day_of_previous),
            last_day_of_previous.replace_time(time!(23:59:59)),
        );
    }

    match phrase.as_str() {
        "today" => TimeWindow::half_open(today, now),
        "yesterday" => TimeWindow::half_open(today - Duration::days(1), today),
        _ => trailing_days(now, DEFAULT_TRAILING_DAYS),
    }
}

fn trailing_days(now: OffsetDateTime, days: i64) -> TimeWindow {
    let start = days
        .checked_mul(86_400)
        .map(Duration::seconds)
        .and_then(|span| now.checked_sub(span))
        .unwrap_or_else(|| now - Duration::days(DEFAULT_TRAILING_DAYS));
    TimeWindow::half_open(start, now)
}

fn start_of_week(midnight: OffsetDateTime) -> OffsetDateTime {
    let days_since_monday = i64::from(midnight.weekday().number_days_from_monday());
    midnight - Duration::days(days_since_monday)
}

fn start_of_month(midnight: OffsetDateTime) -> OffsetDateTime {
    let days_into_month = i64::from(midnight.day()) - 1;
    midnight.replace_time(Time::MIDNIGHT) - Duration::days(days_into_month)
}
