use anyhow::{Result, bail};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

/// Fixed-width UTC rendering (`YYYY-MM-DDTHH:MM:SS.mmmZ`).
///
/// Every timestamp the gateway stores, binds or returns uses this form, so a
/// lexical comparison in the datastore agrees with chronological order.
#[must_use]
pub fn format_utc_millis(value: OffsetDateTime) -> String {
    let dt = value.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        dt.year(),
        u8::from(dt.month()),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        dt.millisecond()
    )
}

/// Second-precision UTC rendering used for audit log lines.
#[must_use]
pub fn format_utc_seconds(value: OffsetDateTime) -> String {
    let dt = value.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        dt.year(),
        u8::from(dt.month()),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}

/// Parses an RFC 3339 timestamp and re-renders it in the fixed-width form.
pub fn normalize_utc_millis(raw: &str) -> Result<String> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        bail!("timestamp input is empty");
    }
    match OffsetDateTime::parse(candidate, &Rfc3339) {
        Ok(parsed) => Ok(format_utc_millis(parsed)),
        Err(_) => bail!("unsupported timestamp format: {candidate}"),
    }
}

#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
