//! Helpers shared by the per-source normalizers.
//!
//! Each provider module owns the conversion of its raw record into a
//! [`WorkItem`]; this module holds the rules that must behave identically
//! for every source: assignee rendering, UTC timestamps, relative ages,
//! reference strings and due dates.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Url;

use crate::error::{Error, Result};
use crate::model::work_item::WorkItem;
use crate::providers::RawRecord;

/// Label replacing the requesting user's own handle.
pub const ME: &str = "Me";

/// Convert one raw record into a work item.
pub fn normalize(raw: &RawRecord, me: &str, now: DateTime<Utc>) -> Result<WorkItem> {
    let mut item = match raw {
        RawRecord::GitHub(issue) => crate::providers::github::normalize(issue, me)?,
        RawRecord::GitLab(record) => crate::providers::gitlab::normalize(record, me)?,
        RawRecord::Planner(task) => crate::providers::planner::normalize(task, me)?,
        RawRecord::Malformed { record, reason } => {
            return Err(Error::malformed(record.as_str(), reason.as_str()))
        }
    };
    item.updated_at_display = time_ago(now, item.updated_at);
    Ok(item)
}

/// Render the assignee list with the requesting user first as `Me`.
///
/// Returns an empty string when nobody but the requesting user is assigned.
pub fn resolve_assignees<I, S>(assignees: I, me: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut others: Vec<String> = Vec::new();
    for name in assignees.into_iter().map(Into::into) {
        if name == me || name.is_empty() || others.contains(&name) {
            continue;
        }
        others.push(name);
    }
    if others.is_empty() {
        return String::new();
    }
    std::iter::once(ME.to_string())
        .chain(others)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse an ISO 8601 timestamp into UTC. Timestamps without an offset are
/// taken as UTC already.
pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("unrecognized timestamp format: {raw:?}"))
}

/// [`parse_timestamp`] with the failure attributed to a record.
pub fn record_timestamp(record: &str, raw: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(raw).map_err(|reason| Error::malformed(record, reason))
}

/// Normalize a due date or due timestamp to `YYYY-MM-DD`. Absent stays empty.
pub fn due_date(record: &str, raw: Option<&str>) -> Result<String> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(String::new()),
        Some(raw) => raw,
    };
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.format("%Y-%m-%d").to_string());
    }
    let dt = record_timestamp(record, raw)?;
    Ok(dt.format("%Y-%m-%d").to_string())
}

/// Human readable age of `then` relative to `now`, using the first matching
/// unit of years, months, weeks, days, hours and minutes.
pub fn time_ago(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(then);
    let days = diff.num_days();
    let seconds = diff.num_seconds();

    let (count, unit) = if days >= 365 {
        (days / 365, "year")
    } else if days >= 30 {
        (days / 30, "month")
    } else if days >= 7 {
        (days / 7, "week")
    } else if days >= 1 {
        (days, "day")
    } else if seconds >= 3600 {
        (seconds / 3600, "hour")
    } else if seconds >= 60 {
        (seconds / 60, "minute")
    } else {
        return "Just now".to_string();
    };

    let plural = if count > 1 { "s" } else { "" };
    format!("{count} {unit}{plural} ago")
}

/// Build `owner/repo#42` from a web URL by replacing the path markers.
pub fn url_to_ref(url: &str, markers: &[&str]) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };
    let mut reference = path.trim_matches('/').to_string();
    for marker in markers {
        reference = reference.replace(marker, "#");
    }
    reference
}
