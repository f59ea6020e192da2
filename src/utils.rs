//! Utility functions for string handling, timestamps and URL identity.
//!
//! This module provides helper functions used throughout the service:
//! - String truncation and capitalisation for logging and display
//! - JSON helpers for handling loosely formatted LLM responses
//! - Publication-date parsing and "time ago" rendering
//! - URL normalisation used as article identity for deduplication

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes (backing off to the
/// nearest character boundary) with an ellipsis and byte count indicator
/// appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When an LLM response is cut off (e.g., due to token limits), the
/// resulting JSON will fail to parse with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static JSON_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*?\]").unwrap());

/// Pull the outermost `{...}` block out of a chat completion.
///
/// Models sometimes wrap JSON in markdown fences or a sentence of preamble.
pub fn extract_json_object(content: &str) -> &str {
    JSON_OBJECT
        .find(content)
        .map(|m| m.as_str())
        .unwrap_or(content)
}

/// Pull the first `[...]` block out of a chat completion.
pub fn extract_json_array(content: &str) -> Option<&str> {
    JSON_ARRAY.find(content).map(|m| m.as_str())
}

/// Capitalize the first character of a string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(upcase("hello"), "Hello");
/// assert_eq!(upcase(""), "");
/// ```
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

/// Capitalize every whitespace-separated word.
pub fn title_case(s: &str) -> String {
    s.split_whitespace().map(upcase).collect::<Vec<_>>().join(" ")
}

/// Parse the assorted date formats providers report.
///
/// Accepts RFC 3339 (`2025-05-06T14:30:00Z`), naive ISO timestamps
/// (`2025-05-06T14:30:00`, assumed UTC) and bare dates (`2025-05-06`).
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Render a publication time relative to `now`.
///
/// # Returns
///
/// `"Just now"`, `"N minutes ago"`, `"N hours ago"`, `"N days ago"`, a
/// calendar date beyond thirty days, or `"Recently"` when the time is unknown.
pub fn time_ago(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(published) = published else {
        return "Recently".to_string();
    };
    let delta = now.signed_duration_since(published);
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };

    if delta.num_minutes() < 1 {
        "Just now".to_string()
    } else if delta.num_hours() < 1 {
        plural(delta.num_minutes(), "minute")
    } else if delta.num_days() < 1 {
        plural(delta.num_hours(), "hour")
    } else if delta.num_days() <= 30 {
        plural(delta.num_days(), "day")
    } else {
        published.format("%b %-d, %Y").to_string()
    }
}

/// Canonical form of an article URL, used as its identity.
///
/// Lower-cases the host (and strips `www.`), drops the fragment and any
/// `utm_*` tracking parameters, and trims a trailing `/` from non-root
/// paths. Unparseable input is returned trimmed but otherwise untouched.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        return raw.trim().to_string();
    };
    url.set_fragment(None);

    if let Some(host) = url.host_str() {
        let host = host.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
        let _ = url.set_host(Some(&host));
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }
    url.to_string()
}
