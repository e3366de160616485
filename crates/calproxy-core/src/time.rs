//! ISO-8601 timestamp parsing for request payloads.
//!
//! Clients send RFC 3339 timestamps (`2024-01-01T10:00:00Z`,
//! `2024-01-01T12:00:00+02:00`) or naive local timestamps
//! (`2024-01-01T10:00:00`). Naive values are interpreted as UTC, which is the
//! timezone events are created in.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// A timestamp that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid datetime format: {input:?} (expected ISO-8601, e.g. 2024-01-01T10:00:00Z)")]
pub struct TimeParseError {
    /// The rejected input.
    pub input: String,
}

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Parses an ISO-8601 timestamp into UTC.
pub fn parse_iso8601(input: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TimeParseError {
            input: input.to_string(),
        })
}
