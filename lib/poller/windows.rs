use chrono::{Duration, NaiveDateTime};

use super::error::Error;

/// Upstream timestamps are fixed-width sortable strings; the first 14
/// characters are `YYYYMMDDHHMMSS`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
pub const TIMESTAMP_WIDTH: usize = 14;

/// Recency windows and limits applied by each cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Windows {
    /// Calls and comments are collected for events created within this window.
    pub calls: Duration,
    /// Arrived-unit counts use a longer window so late arrivals still land.
    pub counts: Duration,
    /// Open calls older than this are retired from the master set.
    pub retention: Duration,
    /// Upper bound on the assembled comment string, in characters.
    pub comment_max_chars: usize,
}

impl Default for Windows {
    fn default() -> Self {
        Self {
            calls: Duration::minutes(8),
            counts: Duration::minutes(20),
            retention: Duration::hours(2),
            comment_max_chars: 4000,
        }
    }
}

/// Formats `now - window` as a 14-digit timestamp string, truncated to the
/// whole second.
pub fn cutoff(now: NaiveDateTime, window: Duration, name: &'static str) -> Result<String, Error> {
    now.checked_sub_signed(window)
        .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
        .ok_or(Error::ClockRange { window: name })
}

/// Quotes a value as a SQL string literal.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
