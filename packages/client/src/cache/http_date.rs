//! HTTP date parsing and formatting
//!
//! Accepts the three HTTP-date forms of RFC 7231 §7.1.1.1 and always
//! produces IMF-fixdate.

use std::time::{Duration, SystemTime};

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// HTTP date parsing error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpDateParseError {
    /// Date format was not recognized by any of the supported parsers
    #[error("Unrecognized HTTP date format: {0}")]
    UnrecognizedFormat(String),
    /// Date was parsed but represents a time before Unix epoch
    #[error("Invalid timestamp in HTTP date: {0}")]
    InvalidTimestamp(String),
}

/// HTTP date parsing utilities
pub mod httpdate {
    use super::*;

    const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

    /// Parse HTTP date string into `SystemTime`
    pub fn parse_http_date(date_str: &str) -> Result<SystemTime, HttpDateParseError> {
        let date_str = date_str.trim();

        // IMF-fixdate: "Sun, 06 Nov 1994 08:49:37 GMT"
        let parsed = NaiveDateTime::parse_from_str(date_str, IMF_FIXDATE)
            // RFC 850: "Sunday, 06-Nov-94 08:49:37 GMT"
            .or_else(|_| NaiveDateTime::parse_from_str(date_str, "%A, %d-%b-%y %H:%M:%S GMT"))
            // asctime: "Sun Nov  6 08:49:37 1994"
            .or_else(|_| NaiveDateTime::parse_from_str(date_str, "%a %b %e %H:%M:%S %Y"))
            .map(|naive| naive.and_utc().timestamp())
            .or_else(|_| DateTime::parse_from_rfc2822(date_str).map(|dt| dt.timestamp()));

        match parsed {
            Ok(timestamp) => u64::try_from(timestamp)
                .map(|secs| SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
                .map_err(|_| HttpDateParseError::InvalidTimestamp(date_str.to_string())),
            Err(_) => Err(HttpDateParseError::UnrecognizedFormat(date_str.to_string())),
        }
    }

    /// Format `SystemTime` as an IMF-fixdate string
    #[must_use]
    pub fn fmt_http_date(time: SystemTime) -> String {
        let secs = time
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let dt = i64::try_from(secs)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_default();

        dt.format(IMF_FIXDATE).to_string()
    }
}
