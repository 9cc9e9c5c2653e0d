//! HTTP-date parsing and formatting.
//!
//! RFC 2616 §3.3.1 requires accepting three date formats: RFC 1123
//! (`Sun, 06 Nov 1994 08:49:37 GMT`), RFC 850
//! (`Sunday, 06-Nov-94 08:49:37 GMT`) and ANSI C `asctime()`
//! (`Sun Nov  6 08:49:37 1994`). Only RFC 1123 is ever emitted.

use chrono::{DateTime, NaiveDateTime, Utc};

const RFC1123: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

/// Parses an HTTP-date in any of the three accepted formats.
///
/// Returns `None` for malformed values; callers treat a missing date and an
/// unparseable one identically.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    for format in [RFC1123, RFC850, ASCTIME] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }
    None
}

/// Formats a timestamp as an RFC 1123 HTTP-date.
pub fn format_http_date(date: DateTime<Utc>) -> String {
    date.format(RFC1123).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap()
    }

    #[test]
    fn parses_rfc1123() {
        assert_eq!(
            parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"),
            Some(reference())
        );
    }

    #[test]
    fn parses_rfc850() {
        assert_eq!(
            parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT"),
            Some(reference())
        );
    }

    #[test]
    fn parses_asctime() {
        assert_eq!(parse_http_date("Sun Nov  6 08:49:37 1994"), Some(reference()));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_http_date("not a date"), None);
        assert_eq!(parse_http_date(""), None);
    }

    #[test]
    fn formats_rfc1123() {
        assert_eq!(
            format_http_date(reference()),
            "Sun, 06 Nov 1994 08:49:37 GMT"
        );
    }

    #[test]
    fn round_trips() {
        let formatted = format_http_date(reference());
        assert_eq!(parse_http_date(&formatted), Some(reference()));
    }
}
