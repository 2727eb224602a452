//! `Retry-After` header parsing: integer-seconds and RFC-1123-date forms.
//!
//! Generalizes the integer-only parser in [`crate::backend::ollama`] (which
//! is sufficient for Ollama, which never sends this header) to also accept
//! the HTTP-date form real services send, matching
//! `parse_retry_after` in the original Python implementation.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Parse a `Retry-After` header value into a wait duration.
///
/// Accepts integer seconds (`"120"`) or an RFC-1123 date
/// (`"Wed, 21 Oct 2015 07:28:00 GMT"`). A date in the past yields a
/// zero-second (minimum) wait rather than a negative one. Returns `None`
/// if the value is neither form.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let trimmed = value.trim();

    if let Ok(secs) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    if let Ok(date) = DateTime::parse_from_rfc2822(trimmed) {
        let now = Utc::now();
        let delta = date.with_timezone(&Utc) - now;
        let secs = delta.num_seconds().max(0) as u64;
        return Some(Duration::from_secs(secs));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_seconds() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 2 "), Some(Duration::from_secs(2)));
    }

    #[test]
    fn parses_rfc1123_date_in_the_future_roughly() {
        let future = Utc::now() + chrono::Duration::seconds(30);
        let header = future.to_rfc2822();
        let parsed = parse_retry_after(&header).expect("should parse");
        // allow test execution jitter
        assert!(parsed.as_secs() <= 31);
    }

    #[test]
    fn date_in_the_past_yields_zero_minimum() {
        let past = Utc::now() - chrono::Duration::days(1);
        let header = past.to_rfc2822();
        assert_eq!(parse_retry_after(&header), Some(Duration::from_secs(0)));
    }

    #[test]
    fn unparseable_value_returns_none() {
        assert_eq!(parse_retry_after("not-a-duration"), None);
        assert_eq!(parse_retry_after(""), None);
    }
}
