//! Backoff policy for transient completion failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};

const BASE_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF_SHIFT: usize = 5;

static COMPLETION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Rate limits, request timeouts and server errors are worth another attempt.
pub(crate) fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}

pub(crate) fn is_transient_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Reads `Retry-After` as delta-seconds or an HTTP date relative to `now`.
pub(crate) fn retry_after_hint(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let wait_ms = retry_at.signed_duration_since(now).num_milliseconds().max(0);
    Some(Duration::from_millis(u64::try_from(wait_ms).unwrap_or_default()))
}

/// Exponential backoff from the attempt index, never shorter than the server hint.
pub(crate) fn completion_backoff(attempt: usize, hint: Option<Duration>) -> Duration {
    let exponential = Duration::from_millis(BASE_BACKOFF_MS << attempt.min(MAX_BACKOFF_SHIFT));
    hint.map_or(exponential, |hint| hint.max(exponential))
}

pub(crate) fn completion_request_id() -> String {
    let sequence = COMPLETION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("helpdesk-{}-{sequence}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    use super::{completion_backoff, completion_request_id, is_transient_status, retry_after_hint};

    #[test]
    fn unit_transient_statuses_cover_rate_limits_and_server_errors() {
        for status in [408, 429, 500, 503] {
            assert!(is_transient_status(status), "{status}");
        }
        for status in [400, 401, 404, 422] {
            assert!(!is_transient_status(status), "{status}");
        }
    }

    #[test]
    fn unit_backoff_doubles_and_caps() {
        assert_eq!(completion_backoff(0, None), Duration::from_millis(250));
        assert_eq!(completion_backoff(2, None), Duration::from_millis(1_000));
        assert_eq!(completion_backoff(40, None), Duration::from_millis(8_000));
    }

    #[test]
    fn regression_backoff_never_undercuts_retry_after() {
        assert_eq!(
            completion_backoff(0, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            completion_backoff(3, Some(Duration::from_millis(10))),
            Duration::from_millis(2_000)
        );
    }

    #[test]
    fn unit_retry_after_hint_reads_seconds_and_http_dates() {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 8, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(retry_after_hint(&headers, now), Some(Duration::from_secs(3)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Fri, 08 Mar 2024 12:00:05 GMT"),
        );
        assert_eq!(retry_after_hint(&headers, now), Some(Duration::from_secs(5)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("later"));
        assert_eq!(retry_after_hint(&headers, now), None);
        assert_eq!(retry_after_hint(&HeaderMap::new(), now), None);
    }

    #[test]
    fn unit_request_ids_are_unique() {
        assert_ne!(completion_request_id(), completion_request_id());
    }
}
