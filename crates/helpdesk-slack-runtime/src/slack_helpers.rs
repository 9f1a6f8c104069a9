//! Retry policy and payload clipping for Slack Web API calls.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

/// Slack rejects `chat.postMessage` text beyond 40k characters.
pub(crate) const SLACK_MAX_TEXT_CHARS: usize = 39_000;
const SLACK_TRUNCATION_NOTE: &str = "\n_(message truncated)_";
const ERROR_BODY_MAX_CHARS: usize = 800;
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlackRetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
}

impl SlackRetryPolicy {
    pub(crate) fn new(max_attempts: usize, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(base_delay_ms.max(1)),
        }
    }

    /// `attempt` is 1-based: the request that just failed.
    pub(crate) fn allows_retry_after(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }

    /// Slack's `Retry-After` wins over the exponential schedule when present.
    pub(crate) fn delay(&self, attempt: usize, retry_after: Option<Duration>) -> Duration {
        if let Some(retry_after) = retry_after {
            return retry_after;
        }
        let doublings = (attempt.saturating_sub(1) as u32).min(MAX_BACKOFF_DOUBLINGS);
        self.base_delay.saturating_mul(1 << doublings)
    }
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(seconds))
}

pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

pub(crate) fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Caps `text` at the Slack message limit, appending a visible note when cut.
pub(crate) fn clip_for_slack(text: &str) -> String {
    clip_chars(text, SLACK_MAX_TEXT_CHARS, SLACK_TRUNCATION_NOTE)
}

pub(crate) fn clip_error_body(body: &str) -> String {
    clip_chars(body, ERROR_BODY_MAX_CHARS, "...")
}

fn clip_chars(value: &str, max_chars: usize, suffix: &str) -> String {
    match value.char_indices().nth(max_chars) {
        None => value.to_string(),
        Some((cut, _)) => format!("{}{suffix}", &value[..cut]),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
    use reqwest::StatusCode;

    use super::{
        clip_chars, clip_for_slack, is_retryable_status, retry_after, SlackRetryPolicy,
        SLACK_MAX_TEXT_CHARS,
    };

    #[test]
    fn unit_retry_after_reads_delta_seconds_only() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static(" 15 "));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(15)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), None);
        assert_eq!(retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn unit_retry_policy_doubles_from_base_and_honors_retry_after() {
        let policy = SlackRetryPolicy::new(3, 100);
        assert_eq!(policy.delay(1, None), Duration::from_millis(100));
        assert_eq!(policy.delay(3, None), Duration::from_millis(400));
        assert_eq!(
            policy.delay(2, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert!(policy.allows_retry_after(2));
        assert!(!policy.allows_retry_after(3));
    }

    #[test]
    fn regression_retry_policy_clamps_zero_settings() {
        let policy = SlackRetryPolicy::new(0, 0);
        assert_eq!(policy.delay(1, None), Duration::from_millis(1));
        assert!(!policy.allows_retry_after(1));
    }

    #[test]
    fn unit_retryable_statuses_are_rate_limits_and_server_errors() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn regression_clip_counts_characters_not_bytes() {
        assert_eq!(clip_chars("vpn🔴down", 20, "..."), "vpn🔴down");
        assert_eq!(clip_chars("vpn🔴down", 4, "..."), "vpn🔴...");
        assert_eq!(clip_chars("vpn", 0, "..."), "...");
    }

    #[test]
    fn functional_long_replies_are_clipped_with_note() {
        let long = "a".repeat(SLACK_MAX_TEXT_CHARS + 10);
        let clipped = clip_for_slack(&long);
        assert!(clipped.ends_with("_(message truncated)_"));
        assert_eq!(clip_for_slack("short"), "short");
    }
}
