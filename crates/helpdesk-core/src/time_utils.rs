use chrono::{DateTime, Utc};

pub fn current_unix_timestamp_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Parses the seconds part of a Slack message timestamp (`"1700000000.000200"`).
pub fn parse_slack_ts_seconds(ts: &str) -> Option<i64> {
    let seconds = ts.trim().split('.').next()?;
    seconds.parse::<i64>().ok()
}

/// Renders a UTC instant as a Slack `oldest`/`latest` query value.
pub fn format_slack_ts(instant: DateTime<Utc>) -> String {
    format!(
        "{}.{:06}",
        instant.timestamp(),
        instant.timestamp_subsec_micros()
    )
}
