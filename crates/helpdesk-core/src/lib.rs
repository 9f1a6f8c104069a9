//! Small shared utilities: atomic report writes and Slack timestamp helpers.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp_ms, format_slack_ts, parse_slack_ts_seconds};
