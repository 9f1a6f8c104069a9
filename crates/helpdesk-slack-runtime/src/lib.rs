//! Slack transport for the IT helpdesk responder.
//!
//! Hosts the Socket Mode bridge that feeds channel events to the response
//! dispatcher, and the weekly report job that reads channel history.

mod slack_helpers;
mod slack_runtime;
mod weekly_report;

pub use slack_runtime::{run_slack_bridge, SlackBridgeRuntimeConfig};
pub use weekly_report::{run_weekly_report, WeeklyReportConfig, WeeklyReportOutcome};
