//! Weekly usage metrics for the helpdesk channel.
//!
//! `aggregator` reduces channel history into a [`WeeklyMetrics`] value,
//! `report` renders it deterministically and `publisher` persists the
//! rendered report.

pub mod aggregator;
pub mod publisher;
pub mod report;

pub use aggregator::{analyze, CategoryCount, MetricsConfig, WeeklyMetrics};
pub use publisher::{GitReportPublisher, GitReportPublisherConfig, PublishedReport, ReportPublisher};
pub use report::{render_weekly_report_markdown, render_weekly_summary, report_filename};
