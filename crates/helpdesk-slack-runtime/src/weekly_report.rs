//! Weekly report job: channel history in, published report and summary out.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use helpdesk_core::format_slack_ts;
use helpdesk_metrics::{
    analyze, render_weekly_report_markdown, render_weekly_summary, report_filename,
    MetricsConfig, PublishedReport, ReportPublisher, WeeklyMetrics,
};
use helpdesk_triage::ThreadMessage;

use crate::slack_runtime::SlackApiClient;

#[derive(Debug, Clone)]
pub struct WeeklyReportConfig {
    pub api_base: String,
    pub bot_token: String,
    pub channel_id: String,
    pub window_days: u32,
    /// Upper bound on top-level messages read from history.
    pub history_limit: usize,
    pub metrics: MetricsConfig,
    pub post_summary: bool,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct WeeklyReportOutcome {
    pub metrics: WeeklyMetrics,
    pub filename: String,
    pub published: Option<PublishedReport>,
    pub summary_posted: bool,
}

/// Generates, publishes and announces the report for the window ending now.
///
/// A history fetch failure aborts the job; a publish failure does not, but
/// suppresses the Slack summary.
pub async fn run_weekly_report(
    config: &WeeklyReportConfig,
    publisher: &dyn ReportPublisher,
) -> Result<WeeklyReportOutcome> {
    run_weekly_report_at(config, publisher, Utc::now()).await
}

pub(crate) async fn run_weekly_report_at(
    config: &WeeklyReportConfig,
    publisher: &dyn ReportPublisher,
    now: DateTime<Utc>,
) -> Result<WeeklyReportOutcome> {
    let slack = SlackApiClient::new(
        config.api_base.clone(),
        String::new(),
        config.bot_token.clone(),
        config.request_timeout_ms,
        config.retry_max_attempts,
        config.retry_base_delay_ms,
    )?;

    tracing::info!(
        channel = %config.channel_id,
        window_days = config.window_days,
        "generating weekly metrics report"
    );
    let history = match collect_history(&slack, config, now).await {
        Ok(history) => history,
        Err(error) => {
            tracing::error!(
                channel = %config.channel_id,
                error = %format!("{error:#}"),
                "failed to read channel history; weekly report aborted"
            );
            return Err(error);
        }
    };

    let metrics = analyze(&history, config.window_days, now, &config.metrics);
    let markdown = render_weekly_report_markdown(&metrics);
    let filename = report_filename(metrics.generated_at);
    tracing::info!(
        tickets = metrics.total_tickets,
        escalations = metrics.escalations,
        messages = history.len(),
        filename = %filename,
        "weekly metrics computed"
    );

    let published = match publisher.publish(&filename, &markdown).await {
        Ok(published) => Some(published),
        Err(error) => {
            tracing::warn!(
                filename = %filename,
                error = %format!("{error:#}"),
                "weekly report publish failed"
            );
            None
        }
    };

    let mut summary_posted = false;
    if let (Some(published), true) = (published.as_ref(), config.post_summary) {
        let summary =
            render_weekly_summary(&metrics, &published.relative_path, published.url.as_deref());
        match slack.post_message(&config.channel_id, &summary, None).await {
            Ok(_) => summary_posted = true,
            Err(error) => tracing::error!(
                channel = %config.channel_id,
                error = %format!("{error:#}"),
                "failed to post weekly report summary"
            ),
        }
    }

    Ok(WeeklyReportOutcome {
        metrics,
        filename,
        published,
        summary_posted,
    })
}

/// Reads top-level history for the window and expands every thread with replies.
async fn collect_history(
    slack: &SlackApiClient,
    config: &WeeklyReportConfig,
    now: DateTime<Utc>,
) -> Result<Vec<ThreadMessage>> {
    let oldest = format_slack_ts(now - Duration::days(i64::from(config.window_days)));
    let entries = slack
        .conversation_history(&config.channel_id, &oldest, config.history_limit)
        .await
        .context("failed to fetch channel history")?;

    let mut history = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.reply_count == 0 {
            history.push(entry.message);
            continue;
        }
        match slack
            .conversation_replies(&config.channel_id, &entry.message.ts)
            .await
        {
            Ok(replies) if !replies.is_empty() => history.extend(replies),
            Ok(_) => history.push(entry.message),
            Err(error) => {
                tracing::warn!(
                    thread_ts = %entry.message.ts,
                    error = %format!("{error:#}"),
                    "failed to expand thread; counting root only"
                );
                history.push(entry.message);
            }
        }
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use helpdesk_metrics::{MetricsConfig, PublishedReport, ReportPublisher};
    use httpmock::prelude::*;
    use serde_json::json;

    use super::{run_weekly_report_at, WeeklyReportConfig};

    #[derive(Default)]
    struct RecordingPublisher {
        fail: bool,
        published: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ReportPublisher for RecordingPublisher {
        async fn publish(&self, filename: &str, content: &str) -> Result<PublishedReport> {
            if self.fail {
                bail!("git push rejected");
            }
            self.published
                .lock()
                .expect("publisher lock")
                .push((filename.to_string(), content.to_string()));
            Ok(PublishedReport {
                relative_path: format!("reports/{filename}"),
                url: Some(format!("https://git.example/reports/{filename}")),
            })
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn config(base_url: &str) -> WeeklyReportConfig {
        WeeklyReportConfig {
            api_base: base_url.to_string(),
            bot_token: "xoxb-test".to_string(),
            channel_id: "C1".to_string(),
            window_days: 7,
            history_limit: 1_000,
            metrics: MetricsConfig::default(),
            post_summary: true,
            request_timeout_ms: 3_000,
            retry_max_attempts: 1,
            retry_base_delay_ms: 1,
        }
    }

    fn root_ts(hours_ago: i64) -> String {
        helpdesk_core::format_slack_ts(now() - chrono::Duration::hours(hours_ago))
    }

    #[tokio::test]
    async fn functional_weekly_report_expands_threads_publishes_and_posts_summary() {
        let server = MockServer::start();
        let vpn_ts = root_ts(30);
        let email_ts = root_ts(20);
        let history = server.mock(|when, then| {
            when.method(GET)
                .path("/conversations.history")
                .query_param("channel", "C1")
                .query_param("oldest", "1709294400.000000");
            then.status(200).json_body(json!({
                "ok": true,
                "messages": [
                    { "ts": email_ts, "user": "U2", "text": "Outlook calendar not syncing" },
                    { "ts": vpn_ts, "user": "U1", "text": "VPN not connecting", "reply_count": 2 }
                ],
                "has_more": false
            }));
        });
        let replies = server.mock(|when, then| {
            when.method(GET)
                .path("/conversations.replies")
                .query_param("ts", vpn_ts.as_str());
            then.status(200).json_body(json!({
                "ok": true,
                "messages": [
                    { "ts": vpn_ts, "thread_ts": vpn_ts, "user": "U1", "text": "VPN not connecting",
                      "reply_count": 2, "reactions": [{ "name": "thumbsdown", "count": 1 }] },
                    { "ts": root_ts(29), "thread_ts": vpn_ts, "user": "UBOT", "bot_id": "BSELF",
                      "text": "Try restarting the client." },
                    { "ts": root_ts(28), "thread_ts": vpn_ts, "user": "U1", "text": "still not working" }
                ],
                "has_more": false
            }));
        });
        let summary = server.mock(|when, then| {
            when.method(POST)
                .path("/chat.postMessage")
                .body_includes("Weekly Metrics Report Generated")
                .body_includes("reports/weekly-report-2024-03-08.md");
            then.status(200)
                .json_body(json!({ "ok": true, "channel": "C1", "ts": "99.0" }));
        });
        let publisher = RecordingPublisher::default();

        let outcome = run_weekly_report_at(&config(&server.base_url()), &publisher, now())
            .await
            .expect("weekly report");

        history.assert_calls(1);
        replies.assert_calls(1);
        summary.assert_calls(1);
        assert!(outcome.summary_posted);
        assert_eq!(outcome.filename, "weekly-report-2024-03-08.md");
        assert_eq!(outcome.metrics.total_tickets, 2);
        assert_eq!(outcome.metrics.bot_responses, 1);
        assert_eq!(outcome.metrics.escalations, 1);
        assert_eq!(outcome.metrics.tickets_with_followup, 1);

        let published = publisher.published.lock().expect("publisher lock");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "weekly-report-2024-03-08.md");
        assert!(published[0].1.contains("| **Total Tickets Handled** | 2 |"));
    }

    #[tokio::test]
    async fn functional_publish_failure_skips_summary_but_keeps_metrics() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/conversations.history");
            then.status(200).json_body(json!({
                "ok": true,
                "messages": [{ "ts": root_ts(5), "user": "U1", "text": "VPN not connecting" }]
            }));
        });
        let summary = server.mock(|when, then| {
            when.method(POST).path("/chat.postMessage");
            then.status(200)
                .json_body(json!({ "ok": true, "channel": "C1", "ts": "99.0" }));
        });
        let publisher = RecordingPublisher {
            fail: true,
            ..RecordingPublisher::default()
        };

        let outcome = run_weekly_report_at(&config(&server.base_url()), &publisher, now())
            .await
            .expect("weekly report");

        summary.assert_calls(0);
        assert!(outcome.published.is_none());
        assert!(!outcome.summary_posted);
        assert_eq!(outcome.metrics.total_tickets, 1);
        assert_eq!(outcome.metrics.resolution_rate, 100.0);
    }

    #[tokio::test]
    async fn regression_history_failure_aborts_without_publishing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/conversations.history");
            then.status(200)
                .json_body(json!({ "ok": false, "error": "not_in_channel" }));
        });
        let publisher = RecordingPublisher::default();

        let error = run_weekly_report_at(&config(&server.base_url()), &publisher, now())
            .await
            .expect_err("history failure");

        assert!(format!("{error:#}").contains("not_in_channel"));
        assert!(publisher.published.lock().expect("publisher lock").is_empty());
    }
}
