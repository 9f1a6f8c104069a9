//! Markdown and Slack renderings of [`WeeklyMetrics`].

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::aggregator::WeeklyMetrics;

const HIGH_RESOLUTION_RATE: f64 = 60.0;
const LOW_RESOLUTION_RATE: f64 = 40.0;
const EXCELLENT_RESOLUTION_RATE: f64 = 70.0;
const FAST_RESPONSE_SECONDS: u64 = 5;
const HIGH_FOLLOWUP_RATE: f64 = 50.0;

pub fn report_filename(generated_at: DateTime<Utc>) -> String {
    format!("weekly-report-{}.md", generated_at.format("%Y-%m-%d"))
}

/// Renders the full weekly report. Output depends only on `metrics`.
pub fn render_weekly_report_markdown(metrics: &WeeklyMetrics) -> String {
    let mut report = String::new();
    write_header(&mut report, metrics);
    write_performance_summary(&mut report, metrics);
    write_impact(&mut report, metrics);
    write_common_issues(&mut report, metrics);
    write_breakdown(&mut report, metrics);
    write_insights(&mut report, metrics);
    write_recommendations(&mut report, metrics);
    write_footer(&mut report, metrics);
    report
}

/// Short message posted to the channel once the report has been published.
pub fn render_weekly_summary(
    metrics: &WeeklyMetrics,
    report_path: &str,
    report_url: Option<&str>,
) -> String {
    let mut summary = format!(
        "📊 *Weekly Metrics Report Generated!*\n\n\
✅ *Report:* `{report_path}`\n\
📈 *Tickets Handled:* {}\n\
⏱️ *Time Saved:* {:.1} hours\n\
🎯 *Resolution Rate:* {:.1}%\n",
        metrics.total_tickets, metrics.time_saved_hours, metrics.resolution_rate
    );
    if let Some(url) = report_url {
        let _ = write!(summary, "\nView full report: {url}\n");
    }
    summary
}

fn long_date(instant: DateTime<Utc>) -> String {
    instant.format("%B %d, %Y").to_string()
}

fn write_header(report: &mut String, metrics: &WeeklyMetrics) {
    let _ = write!(
        report,
        "# 📊 IT AI Support - Weekly Report\n\
**Week of {} - {}**\n\n---\n\n",
        long_date(metrics.window_start),
        long_date(metrics.window_end)
    );
}

fn write_performance_summary(report: &mut String, metrics: &WeeklyMetrics) {
    let _ = write!(
        report,
        "## 📈 Performance Summary\n\n\
| Metric | Value |\n\
|--------|-------|\n\
| **Total Tickets Handled** | {} |\n\
| **Bot Responses Sent** | {} |\n\
| **Average Response Time** | {} seconds |\n\
| **Resolution Rate** | {:.1}% |\n\
| **Tickets Escalated** | {} |\n\
| **Tickets Resolved by Bot** | {} |\n\n---\n\n",
        metrics.total_tickets,
        metrics.bot_responses,
        metrics.avg_bot_response_seconds,
        metrics.resolution_rate,
        metrics.escalations,
        metrics.resolved
    );
}

fn write_impact(report: &mut String, metrics: &WeeklyMetrics) {
    let manual_minutes = metrics.manual_response_seconds / 60;
    let improvement = if metrics.manual_response_seconds == 0 {
        0.0
    } else {
        (1.0 - metrics.avg_bot_response_seconds as f64 / metrics.manual_response_seconds as f64)
            * 100.0
    };
    let _ = write!(
        report,
        "## ⏱️ Impact & Time Savings\n\n\
### Response Time Improvement\n\
- **IT AI Support:** ~{bot} seconds (instant)\n\
- **Manual Response (baseline):** ~{manual_minutes} minutes\n\
- **Improvement:** **{improvement:.1}% faster** initial response\n\n\
### Time Saved\n\
- **Estimated Time Saved This Week:** **{hours:.1} hours**\n\
- **Assumptions:**\n  \
- Bot handles first response in {bot}s\n  \
- Manual first response would take ~{manual_minutes} minutes\n  \
- {resolved} tickets resolved without IT team involvement\n\n\
### Cost Efficiency\n\
- **Tickets Handled 24/7:** {tickets}\n\
- **IT Team Time Freed Up:** ~{hours:.1} hours\n\
- **Estimated Value:** ~${value:.2} (at ${rate:.0}/hour IT labor)\n\n---\n\n",
        bot = metrics.avg_bot_response_seconds,
        hours = metrics.time_saved_hours,
        resolved = metrics.resolved,
        tickets = metrics.total_tickets,
        value = metrics.estimated_value(),
        rate = metrics.hourly_labor_rate,
    );
}

fn write_common_issues(report: &mut String, metrics: &WeeklyMetrics) {
    report.push_str("## 🔥 Most Common Issues\n\n");
    if metrics.common_issues.is_empty() {
        report.push_str("_No tickets this period._\n");
    }
    for (index, entry) in metrics.common_issues.iter().enumerate() {
        let share = if metrics.total_tickets == 0 {
            0.0
        } else {
            entry.count as f64 / metrics.total_tickets as f64 * 100.0
        };
        let _ = writeln!(
            report,
            "{}. **{}** - {} tickets ({share:.1}%)",
            index + 1,
            entry.category.label(),
            entry.count
        );
    }
    report.push_str("\n---\n\n");
}

fn write_breakdown(report: &mut String, metrics: &WeeklyMetrics) {
    let _ = write!(
        report,
        "## 📊 Ticket Breakdown\n\n\
### Resolution Status\n\
- ✅ **Resolved by Bot:** {} ({:.1}%)\n\
- 🔴 **Escalated to IT Team:** {} ({:.1}%)\n\
- 💬 **Required Follow-up:** {} ({:.1}%)\n\n\
### Engagement\n\
- **Average Conversations per Ticket:** {:.1}\n\
- **Users Asking Follow-up Questions:** {:.1}%\n\n---\n\n",
        metrics.resolved,
        metrics.resolution_rate,
        metrics.escalations,
        metrics.escalation_rate(),
        metrics.tickets_with_followup,
        metrics.followup_rate,
        metrics.bot_responses_per_ticket(),
        metrics.followup_rate
    );
}

fn write_insights(report: &mut String, metrics: &WeeklyMetrics) {
    report.push_str("## 💡 Key Insights\n\n");
    if metrics.resolution_rate > HIGH_RESOLUTION_RATE {
        report.push_str(
            "- ✅ **High resolution rate** - Bot is effectively handling most issues without escalation\n",
        );
    } else if metrics.resolution_rate < LOW_RESOLUTION_RATE {
        report.push_str(
            "- ⚠️ **Lower resolution rate** - Consider reviewing prompts or adding more context\n",
        );
    } else {
        report.push_str("- 📊 **Moderate resolution rate** - Bot is learning and improving\n");
    }
    if metrics.avg_bot_response_seconds < FAST_RESPONSE_SECONDS {
        report.push_str("- ⚡ **Excellent response time** - Users receiving instant help\n");
    }
    if let Some(top) = metrics.common_issues.first() {
        let _ = writeln!(
            report,
            "- 🔍 **Focus area:** {} ({} tickets) - Consider creating KB article or improving responses",
            top.category.label(),
            top.count
        );
    }
    if (metrics.escalations as f64) < metrics.total_tickets as f64 * 0.3 {
        report.push_str(
            "- 🎯 **Low escalation rate** - Bot is successfully resolving most issues independently\n",
        );
    }
    if metrics.followup_rate > HIGH_FOLLOWUP_RATE {
        report.push_str("- 💬 **High engagement** - Users are actively conversing with the bot\n");
    }
    report.push_str("\n---\n\n");
}

fn write_recommendations(report: &mut String, metrics: &WeeklyMetrics) {
    report.push_str("## 🎯 Recommendations\n\n");
    let tickets = metrics.total_tickets as f64;
    let mut items = Vec::new();
    if let Some(top) = metrics
        .common_issues
        .first()
        .filter(|top| top.count as f64 > tickets * 0.3)
    {
        items.push(format!(
            "**Create documentation** for {} issues (most common this week)",
            top.category.label()
        ));
    }
    if metrics.escalations as f64 > tickets * 0.4 {
        items.push(
            "**Review escalated tickets** to identify patterns and improve bot responses"
                .to_string(),
        );
    }
    if metrics.resolution_rate > EXCELLENT_RESOLUTION_RATE {
        items.push(
            "**Excellent performance** - Continue monitoring and maintain current approach"
                .to_string(),
        );
    }
    if items.is_empty() {
        report.push_str("_No changes recommended this week._\n");
    }
    for (index, item) in items.iter().enumerate() {
        let _ = writeln!(report, "{}. {item}", index + 1);
    }
    report.push_str("\n---\n\n");
}

fn write_footer(report: &mut String, metrics: &WeeklyMetrics) {
    let _ = write!(
        report,
        "## 📅 Historical Comparison\n\n\
*Track trends week-over-week by reviewing previous reports in this directory*\n\n---\n\n\
**Report Generated:** {}\n\
**Data Source:** Slack #{}\n\
**Analysis Period:** {} days\n",
        metrics.generated_at.format("%Y-%m-%d %H:%M:%S"),
        metrics.channel_name,
        metrics.period_days
    );
}
