//! Reduces channel history into weekly usage metrics.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use helpdesk_core::parse_slack_ts_seconds;
use helpdesk_triage::config::default_classifier_groups;
use helpdesk_triage::escalation::is_down_vote;
use helpdesk_triage::{classify, ClassifierGroup, IssueCategory, ThreadMessage};
use serde::Serialize;

const TOP_CATEGORY_LIMIT: usize = 5;
const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    pub channel_name: String,
    pub classifier_groups: Vec<ClassifierGroup>,
    pub down_vote_reactions: Vec<String>,
    /// Case-insensitive substrings marking an escalated thread.
    pub escalation_markers: Vec<String>,
    pub manual_response_seconds: u64,
    pub bot_response_seconds: u64,
    pub hourly_labor_rate: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            channel_name: "it".to_string(),
            classifier_groups: default_classifier_groups(),
            down_vote_reactions: vec!["-1".to_string(), "thumbsdown".to_string()],
            escalation_markers: vec![
                helpdesk_triage::ESCALATION_NOTICE_MARKER.to_string(),
                "🔴".to_string(),
                ":red_circle:".to_string(),
            ],
            manual_response_seconds: 20 * 60,
            bot_response_seconds: 3,
            hourly_labor_rate: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: IssueCategory,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyMetrics {
    pub period_days: u32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub channel_name: String,
    pub total_tickets: usize,
    pub bot_responses: usize,
    pub escalations: usize,
    /// Tickets minus escalated threads; an approximation, never negative.
    pub resolved: usize,
    pub resolution_rate: f64,
    pub tickets_with_followup: usize,
    pub followup_rate: f64,
    /// At most five entries, count descending, ties in category order.
    pub common_issues: Vec<CategoryCount>,
    pub avg_bot_response_seconds: u64,
    pub manual_response_seconds: u64,
    pub time_saved_hours: f64,
    pub hourly_labor_rate: f64,
}

impl WeeklyMetrics {
    pub fn escalation_rate(&self) -> f64 {
        percentage(self.escalations, self.total_tickets)
    }

    pub fn bot_responses_per_ticket(&self) -> f64 {
        if self.total_tickets == 0 {
            return 0.0;
        }
        self.bot_responses as f64 / self.total_tickets as f64
    }

    pub fn estimated_value(&self) -> f64 {
        self.time_saved_hours * self.hourly_labor_rate
    }
}

#[derive(Debug, Default)]
struct ThreadTally {
    user_messages: usize,
}

/// Computes metrics over `history`, a flat list of roots and replies.
///
/// Only messages inside `[now - window_days, now]` are considered; messages
/// with unparseable timestamps are skipped.
pub fn analyze(
    history: &[ThreadMessage],
    window_days: u32,
    now: DateTime<Utc>,
    config: &MetricsConfig,
) -> WeeklyMetrics {
    let window_start = now - Duration::days(i64::from(window_days));
    let start_seconds = window_start.timestamp();
    let end_seconds = now.timestamp();
    let in_window = history
        .iter()
        .filter(|message| {
            parse_slack_ts_seconds(&message.ts)
                .map(|seconds| seconds >= start_seconds && seconds <= end_seconds)
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    let mut bot_responses = 0usize;
    let mut tickets = BTreeMap::<String, ThreadTally>::new();
    let mut category_counts = BTreeMap::<IssueCategory, usize>::new();
    let mut escalated_threads = BTreeSet::<String>::new();

    for message in &in_window {
        if message.is_bot_authored() {
            bot_responses += 1;
        } else if message.is_root() {
            tickets.entry(message.ts.clone()).or_default().user_messages += 1;
            let category = classify(&message.text, &config.classifier_groups);
            *category_counts.entry(category).or_default() += 1;
        }

        if marks_escalation(message, config) {
            escalated_threads.insert(message.thread_id().to_string());
        }
    }

    // Replies are tallied after every root is known; history order is not guaranteed.
    for message in &in_window {
        if message.is_bot_authored() || message.is_root() {
            continue;
        }
        if let Some(tally) = tickets.get_mut(message.thread_id()) {
            tally.user_messages += 1;
        }
    }

    let total_tickets = tickets.len();
    let escalations = escalated_threads.len();
    let resolved = total_tickets.saturating_sub(escalations);
    let tickets_with_followup = tickets
        .values()
        .filter(|tally| tally.user_messages > 1)
        .count();
    let saved_seconds = config
        .manual_response_seconds
        .saturating_sub(config.bot_response_seconds)
        .saturating_mul(total_tickets as u64);

    WeeklyMetrics {
        period_days: window_days,
        window_start,
        window_end: now,
        generated_at: now,
        channel_name: config.channel_name.clone(),
        total_tickets,
        bot_responses,
        escalations,
        resolved,
        resolution_rate: percentage(resolved, total_tickets),
        tickets_with_followup,
        followup_rate: percentage(tickets_with_followup, total_tickets),
        common_issues: top_categories(category_counts),
        avg_bot_response_seconds: config.bot_response_seconds,
        manual_response_seconds: config.manual_response_seconds,
        time_saved_hours: saved_seconds as f64 / SECONDS_PER_HOUR,
        hourly_labor_rate: config.hourly_labor_rate,
    }
}

fn marks_escalation(message: &ThreadMessage, config: &MetricsConfig) -> bool {
    if message
        .reactions
        .iter()
        .any(|reaction| is_down_vote(reaction, &config.down_vote_reactions))
    {
        return true;
    }
    let text = message.text.to_lowercase();
    config
        .escalation_markers
        .iter()
        .any(|marker| !marker.is_empty() && text.contains(&marker.to_lowercase()))
}

fn top_categories(counts: BTreeMap<IssueCategory, usize>) -> Vec<CategoryCount> {
    let mut ranked = counts
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect::<Vec<_>>();
    // Stable sort keeps the BTreeMap's category order for equal counts.
    ranked.sort_by(|left, right| right.count.cmp(&left.count));
    ranked.truncate(TOP_CATEGORY_LIMIT);
    ranked
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}
