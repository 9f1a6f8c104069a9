//! Maps parsed CLI flags onto the runtime configs of each crate.

use std::time::Duration;

use anyhow::{Context, Result};
use helpdesk_ai::OpenAiConfig;
use helpdesk_cli::{resolve_non_empty_cli_value, Cli};
use helpdesk_metrics::{GitReportPublisherConfig, MetricsConfig};
use helpdesk_slack_runtime::WeeklyReportConfig;
use helpdesk_triage::{CompanionWaitConfig, CompletionSettings, KeywordConfig, TriageConfig};

pub(crate) fn load_keyword_config(cli: &Cli) -> Result<KeywordConfig> {
    match cli.keywords_config.as_deref() {
        Some(path) => KeywordConfig::load(path),
        None => Ok(KeywordConfig::default()),
    }
}

fn channel_name(cli: &Cli) -> String {
    cli.channel_name.trim().trim_start_matches('#').to_string()
}

pub(crate) fn build_triage_config(cli: &Cli, keywords: KeywordConfig) -> TriageConfig {
    TriageConfig {
        channel_name: channel_name(cli),
        keywords,
        context_max_turns: cli.context_max_turns,
        companion: CompanionWaitConfig {
            poll_interval: Duration::from_millis(cli.companion_poll_interval_ms.max(1)),
            poll_attempts: cli.companion_poll_attempts,
            companion_bot_id: resolve_non_empty_cli_value(cli.companion_bot_id.as_deref()),
        },
        completion: CompletionSettings {
            model: cli.model.trim().to_string(),
            temperature: cli.temperature,
            max_tokens: cli.max_tokens.max(1),
        },
    }
}

pub(crate) fn build_openai_config(cli: &Cli) -> Result<OpenAiConfig> {
    let api_key = resolve_non_empty_cli_value(cli.openai_api_key.as_deref())
        .context("--openai-api-key (or OPENAI_API_KEY) is required")?;
    Ok(OpenAiConfig {
        api_base: cli.openai_api_base.trim_end_matches('/').to_string(),
        api_key,
        organization: None,
        request_timeout_ms: cli.llm_request_timeout_ms.max(1),
        max_retries: cli.llm_max_retries,
    })
}

pub(crate) fn build_metrics_config(cli: &Cli, keywords: &KeywordConfig) -> MetricsConfig {
    MetricsConfig {
        channel_name: channel_name(cli),
        classifier_groups: keywords.classifier_groups.clone(),
        down_vote_reactions: keywords.down_vote_reactions.clone(),
        manual_response_seconds: cli.manual_response_seconds.max(1),
        bot_response_seconds: cli.bot_response_seconds.max(1),
        hourly_labor_rate: cli.hourly_labor_rate,
        ..MetricsConfig::default()
    }
}

pub(crate) fn build_weekly_report_config(
    cli: &Cli,
    bot_token: String,
    metrics: MetricsConfig,
) -> Result<WeeklyReportConfig> {
    let channel_id = resolve_non_empty_cli_value(cli.report_channel_id.as_deref())
        .context("--report-channel-id is required when --weekly-report is set")?;
    Ok(WeeklyReportConfig {
        api_base: cli.slack_api_base.clone(),
        bot_token,
        channel_id,
        window_days: cli.metrics_window_days.max(1),
        history_limit: cli.metrics_history_limit.max(1),
        metrics,
        post_summary: cli.report_post_summary,
        request_timeout_ms: cli.slack_request_timeout_ms.max(1),
        retry_max_attempts: cli.slack_retry_max_attempts.max(1),
        retry_base_delay_ms: cli.slack_retry_base_delay_ms.max(1),
    })
}

pub(crate) fn build_report_publisher_config(cli: &Cli) -> GitReportPublisherConfig {
    GitReportPublisherConfig {
        repo_dir: cli.report_repo_dir.clone(),
        reports_dir: cli.report_dir.trim().trim_matches('/').to_string(),
        remote: cli.report_git_remote.trim().to_string(),
        branch: cli.report_git_branch.trim().to_string(),
        author_name: cli.report_author_name.clone(),
        author_email: cli.report_author_email.clone(),
        url_base: resolve_non_empty_cli_value(cli.report_url_base.as_deref()),
        push: cli.report_push,
    }
}
