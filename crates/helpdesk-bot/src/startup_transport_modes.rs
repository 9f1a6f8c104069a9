use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use helpdesk_ai::OpenAiClient;
use helpdesk_cli::{resolve_non_empty_cli_value, Cli};
use helpdesk_metrics::GitReportPublisher;
use helpdesk_slack_runtime::{run_slack_bridge, run_weekly_report, SlackBridgeRuntimeConfig};

use crate::startup_config::{
    build_metrics_config, build_openai_config, build_report_publisher_config,
    build_triage_config, build_weekly_report_config, load_keyword_config,
};

fn resolve_bot_token(cli: &Cli) -> Result<String> {
    resolve_non_empty_cli_value(cli.slack_bot_token.as_deref())
        .context("--slack-bot-token (or SLACK_BOT_TOKEN) is required")
}

pub(crate) async fn run_slack_bridge_mode(cli: &Cli) -> Result<()> {
    let keywords = load_keyword_config(cli)?;
    let triage = build_triage_config(cli, keywords);
    let client = OpenAiClient::new(build_openai_config(cli)?)
        .context("failed to build completion client")?;
    let app_token = resolve_non_empty_cli_value(cli.slack_app_token.as_deref())
        .context("--slack-app-token (or SLACK_APP_TOKEN) is required")?;

    tracing::info!(
        channel = %triage.channel_name,
        model = %triage.completion.model,
        companion_poll_attempts = triage.companion.poll_attempts,
        "starting helpdesk slack bridge"
    );
    run_slack_bridge(SlackBridgeRuntimeConfig {
        client: Arc::new(client),
        triage,
        api_base: cli.slack_api_base.clone(),
        app_token,
        bot_token: resolve_bot_token(cli)?,
        bot_user_id: resolve_non_empty_cli_value(cli.slack_bot_user_id.as_deref()),
        request_timeout_ms: cli.slack_request_timeout_ms.max(1),
        reconnect_delay: Duration::from_millis(cli.slack_reconnect_delay_ms.max(1)),
        retry_max_attempts: cli.slack_retry_max_attempts.max(1),
        retry_base_delay_ms: cli.slack_retry_base_delay_ms.max(1),
    })
    .await
}

pub(crate) async fn run_weekly_report_mode(cli: &Cli) -> Result<()> {
    let keywords = load_keyword_config(cli)?;
    let metrics = build_metrics_config(cli, &keywords);
    let config = build_weekly_report_config(cli, resolve_bot_token(cli)?, metrics)?;
    let publisher = GitReportPublisher::new(build_report_publisher_config(cli));

    let outcome = run_weekly_report(&config, &publisher).await?;
    tracing::info!(
        filename = %outcome.filename,
        published = outcome.published.is_some(),
        summary_posted = outcome.summary_posted,
        tickets = outcome.metrics.total_tickets,
        "weekly report finished"
    );
    Ok(())
}
