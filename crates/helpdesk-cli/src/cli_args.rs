use std::path::PathBuf;

use clap::{ArgAction, Parser};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u32(value: &str) -> Result<u32, String> {
    let parsed = value
        .parse::<u32>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_f64(value: &str) -> Result<f64, String> {
    let parsed = value
        .parse::<f64>()
        .map_err(|error| format!("failed to parse float: {error}"))?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err("value must be a finite number greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_temperature(value: &str) -> Result<f32, String> {
    let parsed = value
        .parse::<f32>()
        .map_err(|error| format!("failed to parse float: {error}"))?;
    if !parsed.is_finite() || !(0.0..=2.0).contains(&parsed) {
        return Err("temperature must be between 0 and 2".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "helpdesk-bot",
    about = "Slack IT helpdesk responder with weekly metrics reporting",
    version
)]
pub struct Cli {
    #[arg(
        long = "channel-name",
        env = "IT_CHANNEL_NAME",
        default_value = "it",
        help = "Name of the Slack channel the responder is bound to (without '#')"
    )]
    pub channel_name: String,

    #[arg(
        long = "slack-api-base",
        env = "HELPDESK_SLACK_API_BASE",
        default_value = "https://slack.com/api",
        help = "Slack Web API base URL"
    )]
    pub slack_api_base: String,

    #[arg(
        long = "slack-app-token",
        env = "SLACK_APP_TOKEN",
        hide_env_values = true,
        help = "Slack Socket Mode app token (xapp-...)"
    )]
    pub slack_app_token: Option<String>,

    #[arg(
        long = "slack-bot-token",
        env = "SLACK_BOT_TOKEN",
        hide_env_values = true,
        help = "Slack bot token for Web API (xoxb-...)"
    )]
    pub slack_bot_token: Option<String>,

    #[arg(
        long = "slack-bot-user-id",
        env = "HELPDESK_SLACK_BOT_USER_ID",
        help = "Optional bot user id; resolved through auth.test when omitted"
    )]
    pub slack_bot_user_id: Option<String>,

    #[arg(
        long = "slack-request-timeout-ms",
        env = "HELPDESK_SLACK_REQUEST_TIMEOUT_MS",
        default_value_t = 15_000,
        value_parser = parse_positive_u64,
        help = "Timeout for Slack Web API requests in milliseconds"
    )]
    pub slack_request_timeout_ms: u64,

    #[arg(
        long = "slack-reconnect-delay-ms",
        env = "HELPDESK_SLACK_RECONNECT_DELAY_MS",
        default_value_t = 1_000,
        value_parser = parse_positive_u64,
        help = "Delay before reconnecting after a socket session ends"
    )]
    pub slack_reconnect_delay_ms: u64,

    #[arg(
        long = "slack-retry-max-attempts",
        env = "HELPDESK_SLACK_RETRY_MAX_ATTEMPTS",
        default_value_t = 1,
        value_parser = parse_positive_usize,
        help = "Attempts per Slack API call; 1 disables retries, and chat.postMessage is only re-sent after a 429"
    )]
    pub slack_retry_max_attempts: usize,

    #[arg(
        long = "slack-retry-base-delay-ms",
        env = "HELPDESK_SLACK_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base backoff delay for retryable Slack API failures"
    )]
    pub slack_retry_base_delay_ms: u64,

    #[arg(
        long = "openai-api-key",
        env = "OPENAI_API_KEY",
        hide_env_values = true,
        help = "API key for the chat completion provider"
    )]
    pub openai_api_key: Option<String>,

    #[arg(
        long = "openai-api-base",
        env = "HELPDESK_OPENAI_API_BASE",
        default_value = "https://api.openai.com/v1",
        help = "Base URL for the OpenAI-compatible chat completion API"
    )]
    pub openai_api_base: String,

    #[arg(
        long = "model",
        env = "HELPDESK_MODEL",
        default_value = "gpt-4o-mini",
        help = "Chat completion model used for troubleshooting replies"
    )]
    pub model: String,

    #[arg(
        long = "temperature",
        env = "HELPDESK_TEMPERATURE",
        default_value_t = 0.7,
        value_parser = parse_temperature,
        help = "Sampling temperature for completions (0 to 2)"
    )]
    pub temperature: f32,

    #[arg(
        long = "max-tokens",
        env = "HELPDESK_MAX_TOKENS",
        default_value_t = 800,
        value_parser = parse_positive_u32,
        help = "Maximum output tokens per completion"
    )]
    pub max_tokens: u32,

    #[arg(
        long = "llm-request-timeout-ms",
        env = "HELPDESK_LLM_REQUEST_TIMEOUT_MS",
        default_value_t = 60_000,
        value_parser = parse_positive_u64,
        help = "Timeout for completion requests in milliseconds"
    )]
    pub llm_request_timeout_ms: u64,

    #[arg(
        long = "llm-max-retries",
        env = "HELPDESK_LLM_MAX_RETRIES",
        default_value_t = 0,
        help = "Retries for transient completion failures (0, the default, fails the turn on the first error)"
    )]
    pub llm_max_retries: usize,

    #[arg(
        long = "context-max-turns",
        env = "HELPDESK_CONTEXT_MAX_TURNS",
        default_value_t = 20,
        help = "Most recent thread turns replayed to the model on follow-ups (0 sends only the new message)"
    )]
    pub context_max_turns: usize,

    #[arg(
        long = "companion-poll-interval-ms",
        env = "HELPDESK_COMPANION_POLL_INTERVAL_MS",
        default_value_t = 2_000,
        value_parser = parse_positive_u64,
        help = "Delay between thread polls while waiting for the ticketing bot"
    )]
    pub companion_poll_interval_ms: u64,

    #[arg(
        long = "companion-poll-attempts",
        env = "HELPDESK_COMPANION_POLL_ATTEMPTS",
        default_value_t = 10,
        help = "Thread polls before replying without the ticketing bot (0 disables waiting)"
    )]
    pub companion_poll_attempts: usize,

    #[arg(
        long = "companion-bot-id",
        env = "HELPDESK_COMPANION_BOT_ID",
        help = "Bot id of the ticketing bot; any other bot counts when omitted"
    )]
    pub companion_bot_id: Option<String>,

    #[arg(
        long = "keywords-config",
        env = "HELPDESK_KEYWORDS_CONFIG",
        help = "TOML file overriding classifier groups and trigger keyword lists"
    )]
    pub keywords_config: Option<PathBuf>,

    #[arg(
        long = "weekly-report",
        env = "HELPDESK_WEEKLY_REPORT",
        default_value_t = false,
        help = "Generate and publish the weekly metrics report, then exit"
    )]
    pub weekly_report: bool,

    #[arg(
        long = "report-channel-id",
        env = "HELPDESK_REPORT_CHANNEL_ID",
        requires = "weekly_report",
        help = "Channel id whose history feeds the weekly report"
    )]
    pub report_channel_id: Option<String>,

    #[arg(
        long = "metrics-window-days",
        env = "HELPDESK_METRICS_WINDOW_DAYS",
        default_value_t = 7,
        value_parser = parse_positive_u32,
        help = "Days of channel history covered by the report"
    )]
    pub metrics_window_days: u32,

    #[arg(
        long = "metrics-history-limit",
        env = "HELPDESK_METRICS_HISTORY_LIMIT",
        default_value_t = 1_000,
        value_parser = parse_positive_usize,
        help = "Upper bound on top-level messages read for the report"
    )]
    pub metrics_history_limit: usize,

    #[arg(
        long = "manual-response-seconds",
        env = "HELPDESK_MANUAL_RESPONSE_SECONDS",
        default_value_t = 1_200,
        value_parser = parse_positive_u64,
        help = "Assumed human first-response time used for time-saved estimates"
    )]
    pub manual_response_seconds: u64,

    #[arg(
        long = "bot-response-seconds",
        env = "HELPDESK_BOT_RESPONSE_SECONDS",
        default_value_t = 3,
        value_parser = parse_positive_u64,
        help = "Assumed bot first-response time used for time-saved estimates"
    )]
    pub bot_response_seconds: u64,

    #[arg(
        long = "hourly-labor-rate",
        env = "HELPDESK_HOURLY_LABOR_RATE",
        default_value_t = 50.0,
        value_parser = parse_positive_f64,
        help = "Hourly labor rate (USD) used for the estimated value"
    )]
    pub hourly_labor_rate: f64,

    #[arg(
        long = "report-repo-dir",
        env = "HELPDESK_REPORT_REPO_DIR",
        default_value = ".",
        help = "Git working tree the report is committed into"
    )]
    pub report_repo_dir: PathBuf,

    #[arg(
        long = "report-dir",
        env = "HELPDESK_REPORT_DIR",
        default_value = "reports",
        help = "Directory inside the repository that receives report files"
    )]
    pub report_dir: String,

    #[arg(
        long = "report-git-remote",
        env = "HELPDESK_REPORT_GIT_REMOTE",
        default_value = "origin",
        help = "Git remote the report commit is pushed to"
    )]
    pub report_git_remote: String,

    #[arg(
        long = "report-git-branch",
        env = "HELPDESK_REPORT_GIT_BRANCH",
        default_value = "main",
        help = "Git branch the report commit is pushed to"
    )]
    pub report_git_branch: String,

    #[arg(
        long = "report-author-name",
        env = "HELPDESK_REPORT_AUTHOR_NAME",
        default_value = "IT AI Support",
        help = "Commit author name for report commits"
    )]
    pub report_author_name: String,

    #[arg(
        long = "report-author-email",
        env = "HELPDESK_REPORT_AUTHOR_EMAIL",
        default_value = "helpdesk-bot@localhost",
        help = "Commit author email for report commits"
    )]
    pub report_author_email: String,

    #[arg(
        long = "report-url-base",
        env = "HELPDESK_REPORT_URL_BASE",
        help = "Web URL prefix for the report directory, linked from the Slack summary"
    )]
    pub report_url_base: Option<String>,

    #[arg(
        long = "report-push",
        env = "HELPDESK_REPORT_PUSH",
        default_value_t = true,
        action = ArgAction::Set,
        help = "Push the report commit to the configured remote"
    )]
    pub report_push: bool,

    #[arg(
        long = "report-post-summary",
        env = "HELPDESK_REPORT_POST_SUMMARY",
        default_value_t = true,
        action = ArgAction::Set,
        help = "Post a summary of the published report to the report channel"
    )]
    pub report_post_summary: bool,
}
