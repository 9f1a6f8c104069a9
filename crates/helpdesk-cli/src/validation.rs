use anyhow::{bail, Result};

use crate::Cli;

/// Trims an optional flag value, treating blank strings as unset.
pub fn resolve_non_empty_cli_value(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Checks cross-flag requirements for whichever mode the CLI selects.
pub fn validate_cli(cli: &Cli) -> Result<()> {
    if resolve_non_empty_cli_value(Some(cli.channel_name.trim_start_matches('#'))).is_none() {
        bail!("--channel-name must not be empty");
    }
    if resolve_non_empty_cli_value(cli.slack_bot_token.as_deref()).is_none() {
        bail!("--slack-bot-token (or SLACK_BOT_TOKEN) is required");
    }
    if cli.weekly_report {
        validate_weekly_report_cli(cli)
    } else {
        validate_slack_bridge_cli(cli)
    }
}

fn validate_slack_bridge_cli(cli: &Cli) -> Result<()> {
    if resolve_non_empty_cli_value(cli.slack_app_token.as_deref()).is_none() {
        bail!("--slack-app-token (or SLACK_APP_TOKEN) is required for the Socket Mode responder");
    }
    if resolve_non_empty_cli_value(cli.openai_api_key.as_deref()).is_none() {
        bail!("--openai-api-key (or OPENAI_API_KEY) is required for the Socket Mode responder");
    }
    if resolve_non_empty_cli_value(Some(cli.model.as_str())).is_none() {
        bail!("--model must not be empty");
    }
    Ok(())
}

fn validate_weekly_report_cli(cli: &Cli) -> Result<()> {
    if resolve_non_empty_cli_value(cli.report_channel_id.as_deref()).is_none() {
        bail!("--report-channel-id is required when --weekly-report is set");
    }
    if cli.bot_response_seconds > cli.manual_response_seconds {
        bail!("--bot-response-seconds must not exceed --manual-response-seconds");
    }
    if resolve_non_empty_cli_value(Some(cli.report_dir.as_str())).is_none() {
        bail!("--report-dir must not be empty");
    }
    if cli.report_push && resolve_non_empty_cli_value(Some(cli.report_git_remote.as_str())).is_none()
    {
        bail!("--report-git-remote must not be empty when --report-push is enabled");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{resolve_non_empty_cli_value, validate_cli};
    use crate::Cli;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["helpdesk-bot"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("parse cli")
    }

    #[test]
    fn unit_resolve_non_empty_cli_value_trims_and_drops_blank() {
        assert_eq!(
            resolve_non_empty_cli_value(Some("  xoxb-1 ")),
            Some("xoxb-1".to_string())
        );
        assert_eq!(resolve_non_empty_cli_value(Some("   ")), None);
        assert_eq!(resolve_non_empty_cli_value(None), None);
    }

    #[test]
    fn functional_bridge_mode_accepts_full_credentials() {
        let cli = parse(&[
            "--slack-bot-token",
            "xoxb-1",
            "--slack-app-token",
            "xapp-1",
            "--openai-api-key",
            "sk-1",
        ]);
        validate_cli(&cli).expect("bridge credentials valid");
    }

    #[test]
    fn regression_bridge_mode_requires_app_token() {
        let cli = parse(&[
            "--slack-bot-token",
            "xoxb-1",
            "--slack-app-token",
            " ",
            "--openai-api-key",
            "sk-1",
        ]);
        let error = validate_cli(&cli).expect_err("blank app token");
        assert!(error.to_string().contains("--slack-app-token"));
    }

    #[test]
    fn regression_bridge_mode_requires_completion_key() {
        let cli = parse(&[
            "--slack-bot-token",
            "xoxb-1",
            "--slack-app-token",
            "xapp-1",
            "--openai-api-key",
            "",
        ]);
        let error = validate_cli(&cli).expect_err("blank api key");
        assert!(error.to_string().contains("--openai-api-key"));
    }

    #[test]
    fn functional_weekly_mode_needs_only_bot_token_and_channel() {
        let cli = parse(&[
            "--slack-bot-token",
            "xoxb-1",
            "--weekly-report",
            "--report-channel-id",
            "C1",
        ]);
        validate_cli(&cli).expect("weekly config valid");
    }

    #[test]
    fn regression_weekly_mode_requires_report_channel() {
        let cli = parse(&["--slack-bot-token", "xoxb-1", "--weekly-report"]);
        let error = validate_cli(&cli).expect_err("missing report channel");
        assert!(error.to_string().contains("--report-channel-id"));
    }

    #[test]
    fn regression_weekly_mode_rejects_bot_slower_than_manual() {
        let cli = parse(&[
            "--slack-bot-token",
            "xoxb-1",
            "--weekly-report",
            "--report-channel-id",
            "C1",
            "--bot-response-seconds",
            "5000",
        ]);
        let error = validate_cli(&cli).expect_err("bot slower than manual");
        assert!(error.to_string().contains("--bot-response-seconds"));
    }

    #[test]
    fn regression_blank_channel_name_rejected() {
        let cli = parse(&["--channel-name", "#", "--slack-bot-token", "xoxb-1"]);
        let error = validate_cli(&cli).expect_err("blank channel");
        assert!(error.to_string().contains("--channel-name"));
    }
}
