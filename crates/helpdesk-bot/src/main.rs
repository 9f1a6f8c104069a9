mod bootstrap_helpers;
mod startup_config;
mod startup_transport_modes;

use anyhow::Result;
use clap::Parser;
use helpdesk_cli::{validate_cli, Cli};

use crate::bootstrap_helpers::init_tracing;
use crate::startup_transport_modes::{run_slack_bridge_mode, run_weekly_report_mode};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    validate_cli(&cli)?;
    if cli.weekly_report {
        run_weekly_report_mode(&cli).await
    } else {
        run_slack_bridge_mode(&cli).await
    }
}
