//! Persists rendered weekly reports.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use helpdesk_core::write_text_atomic;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedReport {
    /// Path relative to the repository root, e.g. `reports/weekly-report-2024-03-08.md`.
    pub relative_path: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait ReportPublisher: Send + Sync {
    async fn publish(&self, filename: &str, content: &str) -> Result<PublishedReport>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitReportPublisherConfig {
    pub repo_dir: PathBuf,
    pub reports_dir: String,
    pub remote: String,
    pub branch: String,
    pub author_name: String,
    pub author_email: String,
    /// Base URL under which committed files are browsable.
    pub url_base: Option<String>,
    pub push: bool,
}

impl Default for GitReportPublisherConfig {
    fn default() -> Self {
        Self {
            repo_dir: PathBuf::from("."),
            reports_dir: "reports".to_string(),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            author_name: "IT AI Support".to_string(),
            author_email: "helpdesk-bot@localhost".to_string(),
            url_base: None,
            push: true,
        }
    }
}

/// Writes the report into a git checkout, then commits and pushes it.
#[derive(Debug, Clone)]
pub struct GitReportPublisher {
    config: GitReportPublisherConfig,
}

impl GitReportPublisher {
    pub fn new(config: GitReportPublisherConfig) -> Self {
        Self { config }
    }

    fn relative_path(&self, filename: &str) -> String {
        let dir = self.config.reports_dir.trim_matches('/');
        if dir.is_empty() {
            filename.to_string()
        } else {
            format!("{dir}/{filename}")
        }
    }

    async fn run_git(&self, args: &[&str]) -> Result<()> {
        let mut command = tokio::process::Command::new("git");
        command
            .current_dir(&self.config.repo_dir)
            .arg("-c")
            .arg(format!("user.name={}", self.config.author_name))
            .arg("-c")
            .arg(format!("user.email={}", self.config.author_email))
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let output = command
            .output()
            .await
            .with_context(|| format!("failed to execute git {}", args.join(" ")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "git {} failed with exit code {}: {}",
                args.join(" "),
                output.status.code().unwrap_or(1),
                stderr.trim()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ReportPublisher for GitReportPublisher {
    async fn publish(&self, filename: &str, content: &str) -> Result<PublishedReport> {
        if filename.trim().is_empty() || Path::new(filename).components().count() != 1 {
            bail!("report filename '{filename}' must be a single path component");
        }
        let relative_path = self.relative_path(filename);
        let absolute_path = self.config.repo_dir.join(&relative_path);
        write_text_atomic(&absolute_path, content)?;
        tracing::debug!(path = %absolute_path.display(), "weekly report written");

        let message = format!("Add weekly metrics report: {filename}");
        self.run_git(&["add", relative_path.as_str()]).await?;
        self.run_git(&["commit", "-m", message.as_str()]).await?;
        if self.config.push {
            self.run_git(&["push", self.config.remote.as_str(), self.config.branch.as_str()])
                .await?;
        }

        let url = self
            .config
            .url_base
            .as_deref()
            .map(|base| format!("{}/{relative_path}", base.trim_end_matches('/')));
        tracing::info!(path = %relative_path, pushed = self.config.push, "weekly report published");
        Ok(PublishedReport { relative_path, url })
    }
}
