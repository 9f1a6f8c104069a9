//! Immutable triage configuration assembled once at startup.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::classifier::IssueCategory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierGroup {
    pub category: IssueCategory,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Keyword sets overridable from a TOML file; omitted tables keep their defaults.
pub struct KeywordConfig {
    /// Listed in precedence order: the first matching group wins.
    pub classifier_groups: Vec<ClassifierGroup>,
    pub stuck_keywords: Vec<String>,
    pub access_keywords: Vec<String>,
    pub down_vote_reactions: Vec<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            classifier_groups: default_classifier_groups(),
            stuck_keywords: default_stuck_keywords(),
            access_keywords: default_access_keywords(),
            down_vote_reactions: strings(&["-1", "thumbsdown"]),
        }
    }
}

impl KeywordConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read keyword config {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("failed to parse keyword config {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config = toml::from_str::<KeywordConfig>(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.down_vote_reactions.is_empty() {
            bail!("down_vote_reactions must name at least one reaction");
        }
        if let Some(group) = self
            .classifier_groups
            .iter()
            .find(|group| group.category == IssueCategory::Other)
        {
            bail!(
                "classifier group '{}' is reserved for unmatched text",
                group.category.label()
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Best-effort wait for a companion triage bot before answering a new ticket.
pub struct CompanionWaitConfig {
    pub poll_interval: Duration,
    /// 0 disables the wait entirely.
    pub poll_attempts: usize,
    pub companion_bot_id: Option<String>,
}

impl Default for CompanionWaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            poll_attempts: 10,
            companion_bot_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriageConfig {
    pub channel_name: String,
    pub keywords: KeywordConfig,
    pub context_max_turns: usize,
    pub companion: CompanionWaitConfig,
    pub completion: CompletionSettings,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            channel_name: "it".to_string(),
            keywords: KeywordConfig::default(),
            context_max_turns: 20,
            companion: CompanionWaitConfig::default(),
            completion: CompletionSettings::default(),
        }
    }
}

pub fn default_classifier_groups() -> Vec<ClassifierGroup> {
    vec![
        group(
            IssueCategory::AccessRequest,
            &["access to", "need access", "request access", "permission"],
        ),
        group(
            IssueCategory::SaasAccess,
            &["snowflake", "github", "figma", "jira", "aws"],
        ),
        group(
            IssueCategory::Network,
            &["vpn", "connect", "network", "wifi", "internet", "connection"],
        ),
        group(
            IssueCategory::Authentication,
            &["okta", "login", "password", "access", "sso", "authenticate", "2fa"],
        ),
        group(
            IssueCategory::Email,
            &["email", "gmail", "outlook", "calendar", "mail"],
        ),
        group(
            IssueCategory::Performance,
            &["slow", "freeze", "crash", "performance", "hang", "lag"],
        ),
        group(
            IssueCategory::Software,
            &["install", "update", "software", "app", "application"],
        ),
        group(
            IssueCategory::Hardware,
            &["device", "laptop", "computer", "mac", "jamf", "hardware"],
        ),
    ]
}

pub fn default_stuck_keywords() -> Vec<String> {
    strings(&[
        "didn't work",
        "did not work",
        "doesn't work",
        "does not work",
        "still not working",
        "still broken",
        "still having",
        "still getting",
        "not sure",
        "tried everything",
        "same issue",
        "same problem",
        "no luck",
    ])
}

pub fn default_access_keywords() -> Vec<String> {
    strings(&[
        "access",
        "license",
        "add me",
        "set up",
        "setup",
        "permission",
        "grant",
        "onboard",
    ])
}

fn group(category: IssueCategory, keywords: &[&str]) -> ClassifierGroup {
    ClassifierGroup {
        category,
        keywords: strings(keywords),
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
