//! Slack Web API client used by the socket bridge, the dispatcher and the report job.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use helpdesk_triage::ThreadMessage;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::slack_helpers::{
    clip_error_body, clip_for_slack, is_retryable_status, is_retryable_transport_error,
    retry_after, SlackRetryPolicy,
};

const REPLIES_PAGE_LIMIT: usize = 200;
const HISTORY_PAGE_LIMIT: usize = 200;

#[derive(Debug, Clone, Deserialize)]
struct SlackAuthTestResponse {
    ok: bool,
    user_id: Option<String>,
    bot_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackOpenSocketResponse {
    ok: bool,
    url: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackChatMessageResponse {
    ok: bool,
    ts: Option<String>,
    channel: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackConversationInfoResponse {
    ok: bool,
    channel: Option<SlackConversation>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackConversation {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackMessagesPageResponse {
    ok: bool,
    #[serde(default)]
    messages: Vec<SlackWireMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: Option<SlackResponseMetadata>,
    error: Option<String>,
}

impl SlackMessagesPageResponse {
    fn next_cursor(&self) -> Option<String> {
        if !self.has_more {
            return None;
        }
        self.response_metadata
            .as_ref()
            .and_then(|metadata| metadata.next_cursor.as_deref())
            .map(str::trim)
            .filter(|cursor| !cursor.is_empty())
            .map(ToOwned::to_owned)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SlackResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackWireMessage {
    ts: String,
    #[serde(default)]
    thread_ts: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    reply_count: Option<u64>,
    #[serde(default)]
    reactions: Vec<SlackWireReaction>,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackWireReaction {
    name: String,
}

impl SlackWireMessage {
    fn into_history_entry(self) -> SlackHistoryEntry {
        let reply_count = self.reply_count.unwrap_or(0);
        SlackHistoryEntry {
            message: ThreadMessage {
                ts: self.ts,
                thread_ts: self.thread_ts,
                text: self.text.unwrap_or_default(),
                user: self.user,
                bot_id: self.bot_id,
                subtype: self.subtype,
                reactions: self
                    .reactions
                    .into_iter()
                    .map(|reaction| reaction.name)
                    .collect(),
            },
            reply_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlackAuthIdentity {
    pub(crate) user_id: String,
    pub(crate) bot_id: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct SlackPostedMessage {
    pub(crate) channel: String,
    pub(crate) ts: String,
}

#[derive(Debug, Clone)]
/// One top-level channel message plus the number of replies in its thread.
pub(crate) struct SlackHistoryEntry {
    pub(crate) message: ThreadMessage,
    pub(crate) reply_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which failures a request may be re-sent after.
enum RequestRetry {
    /// Reads: rate limits, server errors and transport failures.
    Idempotent,
    /// Writes: only an explicit 429, which Slack rejects before processing.
    RateLimitOnly,
}

#[derive(Clone)]
pub(crate) struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    app_token: String,
    bot_token: String,
    retry: SlackRetryPolicy,
}

impl SlackApiClient {
    pub(crate) fn new(
        api_base: String,
        app_token: String,
        bot_token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("helpdesk-slack-bridge"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create slack api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            app_token: app_token.trim().to_string(),
            bot_token: bot_token.trim().to_string(),
            retry: SlackRetryPolicy::new(retry_max_attempts, retry_base_delay_ms),
        })
    }

    pub(crate) async fn resolve_identity(&self) -> Result<SlackAuthIdentity> {
        let response: SlackAuthTestResponse = self
            .request_json("auth.test", RequestRetry::Idempotent, || {
                self.http
                    .post(format!("{}/auth.test", self.api_base))
                    .bearer_auth(&self.bot_token)
            })
            .await?;
        if !response.ok {
            bail!("slack auth.test failed: {}", slack_error(response.error));
        }

        let user_id = response
            .user_id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack auth.test did not return user_id"))?;
        Ok(SlackAuthIdentity {
            user_id,
            bot_id: response.bot_id.filter(|value| !value.trim().is_empty()),
        })
    }

    pub(crate) async fn open_socket_connection(&self) -> Result<String> {
        let response: SlackOpenSocketResponse = self
            .request_json("apps.connections.open", RequestRetry::Idempotent, || {
                self.http
                    .post(format!("{}/apps.connections.open", self.api_base))
                    .bearer_auth(&self.app_token)
            })
            .await?;
        if !response.ok {
            bail!(
                "slack apps.connections.open failed: {}",
                slack_error(response.error)
            );
        }
        response
            .url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("slack apps.connections.open did not return url"))
    }

    /// Name of the conversation, without the leading `#`. Direct messages have none.
    pub(crate) async fn channel_name(&self, channel: &str) -> Result<Option<String>> {
        let response: SlackConversationInfoResponse = self
            .request_json("conversations.info", RequestRetry::Idempotent, || {
                self.http
                    .get(format!("{}/conversations.info", self.api_base))
                    .bearer_auth(&self.bot_token)
                    .query(&[("channel", channel)])
            })
            .await?;
        if !response.ok {
            bail!(
                "slack conversations.info failed for {channel}: {}",
                slack_error(response.error)
            );
        }
        Ok(response
            .channel
            .and_then(|conversation| conversation.name)
            .filter(|name| !name.trim().is_empty()))
    }

    /// Every message of the thread containing `ts`, root included.
    pub(crate) async fn conversation_replies(
        &self,
        channel: &str,
        ts: &str,
    ) -> Result<Vec<ThreadMessage>> {
        let limit = REPLIES_PAGE_LIMIT.to_string();
        let mut cursor: Option<String> = None;
        let mut messages = Vec::new();
        loop {
            let response: SlackMessagesPageResponse = self
                .request_json("conversations.replies", RequestRetry::Idempotent, || {
                    let mut query = vec![
                        ("channel", channel),
                        ("ts", ts),
                        ("limit", limit.as_str()),
                    ];
                    if let Some(cursor) = cursor.as_deref() {
                        query.push(("cursor", cursor));
                    }
                    self.http
                        .get(format!("{}/conversations.replies", self.api_base))
                        .bearer_auth(&self.bot_token)
                        .query(&query)
                })
                .await?;
            if !response.ok {
                bail!(
                    "slack conversations.replies failed for {channel}/{ts}: {}",
                    slack_error(response.error)
                );
            }
            let next_cursor = response.next_cursor();
            messages.extend(
                response
                    .messages
                    .into_iter()
                    .map(|message| message.into_history_entry().message),
            );
            match next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(messages),
            }
        }
    }

    /// Top-level channel messages newer than `oldest`, following cursors up to `max_messages`.
    pub(crate) async fn conversation_history(
        &self,
        channel: &str,
        oldest: &str,
        max_messages: usize,
    ) -> Result<Vec<SlackHistoryEntry>> {
        let limit = HISTORY_PAGE_LIMIT.min(max_messages.max(1)).to_string();
        let mut cursor: Option<String> = None;
        let mut entries = Vec::new();
        loop {
            let response: SlackMessagesPageResponse = self
                .request_json("conversations.history", RequestRetry::Idempotent, || {
                    let mut query = vec![
                        ("channel", channel),
                        ("oldest", oldest),
                        ("limit", limit.as_str()),
                    ];
                    if let Some(cursor) = cursor.as_deref() {
                        query.push(("cursor", cursor));
                    }
                    self.http
                        .get(format!("{}/conversations.history", self.api_base))
                        .bearer_auth(&self.bot_token)
                        .query(&query)
                })
                .await?;
            if !response.ok {
                bail!(
                    "slack conversations.history failed for {channel}: {}",
                    slack_error(response.error)
                );
            }
            let next_cursor = response.next_cursor();
            entries.extend(
                response
                    .messages
                    .into_iter()
                    .map(SlackWireMessage::into_history_entry),
            );
            if entries.len() >= max_messages {
                entries.truncate(max_messages);
                return Ok(entries);
            }
            match next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(entries),
            }
        }
    }

    pub(crate) async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<SlackPostedMessage> {
        let mut payload = json!({
            "channel": channel,
            "text": clip_for_slack(text),
            "mrkdwn": true,
            "unfurl_links": false,
            "unfurl_media": false,
        });
        if let Some(thread_ts) = thread_ts {
            payload["thread_ts"] = Value::String(thread_ts.to_string());
        }

        let response: SlackChatMessageResponse = self
            .request_json("chat.postMessage", RequestRetry::RateLimitOnly, || {
                self.http
                    .post(format!("{}/chat.postMessage", self.api_base))
                    .bearer_auth(&self.bot_token)
                    .json(&payload)
            })
            .await?;
        if !response.ok {
            bail!(
                "slack chat.postMessage failed: {}",
                slack_error(response.error)
            );
        }

        Ok(SlackPostedMessage {
            channel: response.channel.unwrap_or_else(|| channel.to_string()),
            ts: response
                .ts
                .ok_or_else(|| anyhow!("slack chat.postMessage response missing ts"))?,
        })
    }

    async fn request_json<T, F>(
        &self,
        operation: &str,
        scope: RequestRetry,
        mut builder: F,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder().send().await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .with_context(|| format!("failed to decode slack {operation}"));
                    }

                    let hint = retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    let retryable = match scope {
                        RequestRetry::Idempotent => is_retryable_status(status),
                        RequestRetry::RateLimitOnly => status == StatusCode::TOO_MANY_REQUESTS,
                    };
                    if self.retry.allows_retry_after(attempt) && retryable {
                        let delay = self.retry.delay(attempt, hint);
                        tracing::debug!(
                            operation,
                            attempt,
                            status = status.as_u16(),
                            delay_ms = delay.as_millis() as u64,
                            "retrying slack api request"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    bail!(
                        "slack api {operation} failed with status {}: {}",
                        status.as_u16(),
                        clip_error_body(&body)
                    );
                }
                Err(error) => {
                    if scope == RequestRetry::Idempotent
                        && self.retry.allows_retry_after(attempt)
                        && is_retryable_transport_error(&error)
                    {
                        tokio::time::sleep(self.retry.delay(attempt, None)).await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("slack api {operation} request failed"));
                }
            }
        }
    }
}

fn slack_error(error: Option<String>) -> String {
    error.unwrap_or_else(|| "unknown error".to_string())
}
