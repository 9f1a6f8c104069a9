//! Slack Socket Mode bridge that hands channel events to the response dispatcher.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use helpdesk_ai::LlmClient;
use helpdesk_triage::{ResponderIdentity, TriageConfig};
use serde_json::json;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

mod dispatcher;
mod slack_api_client;
mod socket_events;

use dispatcher::ResponseDispatcher;
pub(crate) use slack_api_client::SlackApiClient;
use socket_events::{normalize_socket_envelope, parse_socket_envelope};

#[derive(Clone)]
/// Runtime configuration for the Slack bridge transport loop.
pub struct SlackBridgeRuntimeConfig {
    pub client: Arc<dyn LlmClient>,
    pub triage: TriageConfig,
    pub api_base: String,
    pub app_token: String,
    pub bot_token: String,
    /// Skips `auth.test` for the user id when set; the bot id is still resolved.
    pub bot_user_id: Option<String>,
    pub request_timeout_ms: u64,
    pub reconnect_delay: Duration,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

/// Runs the Slack bridge transport loop until ctrl-c.
pub async fn run_slack_bridge(config: SlackBridgeRuntimeConfig) -> Result<()> {
    let runtime = SlackBridgeRuntime::new(config).await?;
    runtime.run().await
}

struct SlackBridgeRuntime {
    config: SlackBridgeRuntimeConfig,
    slack_client: SlackApiClient,
    dispatcher: Arc<ResponseDispatcher>,
}

impl SlackBridgeRuntime {
    async fn new(config: SlackBridgeRuntimeConfig) -> Result<Self> {
        let slack_client = SlackApiClient::new(
            config.api_base.clone(),
            config.app_token.clone(),
            config.bot_token.clone(),
            config.request_timeout_ms,
            config.retry_max_attempts,
            config.retry_base_delay_ms,
        )?;

        let identity = slack_client
            .resolve_identity()
            .await
            .context("failed to resolve slack bot identity")?;
        let user_id = match config.bot_user_id.as_deref().map(str::trim) {
            Some(user_id) if !user_id.is_empty() => user_id.to_string(),
            _ => identity.user_id,
        };
        let responder = ResponderIdentity::new(user_id).with_bot_id(identity.bot_id);
        tracing::info!(
            user_id = %responder.user_id,
            bot_id = ?responder.bot_id,
            channel = %config.triage.channel_name,
            "slack bridge identity resolved"
        );

        let dispatcher = Arc::new(ResponseDispatcher::new(
            slack_client.clone(),
            Arc::clone(&config.client),
            config.triage.clone(),
            responder,
        ));
        Ok(Self {
            config,
            slack_client,
            dispatcher,
        })
    }

    async fn run(&self) -> Result<()> {
        let mut failure_streak = 0_usize;
        loop {
            match self.slack_client.open_socket_connection().await {
                Ok(socket_url) => {
                    tracing::info!("slack bridge socket connected");
                    match self.run_socket_session(&socket_url).await {
                        Ok(SessionEnd::Shutdown) => {
                            tracing::info!("slack bridge shutdown requested");
                            return Ok(());
                        }
                        Ok(SessionEnd::Reconnect) => failure_streak = 0,
                        Err(error) => {
                            failure_streak = failure_streak.saturating_add(1);
                            tracing::warn!(
                                failure_streak,
                                error = %format!("{error:#}"),
                                "slack bridge socket session error"
                            );
                        }
                    }
                }
                Err(error) => {
                    failure_streak = failure_streak.saturating_add(1);
                    tracing::warn!(
                        failure_streak,
                        error = %format!("{error:#}"),
                        "slack bridge failed to open socket connection"
                    );
                }
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("slack bridge shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }
    }

    async fn run_socket_session(&self, socket_url: &str) -> Result<SessionEnd> {
        let (stream, _response) = connect_async(socket_url)
            .await
            .context("failed to connect slack socket mode websocket")?;
        let (mut sink, mut source) = stream.split();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    return Ok(SessionEnd::Shutdown);
                }
                maybe_message = source.next() => {
                    let Some(message_result) = maybe_message else {
                        return Ok(SessionEnd::Reconnect);
                    };
                    let message = message_result.context("failed reading slack websocket message")?;
                    let Some(envelope) = parse_socket_envelope(message)? else {
                        continue;
                    };
                    if let Some(envelope_id) = envelope.envelope_id.as_deref() {
                        ack_envelope(&mut sink, envelope_id).await?;
                    }
                    if envelope.is_disconnect() {
                        tracing::info!("slack requested socket refresh");
                        return Ok(SessionEnd::Reconnect);
                    }
                    match normalize_socket_envelope(&envelope) {
                        Ok(Some(event)) => {
                            let dispatcher = Arc::clone(&self.dispatcher);
                            tokio::spawn(async move {
                                dispatcher.dispatch(event).await;
                            });
                        }
                        Ok(None) => {}
                        Err(error) => {
                            tracing::warn!(
                                envelope_type = %envelope.envelope_type,
                                error = %format!("{error:#}"),
                                "dropping undecodable slack envelope"
                            );
                        }
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Reconnect,
}

async fn ack_envelope<S>(sink: &mut S, envelope_id: &str) -> Result<()>
where
    S: futures_util::Sink<WsMessage> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let ack = json!({ "envelope_id": envelope_id }).to_string();
    sink.send(WsMessage::Text(ack.into()))
        .await
        .context("failed to send slack socket ack")
}
