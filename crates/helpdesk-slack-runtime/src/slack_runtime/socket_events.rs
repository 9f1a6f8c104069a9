//! Socket Mode envelope decoding and normalization into dispatcher events.

use anyhow::{Context, Result};
use helpdesk_triage::{InboundEvent, MentionEvent, MessageEvent, ReactionEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message as WsMessage;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(super) struct SlackSocketEnvelope {
    /// Absent on `hello` and `disconnect` frames, which are not acknowledged.
    #[serde(default)]
    pub(super) envelope_id: Option<String>,
    #[serde(rename = "type")]
    pub(super) envelope_type: String,
    #[serde(default)]
    pub(super) payload: Value,
}

impl SlackSocketEnvelope {
    pub(super) fn is_disconnect(&self) -> bool {
        self.envelope_type == "disconnect"
    }
}

pub(super) fn parse_socket_envelope(message: WsMessage) -> Result<Option<SlackSocketEnvelope>> {
    match message {
        WsMessage::Text(text) => {
            let envelope = serde_json::from_str::<SlackSocketEnvelope>(&text)
                .context("failed to parse slack socket envelope")?;
            Ok(Some(envelope))
        }
        WsMessage::Binary(bytes) => {
            let text =
                String::from_utf8(bytes.to_vec()).context("invalid utf-8 slack socket payload")?;
            let envelope = serde_json::from_str::<SlackSocketEnvelope>(&text)
                .context("failed to parse slack socket envelope")?;
            Ok(Some(envelope))
        }
        WsMessage::Ping(_) | WsMessage::Pong(_) => Ok(None),
        WsMessage::Close(_) => Ok(None),
        WsMessage::Frame(_) => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct SlackEventCallbackEnvelope {
    #[serde(rename = "type")]
    callback_type: String,
    event: SlackEventPayload,
}

#[derive(Debug, Deserialize)]
struct SlackEventPayload {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    thread_ts: Option<String>,
    #[serde(default)]
    reaction: Option<String>,
    #[serde(default)]
    item: Option<SlackReactionItem>,
}

#[derive(Debug, Deserialize)]
struct SlackReactionItem {
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Maps an `events_api` envelope onto a dispatcher event.
///
/// Unsupported event types and payloads missing a channel or timestamp yield
/// `None`; filtering by author and subtype is left to routing.
pub(super) fn normalize_socket_envelope(
    envelope: &SlackSocketEnvelope,
) -> Result<Option<InboundEvent>> {
    if envelope.envelope_type != "events_api" {
        return Ok(None);
    }

    let callback = serde_json::from_value::<SlackEventCallbackEnvelope>(envelope.payload.clone())
        .context("failed to decode slack event callback payload")?;
    if callback.callback_type != "event_callback" {
        return Ok(None);
    }

    let event = callback.event;
    match event.event_type.as_str() {
        "message" => {
            let (Some(channel), Some(ts)) = (non_empty(event.channel), non_empty(event.ts)) else {
                return Ok(None);
            };
            let sender_is_bot = non_empty(event.bot_id).is_some();
            Ok(Some(InboundEvent::Message(MessageEvent {
                channel,
                ts,
                thread_ts: non_empty(event.thread_ts),
                text: event.text.unwrap_or_default(),
                user: non_empty(event.user),
                sender_is_bot,
                subtype: non_empty(event.subtype),
            })))
        }
        "app_mention" => {
            let (Some(channel), Some(ts), Some(user)) = (
                non_empty(event.channel),
                non_empty(event.ts),
                non_empty(event.user),
            ) else {
                return Ok(None);
            };
            Ok(Some(InboundEvent::Mention(MentionEvent {
                channel,
                ts,
                thread_ts: non_empty(event.thread_ts),
                user,
            })))
        }
        "reaction_added" => {
            let Some(item) = event.item.filter(|item| item.item_type == "message") else {
                return Ok(None);
            };
            let (Some(channel), Some(target_ts), Some(reaction_name), Some(actor)) = (
                non_empty(item.channel),
                non_empty(item.ts),
                non_empty(event.reaction),
                non_empty(event.user),
            ) else {
                return Ok(None);
            };
            Ok(Some(InboundEvent::Reaction(ReactionEvent {
                channel,
                target_ts,
                reaction_name,
                actor,
            })))
        }
        _ => Ok(None),
    }
}
