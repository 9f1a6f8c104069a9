//! Inbound event model and dispatcher route selection.

use crate::escalation::is_down_vote;
use crate::thread::ResponderIdentity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub text: String,
    pub user: Option<String>,
    pub sender_is_bot: bool,
    pub subtype: Option<String>,
}

impl MessageEvent {
    /// Thread the reply belongs in: the existing thread, or a new one rooted here.
    pub fn reply_thread_ts(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(self.ts.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub channel: String,
    pub target_ts: String,
    pub reaction_name: String,
    pub actor: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionEvent {
    pub channel: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub user: String,
}

impl MentionEvent {
    pub fn reply_thread_ts(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(self.ts.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message(MessageEvent),
    Reaction(ReactionEvent),
    Mention(MentionEvent),
}

impl InboundEvent {
    pub fn channel(&self) -> &str {
        match self {
            Self::Message(event) => &event.channel,
            Self::Reaction(event) => &event.channel,
            Self::Mention(event) => &event.channel,
        }
    }

    /// Thread that receives the fallback reply when handling fails.
    pub fn fallback_thread_ts(&self) -> &str {
        match self {
            Self::Message(event) => event.reply_thread_ts(),
            Self::Reaction(event) => &event.target_ts,
            Self::Mention(event) => event.reply_thread_ts(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRoute {
    NewTicket,
    ThreadFollowup,
    Reaction,
    Mention,
    Ignored,
}

impl DispatchRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewTicket => "new_ticket",
            Self::ThreadFollowup => "thread_followup",
            Self::Reaction => "reaction",
            Self::Mention => "mention",
            Self::Ignored => "ignored",
        }
    }
}

/// Selects the handling route; rules are evaluated in order and the first match wins.
pub fn route_event(
    event: &InboundEvent,
    responder: &ResponderIdentity,
    down_vote_reactions: &[String],
) -> DispatchRoute {
    match event {
        InboundEvent::Message(message) => {
            if message.subtype.is_some() {
                return DispatchRoute::Ignored;
            }
            if message.sender_is_bot
                || message.user.as_deref() == Some(responder.user_id.as_str())
            {
                return DispatchRoute::Ignored;
            }
            match message.thread_ts.as_deref() {
                Some(thread_ts) if thread_ts != message.ts => DispatchRoute::ThreadFollowup,
                _ => DispatchRoute::NewTicket,
            }
        }
        InboundEvent::Reaction(reaction) => {
            if reaction.actor == responder.user_id {
                return DispatchRoute::Ignored;
            }
            if is_down_vote(&reaction.reaction_name, down_vote_reactions) {
                DispatchRoute::Reaction
            } else {
                DispatchRoute::Ignored
            }
        }
        InboundEvent::Mention(mention) => {
            if mention.user == responder.user_id {
                return DispatchRoute::Ignored;
            }
            DispatchRoute::Mention
        }
    }
}
