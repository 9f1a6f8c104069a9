//! Response dispatcher: turns one routed event into Slack replies.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use helpdesk_ai::{ChatRequest, LlmClient, Message};
use helpdesk_triage::prompts::{
    followup_system_prompt, new_ticket_system_prompt, render_access_request_ack,
    render_mention_reply, render_new_ticket_prompt, FALLBACK_REPLY,
};
use helpdesk_triage::{
    build_conversation_context, classify, compose_followup_reply, escalation_outcome_for_reaction,
    evaluate_followup_signals, is_access_request, render_escalation_notice,
    resolve_assignee_placeholder, route_event, DispatchRoute, InboundEvent, MentionEvent,
    MessageEvent, ReactionEvent, ResponderIdentity, ThreadSnapshot, TriageConfig,
};

use super::slack_api_client::SlackApiClient;

/// Immutable per-process dispatcher; each event is handled independently.
pub(super) struct ResponseDispatcher {
    slack: SlackApiClient,
    llm: Arc<dyn LlmClient>,
    config: TriageConfig,
    responder: ResponderIdentity,
}

impl ResponseDispatcher {
    pub(super) fn new(
        slack: SlackApiClient,
        llm: Arc<dyn LlmClient>,
        config: TriageConfig,
        responder: ResponderIdentity,
    ) -> Self {
        Self {
            slack,
            llm,
            config,
            responder,
        }
    }

    /// Handles one event end to end. Errors never escape: they are logged and
    /// answered with the fallback reply in the event's thread.
    pub(super) async fn dispatch(&self, event: InboundEvent) -> DispatchRoute {
        let route = route_event(
            &event,
            &self.responder,
            &self.config.keywords.down_vote_reactions,
        );
        if route == DispatchRoute::Ignored {
            tracing::debug!(channel = event.channel(), "ignoring slack event");
            return route;
        }

        let started = Instant::now();
        // Mentions are answered in any channel the app is in.
        let bound = if route == DispatchRoute::Mention {
            Ok(true)
        } else {
            self.is_bound_channel(event.channel()).await
        };
        let result = match bound {
            Ok(false) => {
                tracing::debug!(
                    channel = event.channel(),
                    route = route.as_str(),
                    "ignoring event outside the helpdesk channel"
                );
                return DispatchRoute::Ignored;
            }
            Ok(true) => self.handle(route, &event).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    channel = event.channel(),
                    route = route.as_str(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "helpdesk event handled"
                );
            }
            Err(error) => {
                tracing::error!(
                    channel = event.channel(),
                    route = route.as_str(),
                    error = %format!("{error:#}"),
                    "helpdesk event handling failed"
                );
                self.post_fallback(&event).await;
            }
        }
        route
    }

    async fn handle(&self, route: DispatchRoute, event: &InboundEvent) -> Result<()> {
        match (route, event) {
            (DispatchRoute::NewTicket, InboundEvent::Message(message)) => {
                self.handle_new_ticket(message).await
            }
            (DispatchRoute::ThreadFollowup, InboundEvent::Message(message)) => {
                self.handle_thread_followup(message).await
            }
            (DispatchRoute::Reaction, InboundEvent::Reaction(reaction)) => {
                self.handle_reaction(reaction).await
            }
            (DispatchRoute::Mention, InboundEvent::Mention(mention)) => {
                self.handle_mention(mention).await
            }
            _ => Ok(()),
        }
    }

    async fn is_bound_channel(&self, channel: &str) -> Result<bool> {
        let name = self
            .slack
            .channel_name(channel)
            .await
            .context("failed to resolve channel name")?;
        let expected = self.config.channel_name.trim().trim_start_matches('#');
        Ok(name.as_deref() == Some(expected))
    }

    async fn handle_new_ticket(&self, message: &MessageEvent) -> Result<()> {
        let root_ts = message.reply_thread_ts();
        let companion_snapshot = self.wait_for_companion(&message.channel, root_ts).await;
        let keywords = &self.config.keywords;
        let category = classify(&message.text, &keywords.classifier_groups);

        if is_access_request(&message.text, category, &keywords.access_keywords) {
            let snapshot = match companion_snapshot {
                Some(snapshot) => Some(snapshot),
                None => self.fetch_thread(&message.channel, root_ts).await?,
            };
            let assignee = snapshot.and_then(|snapshot| snapshot.assignee_mention());
            let ack = render_access_request_ack(category, assignee.as_deref());
            self.slack
                .post_message(&message.channel, &ack, Some(root_ts))
                .await?;
            tracing::info!(
                channel = %message.channel,
                ts = %message.ts,
                category = category.label(),
                "access request acknowledged"
            );
            return Ok(());
        }

        let request = self.chat_request(vec![
            Message::system(new_ticket_system_prompt(category)),
            Message::user(render_new_ticket_prompt(&message.text)),
        ]);
        let response = self
            .llm
            .complete(request)
            .await
            .context("completion request failed for new ticket")?;
        let assignee = companion_snapshot.and_then(|snapshot| snapshot.assignee_mention());
        let reply =
            resolve_assignee_placeholder(response.message.text_content(), assignee.as_deref());
        let posted = self
            .slack
            .post_message(&message.channel, &reply, Some(root_ts))
            .await?;
        tracing::info!(
            channel = %posted.channel,
            reply_ts = %posted.ts,
            category = category.label(),
            "troubleshooting reply posted"
        );
        Ok(())
    }

    async fn handle_thread_followup(&self, message: &MessageEvent) -> Result<()> {
        let root_ts = message.reply_thread_ts();
        let snapshot = self
            .fetch_thread(&message.channel, root_ts)
            .await?
            .unwrap_or_else(|| ThreadSnapshot::new(message.channel.as_str(), root_ts, Vec::new()));
        let history = snapshot.history_before(&message.ts);
        let system_prompt = followup_system_prompt();
        let context = build_conversation_context(
            &history,
            &message.text,
            &system_prompt,
            &self.responder,
            self.config.context_max_turns,
        );

        let response = self
            .llm
            .complete(self.chat_request(context))
            .await
            .context("completion request failed for thread follow-up")?;
        let generated = response.message.text_content();
        let signals = evaluate_followup_signals(
            &message.text,
            generated,
            &self.config.keywords.stuck_keywords,
        );
        let assignee = snapshot.assignee_mention();
        let composed = compose_followup_reply(generated, &signals, assignee.as_deref());

        self.slack
            .post_message(&message.channel, &composed.body, Some(root_ts))
            .await?;
        if let Some(footer) = composed.footer.as_deref() {
            self.slack
                .post_message(&message.channel, footer, Some(root_ts))
                .await?;
            tracing::info!(
                channel = %message.channel,
                thread_ts = %root_ts,
                stuck_keyword = ?signals.stuck_keyword,
                model_signalled = signals.model_signalled,
                assignee_found = assignee.is_some(),
                "follow-up escalation signalled"
            );
        }
        Ok(())
    }

    async fn handle_reaction(&self, reaction: &ReactionEvent) -> Result<()> {
        let snapshot = self
            .fetch_thread(&reaction.channel, &reaction.target_ts)
            .await?
            .unwrap_or_else(|| {
                ThreadSnapshot::new(reaction.channel.as_str(), reaction.target_ts.as_str(), Vec::new())
            });
        let outcome = escalation_outcome_for_reaction(
            &reaction.reaction_name,
            &self.config.keywords.down_vote_reactions,
            &snapshot,
        );
        if !outcome.fired {
            return Ok(());
        }

        let notice = render_escalation_notice(outcome.assignee_mention.as_deref());
        self.slack
            .post_message(&reaction.channel, &notice, Some(&snapshot.root_ts))
            .await?;
        tracing::info!(
            channel = %reaction.channel,
            thread_ts = %snapshot.root_ts,
            actor = %reaction.actor,
            assignee_found = outcome.assignee_mention.is_some(),
            "escalation notice posted"
        );
        Ok(())
    }

    async fn handle_mention(&self, mention: &MentionEvent) -> Result<()> {
        self.slack
            .post_message(
                &mention.channel,
                &render_mention_reply(&mention.user),
                mention.thread_ts.as_deref(),
            )
            .await?;
        Ok(())
    }

    /// Polls the thread until a companion bot posts or attempts run out.
    ///
    /// Best effort: a timeout or a failed poll only logs and returns the last
    /// snapshot seen.
    async fn wait_for_companion(&self, channel: &str, root_ts: &str) -> Option<ThreadSnapshot> {
        let companion = &self.config.companion;
        if companion.poll_attempts == 0 {
            return None;
        }

        let mut last_snapshot = None;
        for attempt in 1..=companion.poll_attempts {
            tokio::time::sleep(companion.poll_interval).await;
            match self.fetch_thread(channel, root_ts).await {
                Ok(Some(snapshot)) => {
                    if snapshot
                        .has_companion_post(&self.responder, companion.companion_bot_id.as_deref())
                    {
                        tracing::debug!(channel, root_ts, attempt, "companion bot posted");
                        return Some(snapshot);
                    }
                    last_snapshot = Some(snapshot);
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        channel,
                        root_ts,
                        attempt,
                        error = %format!("{error:#}"),
                        "companion poll failed; responding without it"
                    );
                    return last_snapshot;
                }
            }
        }

        tracing::warn!(
            channel,
            root_ts,
            attempts = companion.poll_attempts,
            "companion bot did not post before timeout; responding anyway"
        );
        last_snapshot
    }

    async fn fetch_thread(&self, channel: &str, ts: &str) -> Result<Option<ThreadSnapshot>> {
        let messages = self
            .slack
            .conversation_replies(channel, ts)
            .await
            .context("failed to fetch thread replies")?;
        Ok(ThreadSnapshot::from_replies(channel, messages))
    }

    fn chat_request(&self, messages: Vec<Message>) -> ChatRequest {
        let completion = &self.config.completion;
        ChatRequest {
            model: completion.model.clone(),
            messages,
            max_tokens: Some(completion.max_tokens),
            temperature: Some(completion.temperature),
        }
    }

    async fn post_fallback(&self, event: &InboundEvent) {
        if let Err(error) = self
            .slack
            .post_message(
                event.channel(),
                FALLBACK_REPLY,
                Some(event.fallback_thread_ts()),
            )
            .await
        {
            tracing::error!(
                channel = event.channel(),
                error = %format!("{error:#}"),
                "failed to post fallback reply"
            );
        }
    }
}
