//! Bounded, role-tagged conversation context for follow-up completions.

use helpdesk_ai::Message;

use crate::escalation::FEEDBACK_FOOTER_MARKER;
use crate::thread::{ResponderIdentity, ThreadMessage};

/// Builds `[system, ..history, new_message]` for the completion call.
///
/// History is filtered (footer boilerplate and empty texts dropped), sorted
/// chronologically and truncated to the most recent `max_turns` entries.
pub fn build_conversation_context(
    history: &[&ThreadMessage],
    new_message: &str,
    system_prompt: &str,
    responder: &ResponderIdentity,
    max_turns: usize,
) -> Vec<Message> {
    let mut kept = history
        .iter()
        .copied()
        .filter(|message| !message.text.trim().is_empty())
        .filter(|message| !message.text.contains(FEEDBACK_FOOTER_MARKER))
        .collect::<Vec<_>>();
    kept.sort_by_key(|message| message.ts_key());
    let skip = kept.len().saturating_sub(max_turns);

    let mut context = Vec::with_capacity(kept.len() - skip + 2);
    context.push(Message::system(system_prompt));
    context.extend(kept.into_iter().skip(skip).map(|message| {
        if responder.authored(message) {
            Message::assistant_text(message.text.clone())
        } else {
            Message::user(message.text.clone())
        }
    }));
    context.push(Message::user(new_message));
    context
}
