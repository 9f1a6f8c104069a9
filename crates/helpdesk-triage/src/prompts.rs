//! System prompts and canned replies posted by the responder.

use crate::classifier::IssueCategory;
use crate::escalation::{resolve_assignee_placeholder, ASSIGNEE_PLACEHOLDER};

/// The only failure text users ever see.
pub const FALLBACK_REPLY: &str =
    "I encountered an error processing your request. A team member will assist you shortly.";

pub fn new_ticket_system_prompt(category: IssueCategory) -> String {
    format!(
        "You are an IT support first responder bot. Your job is to:\n\
1. Acknowledge the user's issue professionally\n\
2. Provide step-by-step troubleshooting instructions\n\
3. Ask relevant diagnostic questions if needed\n\
4. Suggest common fixes based on the problem described\n\n\
Keep responses clear, concise, and helpful. Use bullet points for steps.\n\
The issue was pre-classified as: {category}.\n\
If the issue is complex, provide initial troubleshooting steps and say that {ASSIGNEE_PLACEHOLDER} will follow up if needed."
    )
}

pub fn followup_system_prompt() -> String {
    format!(
        "You are an IT support first responder bot continuing a support thread.\n\
Read the conversation so far and respond to the user's latest message.\n\
- If a previous suggestion did not help, offer the next most likely fix.\n\
- Do not repeat steps the user already tried.\n\
- If the problem needs hands-on help, permissions you cannot grant, or you have run out of \
reasonable steps, say clearly that the issue should be escalated and that {ASSIGNEE_PLACEHOLDER} will take over.\n\
Keep responses short and use bullet points for steps."
    )
}

pub fn render_new_ticket_prompt(text: &str) -> String {
    format!("IT Issue: {}", text.trim())
}

pub fn render_access_request_ack(category: IssueCategory, assignee_mention: Option<&str>) -> String {
    let template = format!(
        "Thanks! I've logged this as an access request ({category}). {ASSIGNEE_PLACEHOLDER} will review and provision it shortly. \
If there's a deadline or a manager approval involved, reply in this thread with the details."
    );
    resolve_assignee_placeholder(&template, assignee_mention)
}

pub fn render_mention_reply(user_id: &str) -> String {
    format!(
        "Hi <@{user_id}>! I'm monitoring all messages in the IT channel and will respond with helpful suggestions automatically. Just post your IT issue and I'll help troubleshoot!"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::FALLBACK_ASSIGNEE_PHRASE;

    #[test]
    fn unit_access_ack_never_leaks_placeholder() {
        let unresolved = render_access_request_ack(IssueCategory::SaasAccess, None);
        assert!(!unresolved.contains(ASSIGNEE_PLACEHOLDER));
        assert!(unresolved.contains(FALLBACK_ASSIGNEE_PHRASE));
        assert!(unresolved.contains("SaaS Access"));

        let resolved = render_access_request_ack(IssueCategory::AccessRequest, Some("<@U5>"));
        assert!(resolved.contains("<@U5> will review"));
    }

    #[test]
    fn unit_prompts_mention_category_and_placeholder() {
        let prompt = new_ticket_system_prompt(IssueCategory::Network);
        assert!(prompt.contains("Network/VPN"));
        assert!(prompt.contains(ASSIGNEE_PLACEHOLDER));
        assert!(followup_system_prompt().contains("escalated"));
        assert_eq!(render_new_ticket_prompt("  vpn down "), "IT Issue: vpn down");
    }

    #[test]
    fn unit_mention_reply_addresses_user() {
        assert!(render_mention_reply("U42").starts_with("Hi <@U42>!"));
    }
}
