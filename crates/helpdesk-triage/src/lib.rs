//! Thread-state and escalation rule engine for the IT helpdesk responder.
//!
//! Everything in this crate is pure: it operates on normalized thread
//! snapshots and inbound events and never talks to Slack or the model
//! directly, so the dispatcher's decisions can be tested against fixtures.

pub mod classifier;
pub mod config;
pub mod context;
pub mod escalation;
pub mod prompts;
pub mod routing;
pub mod thread;

pub use classifier::{classify, is_access_request, IssueCategory};
pub use config::{
    ClassifierGroup, CompanionWaitConfig, CompletionSettings, KeywordConfig, TriageConfig,
};
pub use context::build_conversation_context;
pub use escalation::{
    compose_followup_reply, escalation_outcome_for_reaction, evaluate_followup_signals,
    extract_assignee, extract_assignee_from_text, render_escalation_notice,
    resolve_assignee_placeholder, ComposedReply, EscalationOutcome, EscalationSignals,
    ASSIGNEE_LABEL, ASSIGNEE_PLACEHOLDER, ESCALATION_NOTICE_MARKER, FALLBACK_ASSIGNEE_PHRASE,
    FEEDBACK_FOOTER_MARKER,
};
pub use routing::{route_event, DispatchRoute, InboundEvent, MentionEvent, MessageEvent, ReactionEvent};
pub use thread::{ResponderIdentity, SlackTsKey, ThreadMessage, ThreadSnapshot};
