//! Escalation detection, assignee extraction and escalation reply composition.

use std::sync::OnceLock;

use regex::{NoExpand, Regex};

use crate::classifier::first_contained;
use crate::thread::ThreadSnapshot;

/// Label written by the companion triage bot. Changing its format means bumping
/// [`ASSIGNEE_LABEL_FORMAT_VERSION`] and the patterns in `assignee_patterns`.
pub const ASSIGNEE_LABEL: &str = "Assignee:";
pub const ASSIGNEE_LABEL_FORMAT_VERSION: u32 = 1;

/// Token the model is asked to use for the human who will follow up.
pub const ASSIGNEE_PLACEHOLDER: &str = "[ASSIGNEE]";
pub const FALLBACK_ASSIGNEE_PHRASE: &str = "the IT support team";

/// Present in every feedback footer; the context builder drops messages carrying it.
pub const FEEDBACK_FOOTER_MARKER: &str = "React with :thumbsdown: to escalate";

/// Present in every escalation notice; the metrics aggregator counts it.
pub const ESCALATION_NOTICE_MARKER: &str = "issue needs escalation";

const MODEL_ESCALATION_SIGNAL: &str = "escalat";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscalationOutcome {
    pub fired: bool,
    pub assignee_mention: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Independent follow-up triggers; either one fires escalation.
pub struct EscalationSignals {
    pub stuck_keyword: Option<String>,
    pub model_signalled: bool,
}

impl EscalationSignals {
    pub fn fired(&self) -> bool {
        self.stuck_keyword.is_some() || self.model_signalled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Reply text plus the optional footer, posted as a separate thread message.
pub struct ComposedReply {
    pub body: String,
    pub footer: Option<String>,
}

struct AssigneePatterns {
    mention: Regex,
    plain_name: Regex,
}

fn assignee_patterns() -> &'static AssigneePatterns {
    static PATTERNS: OnceLock<AssigneePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| AssigneePatterns {
        mention: Regex::new(r"Assignee:\**[ \t]*(<@([A-Z0-9]+)(?:\|[^>]*)?>)")
            .expect("assignee mention pattern is valid"),
        plain_name: Regex::new(r"Assignee:\**[ \t]*([A-Za-z][A-Za-z'.-]*[ \t]+[A-Za-z][A-Za-z'.-]*)")
            .expect("assignee name pattern is valid"),
    })
}

/// Whole-word "the IT team" style phrasing; "IT teams" and "IT teammate" stay put.
fn generic_team_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(?:[Tt]he IT team|IT team|IT staff)\b")
            .expect("generic team pattern is valid")
    })
}

/// Extracts the assignee from a single message text.
///
/// A `<@U…>` mention right after the label wins; otherwise a two-word name is
/// accepted. Mentions carrying a display suffix (`<@U1|jane>`) are normalized.
pub fn extract_assignee_from_text(text: &str) -> Option<String> {
    if !text.contains(ASSIGNEE_LABEL) {
        return None;
    }
    let patterns = assignee_patterns();
    if let Some(captures) = patterns.mention.captures(text) {
        return captures
            .get(2)
            .map(|user_id| format!("<@{}>", user_id.as_str()));
    }
    patterns
        .plain_name
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().trim().to_string())
}

/// Scans texts in thread order and stops at the first one carrying the label.
pub fn extract_assignee<'a, I>(texts: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    texts
        .into_iter()
        .find(|text| text.contains(ASSIGNEE_LABEL))
        .and_then(extract_assignee_from_text)
}

/// Reaction names arrive as `-1` or with a modifier such as `-1::skin-tone-3`.
fn base_reaction_name(name: &str) -> &str {
    let name = name.trim().trim_matches(':');
    name.split_once("::skin-tone-")
        .map_or(name, |(base, _)| base)
}

pub fn is_down_vote(reaction_name: &str, down_vote_reactions: &[String]) -> bool {
    let name = base_reaction_name(reaction_name);
    down_vote_reactions
        .iter()
        .any(|candidate| base_reaction_name(candidate) == name)
}

pub fn escalation_outcome_for_reaction(
    reaction_name: &str,
    down_vote_reactions: &[String],
    thread: &ThreadSnapshot,
) -> EscalationOutcome {
    if !is_down_vote(reaction_name, down_vote_reactions) {
        return EscalationOutcome::default();
    }
    EscalationOutcome {
        fired: true,
        assignee_mention: thread.assignee_mention(),
    }
}

pub fn evaluate_followup_signals(
    followup_text: &str,
    generated_reply: &str,
    stuck_keywords: &[String],
) -> EscalationSignals {
    EscalationSignals {
        stuck_keyword: first_contained(&followup_text.to_lowercase(), stuck_keywords)
            .map(ToOwned::to_owned),
        model_signalled: generated_reply
            .to_lowercase()
            .contains(MODEL_ESCALATION_SIGNAL),
    }
}

/// Replaces the placeholder with the mention, or the fallback phrase when unresolved.
pub fn resolve_assignee_placeholder(text: &str, assignee_mention: Option<&str>) -> String {
    text.replace(
        ASSIGNEE_PLACEHOLDER,
        assignee_mention.unwrap_or(FALLBACK_ASSIGNEE_PHRASE),
    )
}

pub fn compose_followup_reply(
    generated_reply: &str,
    signals: &EscalationSignals,
    assignee_mention: Option<&str>,
) -> ComposedReply {
    let mut body = resolve_assignee_placeholder(generated_reply.trim(), assignee_mention);
    if !signals.fired() {
        return ComposedReply { body, footer: None };
    }

    if let Some(mention) = assignee_mention {
        body = generic_team_pattern()
            .replace_all(&body, NoExpand(mention))
            .into_owned();
    }

    ComposedReply {
        body,
        footer: Some(render_feedback_footer(assignee_mention)),
    }
}

pub fn render_feedback_footer(assignee_mention: Option<&str>) -> String {
    format!(
        "Still stuck? {FEEDBACK_FOOTER_MARKER} this issue and {} will be notified to step in.",
        assignee_mention.unwrap_or(FALLBACK_ASSIGNEE_PHRASE)
    )
}

pub fn render_escalation_notice(assignee_mention: Option<&str>) -> String {
    match assignee_mention {
        Some(mention) => format!(
            ":red_circle: This {ESCALATION_NOTICE_MARKER}. {mention}, the automated troubleshooting didn't resolve it. Please take a look when you can."
        ),
        None => format!(
            ":red_circle: This {ESCALATION_NOTICE_MARKER}. No assignee was found on this ticket, so {FALLBACK_ASSIGNEE_PHRASE} will pick it up shortly."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_stuck_keywords;
    use crate::thread::tests::{bot_message, user_message};
    use crate::thread::ThreadSnapshot;

    fn down_votes() -> Vec<String> {
        vec!["-1".to_string(), "thumbsdown".to_string()]
    }

    #[test]
    fn unit_extracts_structured_mention() {
        assert_eq!(
            extract_assignee_from_text("Assignee: <@U123>").as_deref(),
            Some("<@U123>")
        );
        assert_eq!(
            extract_assignee_from_text("*Assignee:* <@U9ABC|jane>\nPriority: P2").as_deref(),
            Some("<@U9ABC>")
        );
    }

    #[test]
    fn unit_falls_back_to_two_word_name() {
        assert_eq!(
            extract_assignee_from_text("Ticket created\nAssignee: Jane Doe\nPriority: High")
                .as_deref(),
            Some("Jane Doe")
        );
        assert_eq!(extract_assignee_from_text("Assignee: Unassigned"), None);
    }

    #[test]
    fn regression_label_is_case_sensitive() {
        assert_eq!(extract_assignee_from_text("assignee: <@U123>"), None);
    }

    #[test]
    fn functional_first_labelled_message_wins_and_stops_scan() {
        let texts = [
            "VPN is down",
            "Assignee: <@U111>",
            "Assignee: <@U222>",
        ];
        assert_eq!(extract_assignee(texts).as_deref(), Some("<@U111>"));

        let unparsable_first = ["Assignee: tbd", "Assignee: <@U222>"];
        assert_eq!(extract_assignee(unparsable_first), None);
    }

    #[test]
    fn functional_thumbsdown_reaction_resolves_assignee_from_thread() {
        let thread = ThreadSnapshot::new(
            "C1",
            "10.0",
            vec![
                user_message("10.0", None, "Laptop won't boot"),
                bot_message("10.1", "10.0", "UTRIAGE", "BTRIAGE", "Assignee: <@U123>"),
            ],
        );
        let outcome = escalation_outcome_for_reaction("thumbsdown", &down_votes(), &thread);
        assert!(outcome.fired);
        assert_eq!(outcome.assignee_mention.as_deref(), Some("<@U123>"));

        let notice = render_escalation_notice(outcome.assignee_mention.as_deref());
        assert!(notice.contains("<@U123>"));
        assert!(notice.contains(ESCALATION_NOTICE_MARKER));
    }

    #[test]
    fn functional_reaction_without_label_uses_fallback_phrase() {
        let thread = ThreadSnapshot::new(
            "C1",
            "10.0",
            vec![user_message("10.0", None, "Laptop won't boot")],
        );
        let outcome = escalation_outcome_for_reaction(":-1:", &down_votes(), &thread);
        assert!(outcome.fired);
        assert_eq!(outcome.assignee_mention, None);

        let notice = render_escalation_notice(outcome.assignee_mention.as_deref());
        assert!(notice.contains(FALLBACK_ASSIGNEE_PHRASE));
        assert!(!notice.contains(ASSIGNEE_PLACEHOLDER));
    }

    #[test]
    fn regression_skin_tone_down_votes_fire() {
        let thread = ThreadSnapshot::new(
            "C1",
            "10.0",
            vec![bot_message("10.1", "10.0", "UTRIAGE", "BTRIAGE", "Assignee: <@U9>")],
        );
        assert!(is_down_vote("-1::skin-tone-3", &down_votes()));
        assert!(is_down_vote(":thumbsdown::skin-tone-6:", &down_votes()));
        assert!(!is_down_vote("+1::skin-tone-3", &down_votes()));

        let outcome = escalation_outcome_for_reaction("-1::skin-tone-2", &down_votes(), &thread);
        assert!(outcome.fired);
        assert_eq!(outcome.assignee_mention.as_deref(), Some("<@U9>"));
    }

    #[test]
    fn unit_other_reactions_do_not_fire() {
        let thread = ThreadSnapshot::new("C1", "10.0", Vec::new());
        let outcome = escalation_outcome_for_reaction("thumbsup", &down_votes(), &thread);
        assert_eq!(outcome, EscalationOutcome::default());
    }

    #[test]
    fn unit_stuck_keyword_and_model_signal_fire_independently() {
        let keywords = default_stuck_keywords();
        let stuck = evaluate_followup_signals("It's STILL NOT WORKING", "Try this", &keywords);
        assert_eq!(stuck.stuck_keyword.as_deref(), Some("still not working"));
        assert!(!stuck.model_signalled);
        assert!(stuck.fired());

        let model = evaluate_followup_signals("ok", "I'll Escalate this to [ASSIGNEE].", &keywords);
        assert!(model.stuck_keyword.is_none());
        assert!(model.model_signalled);

        let both = evaluate_followup_signals("tried everything", "escalating now", &keywords);
        assert!(both.stuck_keyword.is_some() && both.model_signalled);

        assert!(!evaluate_followup_signals("thanks!", "Glad it works", &keywords).fired());
    }

    #[test]
    fn functional_compose_replaces_team_phrasing_with_mention() {
        let signals = EscalationSignals {
            stuck_keyword: Some("didn't work".to_string()),
            model_signalled: false,
        };
        let reply = compose_followup_reply(
            "Sorry that didn't help. The IT team will follow up; [ASSIGNEE] has context.",
            &signals,
            Some("<@U123>"),
        );
        assert_eq!(
            reply.body,
            "Sorry that didn't help. <@U123> will follow up; <@U123> has context."
        );
        let footer = reply.footer.expect("footer when escalation fired");
        assert!(footer.contains(FEEDBACK_FOOTER_MARKER));
        assert!(footer.contains("<@U123>"));
    }

    #[test]
    fn regression_compose_only_replaces_whole_team_phrases() {
        let signals = EscalationSignals {
            stuck_keyword: Some("still broken".to_string()),
            model_signalled: false,
        };
        let reply = compose_followup_reply(
            "IT teams differ; your IT teammate or IT staff can reset it. Costs $1.",
            &signals,
            Some("<@U123>"),
        );
        assert_eq!(
            reply.body,
            "IT teams differ; your IT teammate or <@U123> can reset it. Costs $1."
        );

        let literal = compose_followup_reply("the IT team will help", &signals, Some("$0"));
        assert_eq!(literal.body, "$0 will help");
    }

    #[test]
    fn functional_compose_without_assignee_keeps_footer_with_fallback() {
        let signals = EscalationSignals {
            stuck_keyword: None,
            model_signalled: true,
        };
        let reply = compose_followup_reply("I'll escalate to [ASSIGNEE].", &signals, None);
        assert_eq!(reply.body, "I'll escalate to the IT support team.");
        let footer = reply.footer.expect("footer never dropped");
        assert!(footer.contains(FALLBACK_ASSIGNEE_PHRASE));
    }

    #[test]
    fn unit_compose_without_signal_has_no_footer_but_resolves_placeholder() {
        let reply = compose_followup_reply(
            "Glad it's fixed! Ping [ASSIGNEE] if it recurs.",
            &EscalationSignals::default(),
            None,
        );
        assert_eq!(reply.footer, None);
        assert!(!reply.body.contains(ASSIGNEE_PLACEHOLDER));
    }
}
