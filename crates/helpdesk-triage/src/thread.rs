//! Normalized message model and the thread snapshot accessor.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// A Slack message as seen by the rule engine, from thread replies or channel history.
pub struct ThreadMessage {
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub reactions: Vec<String>,
}

impl ThreadMessage {
    /// A message is a root when it has no thread reference or references itself.
    pub fn is_root(&self) -> bool {
        match self.thread_ts.as_deref() {
            None => true,
            Some(thread_ts) => thread_ts == self.ts,
        }
    }

    /// Thread identifier: the root timestamp.
    pub fn thread_id(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(self.ts.as_str())
    }

    pub fn is_bot_authored(&self) -> bool {
        self.bot_id
            .as_deref()
            .is_some_and(|bot_id| !bot_id.trim().is_empty())
            || self.subtype.as_deref() == Some("bot_message")
    }

    pub fn ts_key(&self) -> SlackTsKey {
        SlackTsKey::parse(&self.ts)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
/// Orderable form of a Slack `ts` (`seconds.micros`); unparsable parts sort as zero.
pub struct SlackTsKey {
    pub seconds: u64,
    pub micros: u64,
}

impl SlackTsKey {
    pub fn parse(ts: &str) -> Self {
        let mut parts = ts.trim().splitn(2, '.');
        let seconds = parts
            .next()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);
        let micros = parts
            .next()
            .map(|fraction| {
                let padded = format!("{fraction:0<6}");
                padded
                    .get(..6)
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        Self { seconds, micros }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Identity of this responder, used to tag its own messages as `assistant`.
pub struct ResponderIdentity {
    pub user_id: String,
    pub bot_id: Option<String>,
}

impl ResponderIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            bot_id: None,
        }
    }

    pub fn with_bot_id(mut self, bot_id: Option<String>) -> Self {
        self.bot_id = bot_id.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn authored(&self, message: &ThreadMessage) -> bool {
        if message.user.as_deref() == Some(self.user_id.as_str()) {
            return true;
        }
        match (self.bot_id.as_deref(), message.bot_id.as_deref()) {
            (Some(own), Some(other)) => own == other,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Chronologically ordered view of one thread, rebuilt from Slack on every event.
pub struct ThreadSnapshot {
    pub channel: String,
    pub root_ts: String,
    messages: Vec<ThreadMessage>,
}

impl ThreadSnapshot {
    pub fn new(
        channel: impl Into<String>,
        root_ts: impl Into<String>,
        mut messages: Vec<ThreadMessage>,
    ) -> Self {
        messages.sort_by(|left, right| chronological(left, right));
        Self {
            channel: channel.into(),
            root_ts: root_ts.into(),
            messages,
        }
    }

    /// Builds a snapshot whose root is taken from the first message's thread id.
    pub fn from_replies(channel: impl Into<String>, messages: Vec<ThreadMessage>) -> Option<Self> {
        let root_ts = messages
            .iter()
            .min_by(|left, right| chronological(left, right))
            .map(|message| message.thread_id().to_string())?;
        Some(Self::new(channel, root_ts, messages))
    }

    pub fn messages(&self) -> &[ThreadMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages strictly older than `ts`; the triggering message itself is excluded.
    pub fn history_before(&self, ts: &str) -> Vec<&ThreadMessage> {
        let cutoff = SlackTsKey::parse(ts);
        self.messages
            .iter()
            .filter(|message| message.ts != ts && message.ts_key() < cutoff)
            .collect()
    }

    /// True once a bot other than the responder has posted into the thread.
    pub fn has_companion_post(
        &self,
        responder: &ResponderIdentity,
        companion_bot_id: Option<&str>,
    ) -> bool {
        self.messages.iter().any(|message| {
            if !message.is_bot_authored() || responder.authored(message) {
                return false;
            }
            match companion_bot_id {
                Some(expected) => message.bot_id.as_deref() == Some(expected),
                None => true,
            }
        })
    }

    pub fn assignee_mention(&self) -> Option<String> {
        crate::escalation::extract_assignee(self.messages.iter().map(|m| m.text.as_str()))
    }
}

fn chronological(left: &ThreadMessage, right: &ThreadMessage) -> Ordering {
    left.ts_key()
        .cmp(&right.ts_key())
        .then_with(|| left.ts.cmp(&right.ts))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{ResponderIdentity, SlackTsKey, ThreadMessage, ThreadSnapshot};

    pub(crate) fn user_message(ts: &str, thread_ts: Option<&str>, text: &str) -> ThreadMessage {
        ThreadMessage {
            ts: ts.to_string(),
            thread_ts: thread_ts.map(ToOwned::to_owned),
            text: text.to_string(),
            user: Some("U1".to_string()),
            ..ThreadMessage::default()
        }
    }

    pub(crate) fn bot_message(
        ts: &str,
        thread_ts: &str,
        user: &str,
        bot_id: &str,
        text: &str,
    ) -> ThreadMessage {
        ThreadMessage {
            ts: ts.to_string(),
            thread_ts: Some(thread_ts.to_string()),
            text: text.to_string(),
            user: Some(user.to_string()),
            bot_id: Some(bot_id.to_string()),
            ..ThreadMessage::default()
        }
    }

    #[test]
    fn unit_root_detection_uses_thread_ts_equality() {
        assert!(user_message("10.0", None, "a").is_root());
        assert!(user_message("10.0", Some("10.0"), "a").is_root());
        assert!(!user_message("11.0", Some("10.0"), "a").is_root());
        assert_eq!(user_message("11.0", Some("10.0"), "a").thread_id(), "10.0");
        assert_eq!(user_message("10.0", None, "a").thread_id(), "10.0");
    }

    #[test]
    fn unit_ts_key_orders_numerically_not_lexically() {
        assert!(SlackTsKey::parse("9.5") < SlackTsKey::parse("10.1"));
        assert!(SlackTsKey::parse("10.000002") > SlackTsKey::parse("10.000001"));
        assert_eq!(SlackTsKey::parse("10.5").micros, 500_000);
        assert_eq!(SlackTsKey::parse("garbage"), SlackTsKey::default());
    }

    #[test]
    fn functional_snapshot_sorts_and_excludes_current_message_from_history() {
        let snapshot = ThreadSnapshot::new(
            "C1",
            "10.0",
            vec![
                user_message("12.0", Some("10.0"), "third"),
                user_message("10.0", Some("10.0"), "root"),
                user_message("11.0", Some("10.0"), "second"),
            ],
        );
        let texts = snapshot
            .messages()
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["root", "second", "third"]);

        let history = snapshot.history_before("12.0");
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|message| message.ts != "12.0"));
    }

    #[test]
    fn functional_from_replies_uses_earliest_thread_id() {
        let snapshot = ThreadSnapshot::from_replies(
            "C1",
            vec![
                user_message("11.0", Some("10.0"), "reply"),
                user_message("10.0", Some("10.0"), "root"),
            ],
        )
        .expect("snapshot");
        assert_eq!(snapshot.root_ts, "10.0");
        assert!(ThreadSnapshot::from_replies("C1", Vec::new()).is_none());
    }

    #[test]
    fn functional_companion_post_ignores_responder_messages() {
        let responder = ResponderIdentity::new("UBOT").with_bot_id(Some("BSELF".to_string()));
        let own_only = ThreadSnapshot::new(
            "C1",
            "10.0",
            vec![
                user_message("10.0", None, "printer jammed"),
                bot_message("10.5", "10.0", "UBOT", "BSELF", "On it"),
            ],
        );
        assert!(!own_only.has_companion_post(&responder, None));

        let with_companion = ThreadSnapshot::new(
            "C1",
            "10.0",
            vec![
                user_message("10.0", None, "printer jammed"),
                bot_message("10.2", "10.0", "UTRIAGE", "BTRIAGE", "Assignee: <@U777>"),
            ],
        );
        assert!(with_companion.has_companion_post(&responder, None));
        assert!(with_companion.has_companion_post(&responder, Some("BTRIAGE")));
        assert!(!with_companion.has_companion_post(&responder, Some("BOTHER")));
        assert_eq!(
            with_companion.assignee_mention().as_deref(),
            Some("<@U777>")
        );
    }
}
