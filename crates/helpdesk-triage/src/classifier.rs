//! Keyword-based issue classification.

use serde::{Deserialize, Serialize};

use crate::config::ClassifierGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCategory {
    AccessRequest,
    SaasAccess,
    Network,
    Authentication,
    Email,
    Performance,
    Software,
    Hardware,
    Other,
}

impl IssueCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Network => "Network/VPN",
            Self::Authentication => "Authentication/Access",
            Self::Email => "Email",
            Self::Performance => "Performance",
            Self::Software => "Software/Apps",
            Self::Hardware => "Device/Hardware",
            Self::AccessRequest => "Access Request",
            Self::SaasAccess => "SaaS Access",
            Self::Other => "Other",
        }
    }

    pub fn is_access_type(&self) -> bool {
        matches!(self, Self::AccessRequest | Self::SaasAccess)
    }
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Returns the category of the first group with a keyword contained in `text`.
pub fn classify(text: &str, groups: &[ClassifierGroup]) -> IssueCategory {
    let normalized = text.to_lowercase();
    groups
        .iter()
        .find(|group| contains_any(&normalized, &group.keywords))
        .map(|group| group.category)
        .unwrap_or(IssueCategory::Other)
}

/// Access-type requests skip the model and get the canned acknowledgment.
pub fn is_access_request(text: &str, category: IssueCategory, access_keywords: &[String]) -> bool {
    category.is_access_type() || contains_any(&text.to_lowercase(), access_keywords)
}

/// Returns the first keyword contained in already-lowercased `haystack`.
pub(crate) fn first_contained<'a>(haystack: &str, keywords: &'a [String]) -> Option<&'a str> {
    keywords
        .iter()
        .map(|keyword| keyword.trim())
        .filter(|keyword| !keyword.is_empty())
        .find(|keyword| haystack.contains(&keyword.to_lowercase()))
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    first_contained(haystack, keywords).is_some()
}

#[cfg(test)]
mod tests {
    use super::{classify, is_access_request, IssueCategory};
    use crate::config::{default_access_keywords, default_classifier_groups, ClassifierGroup};

    fn classify_default(text: &str) -> IssueCategory {
        classify(text, &default_classifier_groups())
    }

    #[test]
    fn unit_network_keywords_map_to_network() {
        assert_eq!(classify_default("VPN not connecting"), IssueCategory::Network);
        assert_eq!(classify_default("wifi keeps dropping"), IssueCategory::Network);
        assert_eq!(
            classify_default("The INTERNET is down on floor 3"),
            IssueCategory::Network
        );
    }

    #[test]
    fn unit_unmatched_text_is_other() {
        assert_eq!(classify_default("hello there"), IssueCategory::Other);
        assert_eq!(classify_default(""), IssueCategory::Other);
    }

    #[test]
    fn unit_access_groups_take_precedence_over_generic_auth() {
        assert_eq!(
            classify_default("I need access to the finance drive"),
            IssueCategory::AccessRequest
        );
        assert_eq!(
            classify_default("can't get into figma"),
            IssueCategory::SaasAccess
        );
        assert_eq!(
            classify_default("password reset please"),
            IssueCategory::Authentication
        );
    }

    #[test]
    fn unit_each_default_group_is_reachable() {
        assert_eq!(classify_default("outlook calendar broken"), IssueCategory::Email);
        assert_eq!(classify_default("everything is so slow"), IssueCategory::Performance);
        assert_eq!(classify_default("please install zoom"), IssueCategory::Software);
        assert_eq!(classify_default("my laptop screen cracked"), IssueCategory::Hardware);
    }

    #[test]
    fn functional_custom_group_order_is_precedence_order() {
        let groups = vec![
            ClassifierGroup {
                category: IssueCategory::Email,
                keywords: vec!["vpn".to_string()],
            },
            ClassifierGroup {
                category: IssueCategory::Network,
                keywords: vec!["vpn".to_string()],
            },
        ];
        assert_eq!(classify("vpn issue", &groups), IssueCategory::Email);
    }

    #[test]
    fn unit_access_request_detection_uses_keywords_or_category() {
        let keywords = default_access_keywords();
        assert!(is_access_request(
            "Can you add me to the #design channel",
            IssueCategory::Other,
            &keywords
        ));
        assert!(is_access_request("jira", IssueCategory::SaasAccess, &keywords));
        assert!(!is_access_request(
            "VPN not connecting",
            IssueCategory::Network,
            &keywords
        ));
    }

    #[test]
    fn labels_match_report_names() {
        assert_eq!(IssueCategory::Network.to_string(), "Network/VPN");
        assert_eq!(IssueCategory::SaasAccess.label(), "SaaS Access");
    }
}
