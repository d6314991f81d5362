//! NIP-01 subscription filters.

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// A relay query. Empty lists and `None` bounds are left out of the wire form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u32>,
    #[serde(rename = "#e", default, skip_serializing_if = "Vec::is_empty")]
    pub e_tags: Vec<String>,
    #[serde(rename = "#p", default, skip_serializing_if = "Vec::is_empty")]
    pub p_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.ids.push(id.into());
        self
    }

    pub fn author(mut self, pubkey: impl Into<String>) -> Self {
        self.authors.push(pubkey.into());
        self
    }

    pub fn kind(mut self, kind: u32) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn p_tag(mut self, pubkey: impl Into<String>) -> Self {
        self.p_tags.push(pubkey.into());
        self
    }

    pub fn e_tag(mut self, id: impl Into<String>) -> Self {
        self.e_tags.push(id.into());
        self
    }

    pub fn since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `event` satisfies every populated condition of this filter.
    ///
    /// Relays are not trusted to apply filters faithfully, so results are
    /// re-checked locally.
    pub fn matches(&self, event: &Event) -> bool {
        let contains = |list: &[String], value: &str| list.is_empty() || list.iter().any(|v| v == value);
        let tagged = |list: &[String], name: &str| {
            list.is_empty() || event.tag_values(name).any(|v| list.iter().any(|want| want == v))
        };

        contains(&self.ids, &event.id)
            && contains(&self.authors, &event.pubkey)
            && (self.kinds.is_empty() || self.kinds.contains(&event.kind))
            && tagged(&self.e_tags, "e")
            && tagged(&self.p_tags, "p")
            && self.since.is_none_or(|since| event.created_at >= since)
            && self.until.is_none_or(|until| event.created_at <= until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{kind, Tag};

    #[test]
    fn wire_form_uses_tag_keys_and_skips_empty_fields() {
        let filter = Filter::new().kind(kind::CONTACTS).p_tag("abc").limit(10);
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json, serde_json::json!({ "kinds": [3], "#p": ["abc"], "limit": 10 }));
    }

    #[test]
    fn matches_checks_every_condition() {
        let event = Event::new("alice", 100, kind::NOTE, vec![Tag::new(["p", "bob"])], "hi");

        assert!(Filter::new().matches(&event));
        assert!(Filter::new().author("alice").kind(kind::NOTE).matches(&event));
        assert!(Filter::new().p_tag("bob").since(100).matches(&event));
        assert!(!Filter::new().author("carol").matches(&event));
        assert!(!Filter::new().kind(kind::METADATA).matches(&event));
        assert!(!Filter::new().since(101).matches(&event));
        assert!(!Filter::new().e_tag("missing").matches(&event));
    }
}
