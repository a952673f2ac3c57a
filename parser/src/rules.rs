//! Per-element write actions.
//!
//! A rule table selects what the writer does with each data element:
//! pass it through, drop it, blank it, or replace its value. Rules are
//! keyed by canonical tag key (`x00100010`), dictionary keyword
//! (`PatientName`), group name (`Patient`), or the literal `default`.
//! This is the mechanism behind de-identification workflows.

use medview_core::{DataDictionary, Element};
use std::collections::HashMap;

/// The action a rule applies to a data element on write.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Write the element unchanged.
    Copy,
    /// Exclude the element from the output.
    Remove,
    /// Write the element with an empty value (zero length).
    Clear,
    /// Write the element with the given replacement value.
    Replace(String),
}

/// A table of write actions, consulted once per data element.
///
/// Selection priority: a rule keyed by the element's canonical tag key
/// or dictionary keyword wins over a rule keyed by its group name,
/// which wins over the `default` rule. With no applicable rule the
/// element is copied.
#[derive(Debug, Clone, Default)]
pub struct WriteRules {
    rules: HashMap<String, Action>,
}

impl WriteRules {
    /// Create an empty rule table (everything is copied).
    pub fn new() -> WriteRules {
        WriteRules::default()
    }

    /// Add a rule under the given key, replacing any previous rule
    /// with the same key.
    pub fn insert(&mut self, key: impl Into<String>, action: Action) -> &mut Self {
        self.rules.insert(key.into(), action);
        self
    }

    /// Whether the table holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Select the action applying to the given element.
    pub fn action_for<D>(&self, element: &Element, dict: &D) -> &Action
    where
        D: DataDictionary,
    {
        if let Some(action) = self.rules.get(&element.key()) {
            return action;
        }
        if let Some(entry) = dict.by_tag(element.tag) {
            if let Some(action) = self.rules.get(entry.keyword) {
                return action;
            }
        }
        if let Some(name) = dict.group_name(element.tag.group()) {
            if let Some(action) = self.rules.get(name) {
                return action;
            }
        }
        self.rules.get("default").unwrap_or(&Action::Copy)
    }
}

impl std::iter::FromIterator<(String, Action)> for WriteRules {
    fn from_iter<I: IntoIterator<Item = (String, Action)>>(iter: I) -> WriteRules {
        WriteRules {
            rules: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medview_core::{Tag, Value, VR};
    use medview_dictionary_std::StandardDataDictionary;

    fn element(group: u16, elem: u16) -> Element {
        Element::new(Tag(group, elem), VR::LO, Value::from("x"))
    }

    #[test]
    fn keyword_beats_group_beats_default() {
        let mut rules = WriteRules::new();
        rules.insert("default", Action::Remove);
        rules.insert("Patient", Action::Clear);
        rules.insert("PatientName", Action::Replace("Anonymized".into()));
        let dict = StandardDataDictionary;

        // keyword match
        assert_eq!(
            rules.action_for(&element(0x0010, 0x0010), &dict),
            &Action::Replace("Anonymized".into())
        );
        // group match
        assert_eq!(
            rules.action_for(&element(0x0010, 0x0020), &dict),
            &Action::Clear
        );
        // default
        assert_eq!(
            rules.action_for(&element(0x0008, 0x0060), &dict),
            &Action::Remove
        );
    }

    #[test]
    fn canonical_key_wins_over_keyword() {
        let mut rules = WriteRules::new();
        rules.insert("PatientName", Action::Remove);
        rules.insert("x00100010", Action::Copy);
        let dict = StandardDataDictionary;
        assert_eq!(
            rules.action_for(&element(0x0010, 0x0010), &dict),
            &Action::Copy
        );
    }

    #[test]
    fn missing_default_means_copy() {
        let rules = WriteRules::new();
        let dict = StandardDataDictionary;
        assert_eq!(
            rules.action_for(&element(0x0008, 0x0060), &dict),
            &Action::Copy
        );
    }
}
