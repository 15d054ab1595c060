//! An immutable, composable description of "which events are in scope":
//! a set of event type tags plus a disjunction of payload subset
//! predicates.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::event::Event;

/// A value describing a subset of the log by type and payload-subset
/// disjunction. Filters are plain values: two filters built the same way
/// compare equal and produce identical `query`/`append` behaviour.
///
/// Composing a filter (`with_payload_predicate`/`with_payload_predicates`)
/// never mutates the receiver; it returns a new, independent [`Filter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    event_types: BTreeSet<String>,
    payload_predicates: Vec<Value>,
}

impl Filter {
    /// Constructs a filter over the given non-empty set of event type
    /// tags, with an optional initial list of payload subset predicates.
    ///
    /// Fails with [`Error::BadFilter`] if `types` is empty, or if any tag
    /// in it is blank.
    pub fn new<I, S>(types: I, predicates: Option<Vec<Value>>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let event_types: BTreeSet<String> = types.into_iter().map(Into::into).collect();

        if event_types.is_empty() {
            return Err(Error::BadFilter("event_types must not be empty".into()));
        }

        if event_types.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::BadFilter("event type tags must not be blank".into()));
        }

        Ok(Self {
            event_types,
            payload_predicates: predicates.unwrap_or_default(),
        })
    }

    /// Returns a new filter whose predicate list has one additional
    /// subset `{ key: value }` appended. Broadens the match (OR).
    #[must_use]
    pub fn with_payload_predicate(&self, key: impl Into<String>, value: Value) -> Self {
        let mut predicates = self.payload_predicates.clone();
        let mut object = serde_json::Map::new();
        object.insert(key.into(), value);
        predicates.push(Value::Object(object));

        Self {
            event_types: self.event_types.clone(),
            payload_predicates: predicates,
        }
    }

    /// Returns a new filter whose predicate list has one additional
    /// subset equal to `obj` (all of its keys ANDed together).
    #[must_use]
    pub fn with_payload_predicates(&self, obj: Value) -> Self {
        let mut predicates = self.payload_predicates.clone();
        predicates.push(obj);

        Self {
            event_types: self.event_types.clone(),
            payload_predicates: predicates,
        }
    }

    /// The filter's event type tags.
    pub fn event_types(&self) -> &BTreeSet<String> {
        &self.event_types
    }

    /// The filter's ordered list of payload subset predicates. An empty
    /// list means "no payload constraint".
    pub fn payload_predicates(&self) -> &[Value] {
        &self.payload_predicates
    }

    /// Authoritative matching semantics: an event matches iff its type
    /// is in the filter's type set, and either the predicate list is
    /// empty or at least one predicate is a JSON subset of the event's
    /// payload.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.event_types.contains(&event.event_type) {
            return false;
        }

        self.payload_predicates.is_empty()
            || self
                .payload_predicates
                .iter()
                .any(|predicate| is_subset(predicate, &event.payload))
    }
}

/// The JSON "`@>`" relation: `sub` is contained in `sup` iff every key of
/// `sub` is present in `sup` with a matching value, recursively for
/// nested objects, and by containment of every listed element for
/// arrays. Scalars compare by structural equality.
fn is_subset(sub: &Value, sup: &Value) -> bool {
    match (sub, sup) {
        (Value::Object(sub_map), Value::Object(sup_map)) => sub_map
            .iter()
            .all(|(k, v)| sup_map.get(k).is_some_and(|sv| is_subset(v, sv))),
        (Value::Array(sub_items), Value::Array(sup_items)) => sub_items
            .iter()
            .all(|item| sup_items.iter().any(|candidate| is_subset(item, candidate))),
        _ => sub == sup,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn event(event_type: &str, payload: Value) -> Event {
        Event {
            sequence_number: 1,
            occurred_at: chrono::Utc::now(),
            event_type: event_type.to_string(),
            payload,
            metadata: json!({}),
        }
    }

    #[test]
    fn empty_types_is_bad_filter() {
        assert!(matches!(
            Filter::new(Vec::<&str>::new(), None),
            Err(Error::BadFilter(_))
        ));
    }

    #[test]
    fn blank_type_is_bad_filter() {
        assert!(matches!(
            Filter::new(["  "], None),
            Err(Error::BadFilter(_))
        ));
    }

    #[test]
    fn type_only_filter_matches_by_type_alone() {
        let f = Filter::new(["A"], None).unwrap();
        assert!(f.matches(&event("A", json!({"x": 1}))));
        assert!(!f.matches(&event("B", json!({"x": 1}))));
    }

    #[test]
    fn empty_predicate_object_matches_every_payload() {
        let f = Filter::new(["A"], Some(vec![json!({})])).unwrap();
        assert!(f.matches(&event("A", json!({"x": 1}))));
        assert!(f.matches(&event("A", json!({}))));
    }

    #[test]
    fn predicates_are_disjunction() {
        let f = Filter::new(["T"], None)
            .unwrap()
            .with_payload_predicate("x", json!(1))
            .with_payload_predicate("x", json!(3));

        assert!(f.matches(&event("T", json!({"x": 1}))));
        assert!(!f.matches(&event("T", json!({"x": 2}))));
        assert!(f.matches(&event("T", json!({"x": 3}))));
    }

    #[test]
    fn nested_object_containment() {
        let f = Filter::new(["T"], None)
            .unwrap()
            .with_payload_predicates(json!({"b": {"c": 2}}));

        assert!(f.matches(&event("T", json!({"a": 1, "b": {"c": 2}}))));
        assert!(!f.matches(&event("T", json!({"a": 1, "b": {"c": 3}}))));
    }

    #[test]
    fn array_containment_is_per_element() {
        let f = Filter::new(["T"], None)
            .unwrap()
            .with_payload_predicates(json!({"tags": ["a", "b"]}));

        assert!(f.matches(&event("T", json!({"tags": ["a", "b", "c"]}))));
        assert!(!f.matches(&event("T", json!({"tags": ["a"]}))));
    }

    #[test]
    fn duplicate_predicates_are_idempotent() {
        let f = Filter::new(["T"], None)
            .unwrap()
            .with_payload_predicate("x", json!(1))
            .with_payload_predicate("x", json!(1));

        assert_eq!(f.payload_predicates().len(), 2);
        assert!(f.matches(&event("T", json!({"x": 1}))));
        assert!(!f.matches(&event("T", json!({"x": 2}))));
    }

    #[test]
    fn with_predicate_does_not_mutate_original() {
        let base = Filter::new(["T"], None).unwrap();
        let extended = base.with_payload_predicate("x", json!(1));

        assert!(base.payload_predicates().is_empty());
        assert_eq!(extended.payload_predicates().len(), 1);
    }
}
