//! Shared type definitions for the Intake form engine.
//!
//! This crate holds the data model consumed by the registry and the engine:
//! typed field values, template documents, and conditional workflow rule
//! documents. Authored documents intentionally preserve authoring order (via
//! `IndexMap`) so templates and rules apply in a predictable sequence.

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

pub mod template;
pub mod workflow;

pub use template::{Template, TemplateBundle, TemplateFieldOption, TemplateOperator, TimeRange};
pub use workflow::{Condition, ConditionOperator, RuleAction, WorkflowRule, WorkflowRuleSet};

/// A concrete form field value.
///
/// Authored documents (templates, rules) carry loosely typed
/// [`serde_json::Value`] payloads; the engine converts them into this closed
/// set of variants using the field's descriptor, so all downstream merge and
/// evaluation logic can match exhaustively instead of sniffing JSON shapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// No value set. Cleared fields return to this state.
    Empty,
    /// Free or structured text (title, body, custom text attributes).
    Text(String),
    /// A single selection identified by id (select and tree-select fields).
    Id(String),
    /// An ordered list of selections (multi-tree-select fields).
    Ids(Vec<String>),
    /// An ordered, deduplicated tag set.
    Tags(IndexSet<String>),
    /// A calendar date without a time component.
    Date(NaiveDate),
    /// A point in time, minute granularity.
    DateTime(DateTime<Utc>),
}

impl FieldValue {
    /// Returns true when the value is absent or observably blank.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(text) | FieldValue::Id(text) => text.trim().is_empty(),
            FieldValue::Ids(ids) => ids.is_empty(),
            FieldValue::Tags(tags) => tags.is_empty(),
            FieldValue::Date(_) | FieldValue::DateTime(_) => false,
        }
    }

    /// Returns the tag set view of this value, treating non-tag values as empty.
    pub fn as_tags(&self) -> IndexSet<String> {
        match self {
            FieldValue::Tags(tags) => tags.clone(),
            _ => IndexSet::new(),
        }
    }

    /// Returns the textual representation used for comparisons, when one exists.
    pub fn as_comparable_text(&self) -> Option<String> {
        match self {
            FieldValue::Empty => None,
            FieldValue::Text(text) | FieldValue::Id(text) => Some(text.clone()),
            FieldValue::Date(date) => Some(date.format("%Y-%m-%d").to_string()),
            FieldValue::DateTime(moment) => Some(moment.to_rfc3339()),
            FieldValue::Ids(_) | FieldValue::Tags(_) => None,
        }
    }

    /// Returns the selection ids carried by this value, for single and
    /// multi-valued selection fields alike.
    pub fn selection_ids(&self) -> Vec<String> {
        match self {
            FieldValue::Id(id) => vec![id.clone()],
            FieldValue::Ids(ids) => ids.clone(),
            _ => Vec::new(),
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_counts_as_empty() {
        assert!(FieldValue::Empty.is_empty());
        assert!(FieldValue::Text("   ".into()).is_empty());
        assert!(FieldValue::Ids(Vec::new()).is_empty());
        assert!(!FieldValue::Text("3 high".into()).is_empty());
    }

    #[test]
    fn selection_ids_cover_single_and_multi_values() {
        let single = FieldValue::Id("2".into());
        let multi = FieldValue::Ids(vec!["a".into(), "b".into()]);

        assert_eq!(single.selection_ids(), vec!["2".to_string()]);
        assert_eq!(multi.selection_ids(), vec!["a".to_string(), "b".to_string()]);
        assert!(FieldValue::Text("plain".into()).selection_ids().is_empty());
    }
}
