//! Conditional workflow rule documents.
//!
//! A workflow rule pairs a condition map (field key to condition) with a
//! perform map (field key to action). Rules are authored externally, loaded
//! once per form session, and evaluated in declaration order so later rules
//! may override earlier directives on the same field.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A single condition-to-action rule scoped to a record type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowRule {
    /// Human-readable rule name used in diagnostics.
    pub name: String,
    /// Record type the rule applies to (for example, `ticket`).
    pub object: String,
    /// When set, a matching rule ends the evaluation pass after its
    /// directives are applied.
    #[serde(default)]
    pub stop_after_match: bool,
    /// Conditions keyed by field key. An empty map matches unconditionally.
    #[serde(default = "default_condition_map")]
    pub condition_selected: IndexMap<String, Condition>,
    /// Actions keyed by the field key they affect.
    #[serde(default = "default_perform_map")]
    pub perform: IndexMap<String, RuleAction>,
}

/// A single field condition inside a rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    /// Comparison operator applied between the field value and `value`.
    pub operator: ConditionOperator,
    /// Expected payload: a scalar for equality/containment checks, a list
    /// for membership checks, a number for ordering comparisons.
    #[serde(default)]
    pub value: JsonValue,
}

/// Closed set of condition operators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Field value equals the expected scalar, or is a member of the
    /// expected list.
    Is,
    /// Negation of `Is`.
    IsNot,
    /// Text fields: substring match. Multi-valued fields: the expected
    /// element(s) are present in the selection.
    Contains,
    /// Negation of `Contains`.
    ContainsNot,
    /// Field value is one of the expected list entries.
    OneOf,
    /// Numeric comparison, field value greater than expected.
    GreaterThan,
    /// Numeric comparison, field value less than expected.
    LessThan,
}

/// Closed set of actions a matching rule may perform on a field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum RuleAction {
    /// Make the field visible.
    Show,
    /// Hide the field. Hiding also clears the required flag and the value.
    Hide,
    /// Clear the field value without touching visibility.
    Remove,
    /// Overwrite the field value, including user-entered values. A list
    /// payload on a multi-valued field replaces the selected set exactly;
    /// an empty string clears the field.
    Select {
        select: JsonValue,
    },
    /// Toggle the required flag without altering visibility.
    SetMandatory {
        #[serde(default = "default_true")]
        mandatory: bool,
    },
    /// Restrict the permitted option ids and drop selections that fall
    /// outside the restriction.
    Filter {
        restrict_values: Vec<String>,
    },
}

/// A loaded, ordered collection of workflow rules.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WorkflowRuleSet {
    /// Rules in declaration order.
    #[serde(default)]
    pub rules: Vec<WorkflowRule>,
}

impl WorkflowRuleSet {
    /// Returns the rules scoped to the given record type, in declaration order.
    pub fn for_object<'a>(&'a self, object: &'a str) -> impl Iterator<Item = &'a WorkflowRule> {
        self.rules.iter().filter(move |rule| rule.object == object)
    }

    /// Collects every field key referenced by a condition of a rule for the
    /// given record type. The evaluator uses this set to decide whether an
    /// applied directive warrants another pass.
    pub fn condition_fields(&self, object: &str) -> indexmap::IndexSet<String> {
        self.for_object(object)
            .flat_map(|rule| rule.condition_selected.keys().cloned())
            .collect()
    }
}

fn default_true() -> bool {
    true
}

fn default_condition_map() -> IndexMap<String, Condition> {
    IndexMap::new()
}

fn default_perform_map() -> IndexMap<String, RuleAction> {
    IndexMap::new()
}
