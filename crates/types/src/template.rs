//! Template document definitions.
//!
//! A template is a named, pre-authored bundle of field values applied to a
//! form in one action. Options are keyed by field key and preserve authoring
//! order; each option optionally carries a merge operator and, for relative
//! date options, a time range unit.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A named bundle of field values applied to the form in a single action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    /// Stable identifier used for lookups and telemetry.
    pub id: String,
    /// Human-readable name shown in the template picker.
    pub name: String,
    /// Inactive templates are excluded from selection but remain loadable.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Per-field options in authoring order, keyed by field key.
    #[serde(default = "default_option_map")]
    pub options: IndexMap<String, TemplateFieldOption>,
}

/// A single field entry inside a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TemplateFieldOption {
    /// Authored payload. Shape depends on the field type: scalar string,
    /// string list, comma-joined tag list, or a signed count for relative
    /// date options. `null` clears the field where the merge policy allows.
    #[serde(default)]
    pub value: JsonValue,
    /// Merge operator. Absent means legacy behavior: replace for tag lists,
    /// absolute parse for date fields, plain overwrite elsewhere.
    #[serde(default)]
    pub operator: Option<TemplateOperator>,
    /// Time range unit for `relative` date options.
    #[serde(default)]
    pub range: Option<TimeRange>,
    /// Optional display completion for reference values (e.g. an email
    /// recipient's rendered label). Carried through untouched.
    #[serde(default)]
    pub value_completion: Option<String>,
}

/// Closed set of per-field merge operators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemplateOperator {
    /// Parse the authored value as an absolute date/datetime.
    Static,
    /// Interpret the authored value as a signed count of `range` units from now.
    Relative,
    /// Merge the authored tags into the current tag set.
    Add,
    /// Subtract the authored tags from the current tag set.
    Remove,
}

/// Time range units for relative date arithmetic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

/// A loaded collection of templates, preserving document order.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TemplateBundle {
    /// All templates in the document, active or not.
    #[serde(default)]
    pub templates: Vec<Template>,
}

impl TemplateBundle {
    /// Returns the templates eligible for selection (active flag set).
    pub fn active(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter().filter(|template| template.active)
    }

    /// Looks up a template by identifier, active or not.
    pub fn by_id(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|template| template.id == id)
    }
}

fn default_true() -> bool {
    true
}

fn default_option_map() -> IndexMap<String, TemplateFieldOption> {
    IndexMap::new()
}
