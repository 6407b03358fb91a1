//! Workflow directives: the concrete field-state patch a matched rule's
//! action produces for one evaluation pass.

use indexmap::IndexSet;
use intake_registry::FieldDescriptor;
use intake_types::{FieldValue, RuleAction};

use crate::{coerce::coerce_field_value, store::FormStateStore};

/// A field-state patch computed from one rule action.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// Field the patch applies to.
    pub field: String,
    /// The patch itself.
    pub patch: FieldPatch,
}

/// Closed set of field-state patches.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPatch {
    /// Make the field visible.
    Show,
    /// Hide the field, clearing its required flag and value.
    Hide,
    /// Toggle the required flag.
    SetRequired { required: bool },
    /// Overwrite the value. Workflow directives take precedence over
    /// dirtiness, so this applies to user-entered values too.
    SetValue { value: FieldValue },
    /// Restrict the permitted option ids and drop excluded selections.
    RestrictOptions { permitted: IndexSet<String> },
}

/// Translates a rule action into a directive for the given field.
pub fn directive_for_action(descriptor: &FieldDescriptor, field_key: &str, action: &RuleAction) -> Directive {
    let patch = match action {
        RuleAction::Show => FieldPatch::Show,
        RuleAction::Hide => FieldPatch::Hide,
        RuleAction::Remove => FieldPatch::SetValue { value: FieldValue::Empty },
        RuleAction::Select { select } => FieldPatch::SetValue {
            value: coerce_field_value(descriptor.field_type, select),
        },
        RuleAction::SetMandatory { mandatory } => FieldPatch::SetRequired { required: *mandatory },
        RuleAction::Filter { restrict_values } => FieldPatch::RestrictOptions {
            permitted: restrict_values.iter().cloned().collect(),
        },
    };

    Directive {
        field: field_key.to_string(),
        patch,
    }
}

/// Applies a directive to the store. Returns true when observable state
/// changed.
pub fn apply_directive(store: &mut FormStateStore, directive: &Directive) -> bool {
    let field_key = directive.field.as_str();
    match &directive.patch {
        FieldPatch::Show => store.set_visible(field_key, true),
        FieldPatch::Hide => {
            let hidden = store.set_visible(field_key, false);
            let unrequired = store.set_required(field_key, false);
            let cleared = store.commit_engine_value(field_key, FieldValue::Empty);
            hidden || unrequired || cleared
        }
        FieldPatch::SetRequired { required } => store.set_required(field_key, *required),
        FieldPatch::SetValue { value } => store.commit_engine_value(field_key, value.clone()),
        FieldPatch::RestrictOptions { permitted } => {
            let filtered = store.set_options_filter(field_key, Some(permitted.clone()));
            let dropped = drop_excluded_selection(store, field_key, permitted);
            filtered || dropped
        }
    }
}

fn drop_excluded_selection(store: &mut FormStateStore, field_key: &str, permitted: &IndexSet<String>) -> bool {
    let Some(field) = store.field(field_key) else {
        return false;
    };

    let retained = match &field.value {
        FieldValue::Id(id) if !permitted.contains(id) => FieldValue::Empty,
        FieldValue::Ids(ids) => {
            let kept: Vec<String> = ids.iter().filter(|id| permitted.contains(*id)).cloned().collect();
            if kept.len() == ids.len() {
                return false;
            }
            if kept.is_empty() { FieldValue::Empty } else { FieldValue::Ids(kept) }
        }
        _ => return false,
    };

    store.commit_engine_value(field_key, retained)
}
