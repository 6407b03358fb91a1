//! Form state store.
//!
//! Holds the live per-field state for one open form: value, dirty flag,
//! visibility, required flag, and options filter. Every committed mutation
//! strictly increases the store revision; value commits additionally stamp
//! the field with the revision they landed at, which the scheduler uses to
//! reject stale lookup completions.

use indexmap::{IndexMap, IndexSet};
use intake_registry::FieldRegistry;
use intake_types::FieldValue;

use crate::coerce::coerce_field_value;

/// Live state of a single form field.
#[derive(Debug, Clone, PartialEq)]
pub struct FormFieldState {
    /// Field key, matching the descriptor registry.
    pub key: String,
    /// Current value.
    pub value: FieldValue,
    /// True once the user has written a non-empty value into the field
    /// since the form was opened. Never set by engine writes.
    pub dirty: bool,
    /// Whether the field is rendered.
    pub visible: bool,
    /// Whether a value must be present on submit.
    pub required: bool,
    /// Restriction of the permitted option ids, when a workflow filter is
    /// in effect. `None` means unrestricted.
    pub options_filter: Option<IndexSet<String>>,
    /// Store revision at which the value last changed.
    pub value_revision: u64,
}

impl FormFieldState {
    fn new(key: String, value: FieldValue) -> Self {
        Self {
            key,
            value,
            dirty: false,
            visible: true,
            required: false,
            options_filter: None,
            value_revision: 0,
        }
    }
}

/// Mutable store for all field states of one open form.
///
/// All mutation goes through the committed-mutation API below; each method
/// reports whether it changed observable state and bumps the revision only
/// when it did.
#[derive(Debug, Clone, Default)]
pub struct FormStateStore {
    fields: IndexMap<String, FormFieldState>,
    revision: u64,
}

impl FormStateStore {
    /// Creates a store seeded from the registry: one field per descriptor,
    /// in catalog order, populated with the descriptor's default value.
    /// Defaults do not mark fields dirty and do not bump the revision.
    pub fn open(registry: &FieldRegistry) -> Self {
        let fields = registry
            .descriptors()
            .map(|descriptor| {
                let value = coerce_field_value(descriptor.field_type, &descriptor.default);
                (descriptor.key.clone(), FormFieldState::new(descriptor.key.clone(), value))
            })
            .collect();
        Self { fields, revision: 0 }
    }

    /// Current store revision. Strictly increases on every committed mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the state for a field, when the key is known.
    pub fn field(&self, key: &str) -> Option<&FormFieldState> {
        self.fields.get(key)
    }

    /// Iterates field states in catalog order.
    pub fn fields(&self) -> impl Iterator<Item = &FormFieldState> {
        self.fields.values()
    }

    /// Consumes the store, yielding the final field map for the submit
    /// boundary.
    pub fn into_fields(self) -> IndexMap<String, FormFieldState> {
        self.fields
    }

    /// Commits a user-authored value. Marks the field dirty when the written
    /// value is non-empty, even if it equals the current value.
    ///
    /// Returns true when observable state changed.
    pub fn commit_user_value(&mut self, key: &str, value: FieldValue) -> bool {
        let Some(field) = self.fields.get_mut(key) else {
            return false;
        };

        let value_changed = field.value != value;
        let dirty_changed = !field.dirty && !value.is_empty();
        if !value_changed && !dirty_changed {
            return false;
        }

        self.revision += 1;
        if value_changed {
            field.value = value;
            field.value_revision = self.revision;
        }
        if dirty_changed {
            field.dirty = true;
        }
        true
    }

    /// Commits an engine-computed value (template merge or workflow
    /// directive). Never touches the dirty flag, so a later template can
    /// still overwrite the outcome of an earlier one.
    pub fn commit_engine_value(&mut self, key: &str, value: FieldValue) -> bool {
        let Some(field) = self.fields.get_mut(key) else {
            return false;
        };
        if field.value == value {
            return false;
        }

        self.revision += 1;
        field.value = value;
        field.value_revision = self.revision;
        true
    }

    /// Sets field visibility.
    pub fn set_visible(&mut self, key: &str, visible: bool) -> bool {
        let Some(field) = self.fields.get_mut(key) else {
            return false;
        };
        if field.visible == visible {
            return false;
        }
        self.revision += 1;
        field.visible = visible;
        true
    }

    /// Sets the required flag.
    pub fn set_required(&mut self, key: &str, required: bool) -> bool {
        let Some(field) = self.fields.get_mut(key) else {
            return false;
        };
        if field.required == required {
            return false;
        }
        self.revision += 1;
        field.required = required;
        true
    }

    /// Replaces the options filter for a field.
    pub fn set_options_filter(&mut self, key: &str, filter: Option<IndexSet<String>>) -> bool {
        let Some(field) = self.fields.get_mut(key) else {
            return false;
        };
        if field.options_filter == filter {
            return false;
        }
        self.revision += 1;
        field.options_filter = filter;
        true
    }
}
