//! # Intake Field Registry
//!
//! Static per-field metadata for the form engine: value type, constraints,
//! overwrite policy, and authorization gating. The registry is a read-only
//! lookup built once per form session from a field catalog document; every
//! other component dispatches type-specific behavior through it. Unknown
//! field keys are a recoverable "ignore" condition, never fatal.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

/// Value type of a form field, driving merge and evaluation dispatch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Single-line structured text (titles, subjects).
    Text,
    /// Multi-line free text (message bodies).
    Freeform,
    /// Single selection from a flat option list.
    Select,
    /// Single selection from a tree of options, encoded as a path id.
    TreeSelect,
    /// Multiple selections from a tree of options.
    MultiTreeSelect,
    /// An ordered, deduplicated tag set.
    TagList,
    /// Calendar date without time.
    Date,
    /// Date with time at minute granularity.
    Datetime,
}

impl FieldType {
    /// Returns true for types that hold a date or datetime value.
    pub fn is_temporal(self) -> bool {
        matches!(self, FieldType::Date | FieldType::Datetime)
    }

    /// Returns true for types carrying more than one selection.
    pub fn is_multi_valued(self) -> bool {
        matches!(self, FieldType::MultiTreeSelect | FieldType::TagList)
    }
}

/// Template overwrite policy for scalar fields.
///
/// Date and datetime fields are always overwritten by template application
/// regardless of this policy; tag lists follow their own merge table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Overwrite only while the field is clean; user input wins once dirty.
    #[default]
    DirtyProtected,
    /// Overwrite on every template application, dirty or not.
    Always,
}

/// Static metadata for a single form field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDescriptor {
    /// Field key referenced by templates, rules, and the state store.
    pub key: String,
    /// Value type driving merge and evaluation dispatch.
    pub field_type: FieldType,
    /// Human-readable label surfaced by the embedding UI.
    #[serde(default)]
    pub label: Option<String>,
    /// Maximum character count enforced on committed text values.
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Default value applied when the form opens. Does not mark the field dirty.
    #[serde(default)]
    pub default: JsonValue,
    /// Template overwrite policy for scalar values.
    #[serde(default)]
    pub overwrite: OverwritePolicy,
    /// When set, template-supplied values for this field must pass the
    /// session's authorization scope or they are silently dropped.
    #[serde(default)]
    pub authorization_gated: bool,
}

/// On-disk field catalog document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FieldCatalog {
    /// Descriptors in authoring order.
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

/// Read-only field descriptor lookup, keyed by field key.
///
/// Field order follows the catalog document so the embedding UI can render
/// fields in a predictable sequence.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    descriptors: IndexMap<String, FieldDescriptor>,
}

impl FieldRegistry {
    /// Builds a registry from a catalog, keeping the last descriptor when a
    /// key appears more than once.
    pub fn from_catalog(catalog: FieldCatalog) -> Self {
        let mut descriptors = IndexMap::new();
        for descriptor in catalog.fields {
            if descriptors.contains_key(&descriptor.key) {
                warn!(field = %descriptor.key, "duplicate field descriptor, keeping the later entry");
            }
            descriptors.insert(descriptor.key.clone(), descriptor);
        }
        Self { descriptors }
    }

    /// Looks up the descriptor for a field key. `None` means the key is
    /// unknown and the caller should skip the entry.
    pub fn describe(&self, key: &str) -> Option<&FieldDescriptor> {
        self.descriptors.get(key)
    }

    /// Iterates descriptors in catalog order.
    pub fn descriptors(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.descriptors.values()
    }

    /// Number of registered fields.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true when the registry holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Loads a field catalog file with automatic format detection.
///
/// YAML and JSON are both accepted; JSON is a subset of YAML so a single
/// parser covers both.
///
/// # Errors
///
/// Returns an error when the file cannot be read or does not deserialize
/// into a [`FieldCatalog`].
pub fn parse_field_catalog_file(file_path: impl AsRef<Path>) -> Result<FieldRegistry> {
    let file_path = file_path.as_ref();
    let file_content =
        fs::read_to_string(file_path).with_context(|| format!("Failed to read field catalog file: {}", file_path.display()))?;

    let catalog: FieldCatalog = serde_yaml::from_str(&file_content)
        .with_context(|| format!("Failed to parse field catalog file: {}", file_path.display()))?;

    Ok(FieldRegistry::from_catalog(catalog))
}
