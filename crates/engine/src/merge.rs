//! Template merge engine.
//!
//! Orchestrates the per-field merge of a template into the form state store,
//! dispatching on the field descriptor type: scalars follow the descriptor's
//! overwrite policy, tag lists go through the tag merge table, date fields
//! are resolved and always overwritten, and authorization-gated references
//! are silently dropped when the acting user lacks access. Template writes
//! never mark a field dirty, so a later template can overwrite the outcome
//! of an earlier one while user-typed content stays protected.

use chrono::{DateTime, Utc};
use intake_registry::{FieldDescriptor, FieldRegistry, FieldType, OverwritePolicy};
use intake_types::{FieldValue, Template};
use intake_util::clamp_to_max_chars;
use tracing::{debug, warn};

use crate::{
    coerce::coerce_field_value,
    dates::resolve_date_option,
    store::FormStateStore,
    tags::{resolve_tag_merge, tags_from_option_value},
};

/// Authorization seam consulted for permission-gated reference fields.
///
/// Implemented by the embedding application; the engine only asks whether a
/// candidate value is within the acting user's scope. Denial is not an
/// error, the value is simply dropped.
pub trait AuthorizationScope {
    /// Returns true when the acting user may set `candidate` on `field_key`.
    fn is_permitted(&self, field_key: &str, candidate: &FieldValue) -> bool;
}

/// Scope that permits every value; the default for embedders without gating.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermitAll;

impl AuthorizationScope for PermitAll {
    fn is_permitted(&self, _field_key: &str, _candidate: &FieldValue) -> bool {
        true
    }
}

/// Summary of a single template application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Fields whose observable state changed.
    pub applied: Vec<String>,
    /// Template option keys that did not resolve against the registry.
    pub skipped_unknown: Vec<String>,
    /// Gated fields whose template value was dropped by the authorization scope.
    pub dropped_unauthorized: Vec<String>,
}

/// Applies templates to a form state store.
pub struct TemplateMergeEngine<'a> {
    registry: &'a FieldRegistry,
    authorization: &'a dyn AuthorizationScope,
}

impl<'a> TemplateMergeEngine<'a> {
    /// Creates a merge engine over the given registry and authorization scope.
    pub fn new(registry: &'a FieldRegistry, authorization: &'a dyn AuthorizationScope) -> Self {
        Self { registry, authorization }
    }

    /// Merges every option of `template` into `store`, in authoring order.
    ///
    /// The merge runs to completion before returning, so a workflow
    /// evaluation triggered afterwards never observes a half-merged form.
    pub fn apply(&self, template: &Template, store: &mut FormStateStore, now: DateTime<Utc>) -> MergeReport {
        let mut report = MergeReport::default();

        for (field_key, option) in &template.options {
            let Some(descriptor) = self.registry.describe(field_key) else {
                warn!(template = %template.id, field = %field_key, "template option references unknown field, skipping");
                report.skipped_unknown.push(field_key.clone());
                continue;
            };

            match descriptor.field_type {
                FieldType::TagList => {
                    let Some(field) = store.field(field_key) else { continue };
                    let template_tags = tags_from_option_value(&option.value);
                    let merged = resolve_tag_merge(&field.value.as_tags(), Some(&template_tags), option.operator, field.dirty);
                    if store.commit_engine_value(field_key, FieldValue::Tags(merged)) {
                        report.applied.push(field_key.clone());
                    }
                }
                FieldType::Date | FieldType::Datetime => {
                    // Template-supplied dates always take effect: re-applying a
                    // template is the explicit act of resetting scheduling fields.
                    let resolved = resolve_date_option(option, now, descriptor.field_type).unwrap_or(FieldValue::Empty);
                    if store.commit_engine_value(field_key, resolved) {
                        report.applied.push(field_key.clone());
                    }
                }
                _ => self.apply_scalar(descriptor, field_key, &option.value, store, &mut report),
            }
        }

        debug!(
            template = %template.id,
            applied = report.applied.len(),
            skipped = report.skipped_unknown.len(),
            dropped = report.dropped_unauthorized.len(),
            "template merge completed"
        );
        report
    }

    fn apply_scalar(
        &self,
        descriptor: &FieldDescriptor,
        field_key: &str,
        raw_value: &serde_json::Value,
        store: &mut FormStateStore,
        report: &mut MergeReport,
    ) {
        let Some(field) = store.field(field_key) else { return };

        let mut candidate = coerce_field_value(descriptor.field_type, raw_value);
        if let (FieldValue::Text(text), Some(max_length)) = (&candidate, descriptor.max_length) {
            candidate = FieldValue::Text(clamp_to_max_chars(text, max_length));
        }

        if descriptor.authorization_gated && !candidate.is_empty() && !self.authorization.is_permitted(field_key, &candidate) {
            report.dropped_unauthorized.push(field_key.to_string());
            // A stale previous value outside the acting user's scope must not
            // survive either.
            let current = field.value.clone();
            if !current.is_empty() && !self.authorization.is_permitted(field_key, &current) && store.commit_engine_value(field_key, FieldValue::Empty)
            {
                report.applied.push(field_key.to_string());
            }
            return;
        }

        let overwrite = match descriptor.overwrite {
            OverwritePolicy::Always => true,
            OverwritePolicy::DirtyProtected => !field.dirty,
        };
        if overwrite && store.commit_engine_value(field_key, candidate) {
            report.applied.push(field_key.to_string());
        }
    }
}
