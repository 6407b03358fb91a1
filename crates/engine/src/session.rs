//! Form session scheduling.
//!
//! A [`FormSession`] owns the form state store for one open form and
//! serializes every mutation through a single event queue: user edits,
//! template applications, and external lookup completions. Each event is
//! processed to completion, including the bounded workflow fixpoint, before
//! the next one starts, so template merges and rule evaluation share
//! exclusive access to the store by construction. Re-entrant submissions
//! enqueue and drain in the outer call.

use std::{collections::VecDeque, sync::Arc};

use chrono::Utc;
use intake_registry::FieldRegistry;
use intake_types::{FieldValue, Template, WorkflowRuleSet};
use intake_util::clamp_to_max_chars;
use tracing::{debug, warn};

use crate::{
    error::EngineError,
    merge::{AuthorizationScope, PermitAll, TemplateMergeEngine},
    store::FormStateStore,
    workflow::{EvaluationLimits, EvaluationReport, WorkflowEvaluator},
};

/// Events accepted by the session queue.
#[derive(Debug, Clone)]
pub enum FormEvent {
    /// The user edited a field.
    UserEdit {
        /// Field key.
        key: String,
        /// New value as entered.
        value: FieldValue,
    },
    /// The user applied a template.
    ApplyTemplate {
        /// The template to merge.
        template: Template,
    },
    /// An external lookup completed. `revision` is the store revision the
    /// lookup was issued against; completions older than the field's last
    /// value change are discarded.
    LookupResolved {
        /// Store revision captured when the lookup was issued.
        revision: u64,
        /// Field the lookup resolves.
        key: String,
        /// Resolved value, or a collaborator failure message.
        result: Result<FieldValue, String>,
    },
}

/// Observable updates produced while processing events.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// A field's observable state changed.
    FieldChanged {
        /// Field key.
        key: String,
        /// Store revision after the change.
        revision: u64,
    },
    /// A template merge completed.
    TemplateApplied {
        /// Identifier of the merged template.
        template_id: String,
        /// Fields whose state changed.
        applied: Vec<String>,
        /// Gated fields dropped by the authorization scope.
        dropped_unauthorized: Vec<String>,
    },
    /// Workflow evaluation reached its fixpoint.
    EvaluationSettled {
        /// Number of passes executed.
        passes: usize,
        /// Fields changed by applied directives.
        changed_fields: Vec<String>,
    },
    /// Workflow evaluation exceeded the iteration cap.
    EvaluationDiverged {
        /// Passes executed before giving up.
        iterations: usize,
    },
    /// A stale lookup completion was discarded.
    LookupDiscarded {
        /// Field the lookup was issued for.
        key: String,
    },
    /// An external lookup reported a failure; the field keeps its last
    /// known-good state.
    LookupFailed {
        /// Field the lookup was issued for.
        key: String,
        /// Collaborator-provided failure description.
        message: String,
    },
    /// The event source closed and the session is complete.
    SessionClosed,
}

/// Single-threaded scheduler owning one form's state.
pub struct FormSession {
    registry: Arc<FieldRegistry>,
    rules: WorkflowRuleSet,
    object: String,
    authorization: Arc<dyn AuthorizationScope + Send + Sync>,
    limits: EvaluationLimits,
    store: FormStateStore,
    queue: VecDeque<FormEvent>,
    draining: bool,
}

impl FormSession {
    /// Opens a session: seeds the store from the registry defaults and loads
    /// the rule set. No evaluation runs yet; call [`FormSession::refresh`]
    /// (or let the runner do it) to establish the initial workflow state.
    pub fn open(registry: Arc<FieldRegistry>, rules: WorkflowRuleSet, object: impl Into<String>) -> Self {
        let store = FormStateStore::open(&registry);
        Self {
            registry,
            rules,
            object: object.into(),
            authorization: Arc::new(PermitAll),
            limits: EvaluationLimits::default(),
            store,
            queue: VecDeque::new(),
            draining: false,
        }
    }

    /// Replaces the authorization scope consulted for gated fields.
    pub fn with_authorization(mut self, authorization: Arc<dyn AuthorizationScope + Send + Sync>) -> Self {
        self.authorization = authorization;
        self
    }

    /// Overrides the evaluation limits snapshot used per pass.
    pub fn with_limits(mut self, limits: EvaluationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Read access to the live store.
    pub fn store(&self) -> &FormStateStore {
        &self.store
    }

    /// Record type this session evaluates rules for.
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Consumes the session, yielding the final store for the submit boundary.
    pub fn into_store(self) -> FormStateStore {
        self.store
    }

    /// Runs workflow evaluation without a triggering event, establishing the
    /// initial rule-driven visibility and values when the form opens.
    pub fn refresh(&mut self) -> Result<Vec<SessionUpdate>, EngineError> {
        let report = self.run_evaluation()?;
        Ok(vec![settled_update(report)])
    }

    /// Submits an event and drains the queue to completion.
    ///
    /// Each queued event runs to completion (merge plus bounded fixpoint)
    /// before the next. A re-entrant submission enqueues the event and
    /// returns immediately; the outer drain picks it up.
    ///
    /// # Errors
    ///
    /// Returns the first [`EngineError`] hit while draining. Applied
    /// directives stay applied and unprocessed events stay queued for the
    /// next submission.
    pub fn submit(&mut self, event: FormEvent) -> Result<Vec<SessionUpdate>, EngineError> {
        self.queue.push_back(event);
        if self.draining {
            return Ok(Vec::new());
        }

        self.draining = true;
        let mut updates = Vec::new();
        while let Some(next_event) = self.queue.pop_front() {
            match self.process_event(next_event) {
                Ok(mut event_updates) => updates.append(&mut event_updates),
                Err(error) => {
                    self.draining = false;
                    return Err(error);
                }
            }
        }
        self.draining = false;
        Ok(updates)
    }

    fn process_event(&mut self, event: FormEvent) -> Result<Vec<SessionUpdate>, EngineError> {
        match event {
            FormEvent::UserEdit { key, value } => self.process_user_edit(&key, value),
            FormEvent::ApplyTemplate { template } => self.process_template(&template),
            FormEvent::LookupResolved { revision, key, result } => self.process_lookup(revision, &key, result),
        }
    }

    fn process_user_edit(&mut self, key: &str, value: FieldValue) -> Result<Vec<SessionUpdate>, EngineError> {
        let Some(descriptor) = self.registry.describe(key) else {
            warn!(field = %key, "user edit for unknown field, ignoring");
            return Ok(Vec::new());
        };

        let value = match (value, descriptor.max_length) {
            (FieldValue::Text(text), Some(max_length)) => FieldValue::Text(clamp_to_max_chars(&text, max_length)),
            (other, _) => other,
        };

        if !self.store.commit_user_value(key, value) {
            return Ok(Vec::new());
        }

        let mut updates = vec![SessionUpdate::FieldChanged {
            key: key.to_string(),
            revision: self.store.revision(),
        }];
        updates.push(settled_update(self.run_evaluation()?));
        Ok(updates)
    }

    fn process_template(&mut self, template: &Template) -> Result<Vec<SessionUpdate>, EngineError> {
        let Self {
            registry,
            authorization,
            store,
            ..
        } = self;
        let merge_engine = TemplateMergeEngine::new(registry.as_ref(), authorization.as_ref());
        let report = merge_engine.apply(template, store, Utc::now());

        let mut updates = vec![SessionUpdate::TemplateApplied {
            template_id: template.id.clone(),
            applied: report.applied.clone(),
            dropped_unauthorized: report.dropped_unauthorized,
        }];
        if !report.applied.is_empty() {
            updates.push(settled_update(self.run_evaluation()?));
        }
        Ok(updates)
    }

    fn process_lookup(&mut self, revision: u64, key: &str, result: Result<FieldValue, String>) -> Result<Vec<SessionUpdate>, EngineError> {
        let Some(field) = self.store.field(key) else {
            warn!(field = %key, "lookup completion for unknown field, ignoring");
            return Ok(Vec::new());
        };

        let resolved = match result {
            Ok(resolved) => resolved,
            Err(message) => {
                return Err(EngineError::LookupFailed {
                    field: key.to_string(),
                    message,
                });
            }
        };

        if revision < field.value_revision {
            debug!(field = %key, issued_at = revision, current = field.value_revision, "discarding stale lookup completion");
            return Ok(vec![SessionUpdate::LookupDiscarded { key: key.to_string() }]);
        }

        if !self.store.commit_engine_value(key, resolved) {
            return Ok(Vec::new());
        }

        let mut updates = vec![SessionUpdate::FieldChanged {
            key: key.to_string(),
            revision: self.store.revision(),
        }];
        updates.push(settled_update(self.run_evaluation()?));
        Ok(updates)
    }

    fn run_evaluation(&mut self) -> Result<EvaluationReport, EngineError> {
        let Self {
            registry,
            rules,
            object,
            limits,
            store,
            ..
        } = self;
        WorkflowEvaluator::new(registry.as_ref(), rules).with_limits(*limits).evaluate(store, object)
    }
}

fn settled_update(report: EvaluationReport) -> SessionUpdate {
    SessionUpdate::EvaluationSettled {
        passes: report.passes,
        changed_fields: report.changed_fields.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use intake_registry::FieldCatalog;
    use intake_types::TemplateFieldOption;
    use serde_json::json;

    fn registry() -> Arc<FieldRegistry> {
        let catalog: FieldCatalog = serde_yaml::from_str(
            r#"
fields:
  - key: title
    field_type: text
    max_length: 8
    overwrite: always
  - key: state
    field_type: select
    default: open
  - key: pending_time
    field_type: datetime
  - key: customer
    field_type: select
"#,
        )
        .expect("parse catalog");
        Arc::new(FieldRegistry::from_catalog(catalog))
    }

    fn pending_rules() -> WorkflowRuleSet {
        serde_yaml::from_str(
            r#"
rules:
  - name: hide pending time
    object: ticket
    condition_selected:
      state: { operator: is_not, value: pending reminder }
    perform:
      pending_time: { operator: hide }
  - name: show pending time
    object: ticket
    condition_selected:
      state: { operator: is, value: pending reminder }
    perform:
      pending_time: { operator: show }
"#,
        )
        .expect("parse rules")
    }

    #[test]
    fn refresh_establishes_initial_workflow_state() {
        let mut session = FormSession::open(registry(), pending_rules(), "ticket");

        session.refresh().expect("refresh");
        assert!(!session.store().field("pending_time").expect("field").visible);
    }

    #[test]
    fn user_edit_triggers_re_evaluation() {
        let mut session = FormSession::open(registry(), pending_rules(), "ticket");
        session.refresh().expect("refresh");

        let updates = session
            .submit(FormEvent::UserEdit {
                key: "state".into(),
                value: FieldValue::Id("pending reminder".into()),
            })
            .expect("submit");

        assert!(session.store().field("pending_time").expect("field").visible);
        assert!(updates.iter().any(|update| matches!(update, SessionUpdate::FieldChanged { key, .. } if key == "state")));
        assert!(updates.iter().any(|update| matches!(update, SessionUpdate::EvaluationSettled { .. })));
    }

    #[test]
    fn user_edits_are_clamped_to_max_length() {
        let mut session = FormSession::open(registry(), WorkflowRuleSet::default(), "ticket");

        session
            .submit(FormEvent::UserEdit {
                key: "title".into(),
                value: FieldValue::Text("way too long a title".into()),
            })
            .expect("submit");

        assert_eq!(session.store().field("title").expect("field").value, FieldValue::Text("way too ".into()));
    }

    #[test]
    fn template_event_merges_then_evaluates() {
        let mut session = FormSession::open(registry(), pending_rules(), "ticket");
        session.refresh().expect("refresh");

        let mut options: IndexMap<String, TemplateFieldOption> = IndexMap::new();
        options.insert(
            "state".into(),
            TemplateFieldOption {
                value: json!("pending reminder"),
                ..TemplateFieldOption::default()
            },
        );
        let template = Template {
            id: "tpl".into(),
            name: "Pending".into(),
            active: true,
            options,
        };

        let updates = session.submit(FormEvent::ApplyTemplate { template }).expect("submit");

        assert!(session.store().field("pending_time").expect("field").visible);
        assert!(updates.iter().any(|update| matches!(update, SessionUpdate::TemplateApplied { template_id, .. } if template_id == "tpl")));
    }

    #[test]
    fn stale_lookup_completion_is_discarded() {
        let mut session = FormSession::open(registry(), WorkflowRuleSet::default(), "ticket");

        session
            .submit(FormEvent::UserEdit {
                key: "customer".into(),
                value: FieldValue::Id("newer".into()),
            })
            .expect("submit");
        let issued_before = 0;

        let updates = session
            .submit(FormEvent::LookupResolved {
                revision: issued_before,
                key: "customer".into(),
                result: Ok(FieldValue::Id("stale".into())),
            })
            .expect("submit");

        assert_eq!(updates, vec![SessionUpdate::LookupDiscarded { key: "customer".into() }]);
        assert_eq!(session.store().field("customer").expect("field").value, FieldValue::Id("newer".into()));
    }

    #[test]
    fn fresh_lookup_completion_commits() {
        let mut session = FormSession::open(registry(), WorkflowRuleSet::default(), "ticket");

        let updates = session
            .submit(FormEvent::LookupResolved {
                revision: session.store().revision(),
                key: "customer".into(),
                result: Ok(FieldValue::Id("resolved".into())),
            })
            .expect("submit");

        assert!(updates.iter().any(|update| matches!(update, SessionUpdate::FieldChanged { key, .. } if key == "customer")));
        assert_eq!(session.store().field("customer").expect("field").value, FieldValue::Id("resolved".into()));
        assert!(!session.store().field("customer").expect("field").dirty, "lookup completions are engine writes");
    }

    #[test]
    fn failed_lookup_surfaces_error_and_keeps_state() {
        let mut session = FormSession::open(registry(), WorkflowRuleSet::default(), "ticket");
        session
            .submit(FormEvent::UserEdit {
                key: "customer".into(),
                value: FieldValue::Id("known-good".into()),
            })
            .expect("submit");

        let error = session
            .submit(FormEvent::LookupResolved {
                revision: session.store().revision(),
                key: "customer".into(),
                result: Err("upstream timeout".into()),
            })
            .expect_err("lookup failure surfaces");

        assert!(matches!(error, EngineError::LookupFailed { ref field, .. } if field == "customer"));
        assert_eq!(session.store().field("customer").expect("field").value, FieldValue::Id("known-good".into()));
    }

    #[test]
    fn unknown_field_events_are_ignored() {
        let mut session = FormSession::open(registry(), WorkflowRuleSet::default(), "ticket");

        let updates = session
            .submit(FormEvent::UserEdit {
                key: "mystery".into(),
                value: FieldValue::Text("x".into()),
            })
            .expect("submit");

        assert!(updates.is_empty());
        assert_eq!(session.store().revision(), 0);
    }
}
