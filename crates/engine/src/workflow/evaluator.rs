//! Core workflow evaluator.
//!
//! Evaluates the loaded rule set against the form state store and applies
//! the resulting directives, re-entering evaluation while applied directives
//! keep touching condition-relevant fields. The loop is a bounded fixpoint:
//! exceeding the iteration cap is a rule configuration error
//! ([`EngineError::WorkflowDivergence`]), not an infinite loop, and
//! directives applied before the cap stay applied.

use indexmap::IndexSet;
use intake_registry::FieldRegistry;
use intake_types::{WorkflowRule, WorkflowRuleSet};
use tracing::{debug, warn};

use crate::{
    error::EngineError,
    store::FormStateStore,
    workflow::{
        condition::condition_matches,
        directive::{apply_directive, directive_for_action},
    },
};

/// Per-pass configuration snapshot for the evaluator.
///
/// Passed explicitly into each evaluation so no ambient state is consulted
/// mid-pass.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationLimits {
    /// Maximum number of evaluation passes before reporting divergence.
    pub max_passes: usize,
}

impl Default for EvaluationLimits {
    fn default() -> Self {
        Self { max_passes: 10 }
    }
}

/// Evaluator phases. One evaluation request walks
/// `Evaluating -> Applying -> (Idle | Evaluating)` until it settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorPhase {
    /// No evaluation in progress; the last pass changed nothing observable.
    Idle,
    /// Matching rule conditions against current field values.
    Evaluating,
    /// Applying the matched rules' directives to the store.
    Applying,
}

/// Outcome of a settled evaluation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationReport {
    /// Number of passes executed before reaching the fixpoint.
    pub passes: usize,
    /// Every field whose observable state changed across all passes.
    pub changed_fields: IndexSet<String>,
}

/// Evaluates workflow rules against a form state store.
pub struct WorkflowEvaluator<'a> {
    registry: &'a FieldRegistry,
    rules: &'a WorkflowRuleSet,
    limits: EvaluationLimits,
}

impl<'a> WorkflowEvaluator<'a> {
    /// Creates an evaluator with default limits.
    pub fn new(registry: &'a FieldRegistry, rules: &'a WorkflowRuleSet) -> Self {
        Self {
            registry,
            rules,
            limits: EvaluationLimits::default(),
        }
    }

    /// Overrides the per-pass limits.
    pub fn with_limits(mut self, limits: EvaluationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Runs rule evaluation for the given record type to a fixpoint.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkflowDivergence`] when directives keep
    /// changing condition-relevant fields past the iteration cap.
    pub fn evaluate(&self, store: &mut FormStateStore, object: &str) -> Result<EvaluationReport, EngineError> {
        let condition_fields = self.rules.condition_fields(object);
        let mut report = EvaluationReport::default();
        let mut phase = EvaluatorPhase::Evaluating;

        while phase != EvaluatorPhase::Idle {
            if report.passes >= self.limits.max_passes {
                warn!(object, passes = report.passes, "workflow evaluation exceeded the iteration cap");
                return Err(EngineError::WorkflowDivergence { iterations: report.passes });
            }
            report.passes += 1;

            let matched: Vec<&WorkflowRule> = self
                .rules
                .for_object(object)
                .filter(|rule| self.rule_matches(rule, store))
                .collect();

            phase = EvaluatorPhase::Applying;
            let mut touched_condition_field = false;
            for rule in matched {
                for (field_key, action) in &rule.perform {
                    let Some(descriptor) = self.registry.describe(field_key) else {
                        warn!(rule = %rule.name, field = %field_key, "rule perform entry references unknown field, skipping");
                        continue;
                    };
                    let directive = directive_for_action(descriptor, field_key, action);
                    if apply_directive(store, &directive) {
                        report.changed_fields.insert(field_key.clone());
                        if condition_fields.contains(field_key.as_str()) {
                            touched_condition_field = true;
                        }
                    }
                }
                if rule.stop_after_match {
                    debug!(rule = %rule.name, "rule requested evaluation stop after match");
                    break;
                }
            }

            phase = if touched_condition_field {
                EvaluatorPhase::Evaluating
            } else {
                EvaluatorPhase::Idle
            };
        }

        debug!(object, passes = report.passes, changed = report.changed_fields.len(), "workflow evaluation settled");
        Ok(report)
    }

    fn rule_matches(&self, rule: &WorkflowRule, store: &FormStateStore) -> bool {
        rule.condition_selected.iter().all(|(field_key, condition)| {
            if self.registry.describe(field_key).is_none() {
                warn!(rule = %rule.name, field = %field_key, "rule condition references unknown field, ignoring the condition");
                return true;
            }
            match store.field(field_key) {
                Some(field) => condition_matches(condition, &field.value),
                None => true,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_registry::{FieldCatalog, FieldRegistry};
    use intake_types::FieldValue;

    fn registry() -> FieldRegistry {
        let catalog: FieldCatalog = serde_yaml::from_str(
            r#"
fields:
  - key: state
    field_type: select
    default: open
  - key: pending_time
    field_type: datetime
  - key: escalation
    field_type: select
  - key: followup
    field_type: select
"#,
        )
        .expect("parse catalog");
        FieldRegistry::from_catalog(catalog)
    }

    fn rules(yaml_text: &str) -> WorkflowRuleSet {
        serde_yaml::from_str(yaml_text).expect("parse rules")
    }

    #[test]
    fn hides_pending_time_unless_state_is_pending() {
        let registry = registry();
        let rule_set = rules(
            r#"
rules:
  - name: hide pending time
    object: ticket
    condition_selected:
      state: { operator: is_not, value: pending reminder }
    perform:
      pending_time: { operator: hide }
  - name: require pending time
    object: ticket
    condition_selected:
      state: { operator: is, value: pending reminder }
    perform:
      pending_time: { operator: show }
      pending_time_mandatory:
        operator: set_mandatory
"#,
        );
        // The second rule's unknown perform key is skipped, the rest applies.
        let mut store = FormStateStore::open(&registry);
        let evaluator = WorkflowEvaluator::new(&registry, &rule_set);

        evaluator.evaluate(&mut store, "ticket").expect("evaluate");
        assert!(!store.field("pending_time").expect("field").visible);

        store.commit_user_value("state", FieldValue::Id("pending reminder".into()));
        evaluator.evaluate(&mut store, "ticket").expect("evaluate");
        assert!(store.field("pending_time").expect("field").visible);
    }

    #[test]
    fn rules_for_other_objects_are_ignored() {
        let registry = registry();
        let rule_set = rules(
            r#"
rules:
  - name: unrelated
    object: user
    perform:
      pending_time: { operator: hide }
"#,
        );
        let mut store = FormStateStore::open(&registry);
        let report = WorkflowEvaluator::new(&registry, &rule_set).evaluate(&mut store, "ticket").expect("evaluate");

        assert!(report.changed_fields.is_empty());
        assert!(store.field("pending_time").expect("field").visible);
    }

    #[test]
    fn empty_condition_set_matches_unconditionally() {
        let registry = registry();
        let rule_set = rules(
            r#"
rules:
  - name: always hide escalation
    object: ticket
    perform:
      escalation: { operator: hide }
"#,
        );
        let mut store = FormStateStore::open(&registry);
        let report = WorkflowEvaluator::new(&registry, &rule_set).evaluate(&mut store, "ticket").expect("evaluate");

        assert!(report.changed_fields.contains("escalation"));
        assert_eq!(report.passes, 1, "hiding a non-condition field settles in one pass");
    }

    #[test]
    fn converging_rule_chain_reaches_idle() {
        let registry = registry();
        // state=open selects escalation=1; escalation=1 selects followup=1.
        // The chain converges because re-running the passes reproduces the
        // same values.
        let rule_set = rules(
            r#"
rules:
  - name: chain a
    object: ticket
    condition_selected:
      state: { operator: is, value: open }
    perform:
      escalation: { operator: select, select: "1" }
  - name: chain b
    object: ticket
    condition_selected:
      escalation: { operator: is, value: "1" }
    perform:
      followup: { operator: select, select: "1" }
"#,
        );
        let mut store = FormStateStore::open(&registry);
        let report = WorkflowEvaluator::new(&registry, &rule_set).evaluate(&mut store, "ticket").expect("evaluate");

        assert!(report.passes <= 3);
        assert_eq!(store.field("escalation").expect("field").value, FieldValue::Id("1".into()));
        assert_eq!(store.field("followup").expect("field").value, FieldValue::Id("1".into()));
    }

    #[test]
    fn oscillating_rules_raise_divergence() {
        let registry = registry();
        let rule_set = rules(
            r#"
rules:
  - name: ping
    object: ticket
    condition_selected:
      escalation: { operator: is, value: "1" }
    perform:
      escalation: { operator: select, select: "2" }
  - name: pong
    object: ticket
    condition_selected:
      escalation: { operator: is, value: "2" }
    perform:
      escalation: { operator: select, select: "1" }
"#,
        );
        let mut store = FormStateStore::open(&registry);
        store.commit_user_value("escalation", FieldValue::Id("1".into()));

        let error = WorkflowEvaluator::new(&registry, &rule_set)
            .evaluate(&mut store, "ticket")
            .expect_err("oscillation must not settle");

        assert!(matches!(error, EngineError::WorkflowDivergence { iterations: 10 }));
        // Directives applied before the cap stay applied.
        let value = &store.field("escalation").expect("field").value;
        assert!(matches!(value, FieldValue::Id(id) if id == "1" || id == "2"));
    }

    #[test]
    fn later_rules_override_earlier_directives_in_a_pass() {
        let registry = registry();
        let rule_set = rules(
            r#"
rules:
  - name: first
    object: ticket
    perform:
      escalation: { operator: select, select: "1" }
  - name: second
    object: ticket
    perform:
      escalation: { operator: select, select: "2" }
"#,
        );
        let mut store = FormStateStore::open(&registry);
        WorkflowEvaluator::new(&registry, &rule_set).evaluate(&mut store, "ticket").expect("evaluate");

        assert_eq!(store.field("escalation").expect("field").value, FieldValue::Id("2".into()));
    }

    #[test]
    fn stop_after_match_ends_the_pass_early() {
        let registry = registry();
        let rule_set = rules(
            r#"
rules:
  - name: decisive
    object: ticket
    stop_after_match: true
    perform:
      escalation: { operator: select, select: "1" }
  - name: never reached
    object: ticket
    perform:
      escalation: { operator: select, select: "2" }
"#,
        );
        let mut store = FormStateStore::open(&registry);
        WorkflowEvaluator::new(&registry, &rule_set).evaluate(&mut store, "ticket").expect("evaluate");

        assert_eq!(store.field("escalation").expect("field").value, FieldValue::Id("1".into()));
    }
}
