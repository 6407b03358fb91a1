//! # Intake Engine
//!
//! Form-state reconciliation for dynamic record-creation forms. Two
//! collaborating mechanisms drive field values and metadata in real time:
//!
//! - **Template merging**: a named, pre-authored set of field values is
//!   merged into the live form state using per-field, per-operator policies
//!   (dirty protection for free text, tag set arithmetic, date resolution,
//!   authorization gating for reference fields).
//! - **Workflow evaluation**: a declarative rule set continuously recomputes
//!   field visibility, required-ness, option filters, and values, running to
//!   a bounded fixpoint after every committed mutation.
//!
//! Both are sequenced by a single-threaded [`FormSession`] event queue; an
//! async [`drive_form_session`] runner adapts the queue to Tokio channels
//! for embedding UIs.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use intake_engine::{FormEvent, FormSession};
//! use intake_registry::{FieldCatalog, FieldRegistry};
//! use intake_types::{FieldValue, WorkflowRuleSet};
//!
//! let catalog: FieldCatalog = serde_yaml::from_str(r#"
//! fields:
//!   - key: title
//!     field_type: text
//! "#)?;
//! let registry = Arc::new(FieldRegistry::from_catalog(catalog));
//!
//! let mut session = FormSession::open(registry, WorkflowRuleSet::default(), "ticket");
//! session.submit(FormEvent::UserEdit {
//!     key: "title".into(),
//!     value: FieldValue::Text("Printer on fire".into()),
//! })?;
//! assert!(session.store().field("title").unwrap().dirty);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

pub mod coerce;
pub mod dates;
pub mod error;
pub mod merge;
pub mod runner;
pub mod session;
pub mod store;
pub mod tags;
pub mod workflow;

pub use error::EngineError;
pub use merge::{AuthorizationScope, MergeReport, PermitAll, TemplateMergeEngine};
pub use runner::drive_form_session;
pub use session::{FormEvent, FormSession, SessionUpdate};
pub use store::{FormFieldState, FormStateStore};
pub use workflow::{EvaluationLimits, EvaluationReport, EvaluatorPhase, WorkflowEvaluator};

use intake_types::{Template, TemplateBundle, WorkflowRule, WorkflowRuleSet};

/// Loads a template file with automatic format detection.
///
/// Accepts either a multi-template document (`templates:` list) or a single
/// template mapping; YAML and JSON are both supported.
///
/// # Errors
///
/// Returns an error when the file cannot be read or matches neither
/// document shape.
pub fn parse_template_file(file_path: impl AsRef<Path>) -> Result<TemplateBundle> {
    let file_path = file_path.as_ref();
    let file_content = fs::read_to_string(file_path).with_context(|| format!("Failed to read template file: {}", file_path.display()))?;

    // Attempt the multi-template document first so a bundle is never
    // mistaken for a single template with ignored fields.
    #[derive(Deserialize)]
    struct MultiTemplateDocument {
        templates: Vec<Template>,
    }

    if let Ok(document) = serde_yaml::from_str::<MultiTemplateDocument>(&file_content) {
        return Ok(TemplateBundle {
            templates: document.templates,
        });
    }

    if let Ok(template) = serde_yaml::from_str::<Template>(&file_content) {
        return Ok(TemplateBundle { templates: vec![template] });
    }

    anyhow::bail!(
        "Unsupported template document format in {}. Expected one of:\n\
         - Single template with 'id', 'name', and 'options' fields\n\
         - Multi-template document with templates under a 'templates' key\n\
         ",
        file_path.display()
    );
}

/// Loads a workflow rule file with automatic format detection.
///
/// Accepts either a rule set document (`rules:` list) or a single rule
/// mapping; YAML and JSON are both supported.
///
/// # Errors
///
/// Returns an error when the file cannot be read or matches neither
/// document shape.
pub fn parse_workflow_rules_file(file_path: impl AsRef<Path>) -> Result<WorkflowRuleSet> {
    let file_path = file_path.as_ref();
    let file_content =
        fs::read_to_string(file_path).with_context(|| format!("Failed to read workflow rule file: {}", file_path.display()))?;

    #[derive(Deserialize)]
    struct RuleSetDocument {
        rules: Vec<WorkflowRule>,
    }

    if let Ok(document) = serde_yaml::from_str::<RuleSetDocument>(&file_content) {
        return Ok(WorkflowRuleSet { rules: document.rules });
    }

    if let Ok(rule) = serde_yaml::from_str::<WorkflowRule>(&file_content) {
        return Ok(WorkflowRuleSet { rules: vec![rule] });
    }

    anyhow::bail!(
        "Unsupported workflow rule document format in {}. Expected one of:\n\
         - Single rule with 'name', 'object', 'condition_selected', and 'perform' fields\n\
         - Rule set document with rules under a 'rules' key\n\
         ",
        file_path.display()
    );
}
