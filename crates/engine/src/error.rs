//! Engine error kinds.

use thiserror::Error;

/// Non-fatal errors surfaced by form event processing.
///
/// Both kinds leave the form state store in a consistent state: directives
/// applied before a divergence stay applied, and a failed lookup leaves the
/// affected field at its last known-good value.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The workflow rule set kept changing condition-relevant fields past
    /// the iteration cap. This is a rule configuration error, not an
    /// infinite loop.
    #[error("workflow evaluation did not settle after {iterations} passes")]
    WorkflowDivergence {
        /// Number of completed evaluation passes before giving up.
        iterations: usize,
    },
    /// An external lookup reported a failure for a field.
    #[error("lookup for field '{field}' failed: {message}")]
    LookupFailed {
        /// Field the lookup was issued for.
        field: String,
        /// Collaborator-provided failure description.
        message: String,
    },
}
