//! Asynchronous session runner.
//!
//! Wraps the synchronous [`FormSession`] scheduler in a cooperative task
//! that consumes [`FormEvent`]s from a Tokio channel and streams
//! [`SessionUpdate`]s back to the embedding UI. The runner is the only
//! writer: surrounding async lookups must post completion events into the
//! event channel instead of mutating form state directly.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::{
    error::EngineError,
    session::{FormEvent, FormSession, SessionUpdate},
};

/// Drives a form session until the event source closes.
///
/// Runs the initial workflow evaluation, then processes events one at a
/// time, emitting every resulting update. Divergence and lookup failures are
/// reported as updates and the session keeps running; the session itself is
/// returned when the channel closes so the caller can hand the final store
/// to the submit boundary.
pub async fn drive_form_session(
    mut session: FormSession,
    mut event_rx: UnboundedReceiver<FormEvent>,
    update_tx: UnboundedSender<SessionUpdate>,
) -> FormSession {
    match session.refresh() {
        Ok(updates) => {
            if send_all(&update_tx, updates).is_err() {
                return session;
            }
        }
        Err(error) => {
            if update_tx.send(update_for_error(error)).is_err() {
                return session;
            }
        }
    }

    while let Some(event) = event_rx.recv().await {
        let outcome = session.submit(event);
        let result = match outcome {
            Ok(updates) => send_all(&update_tx, updates),
            Err(error) => update_tx.send(update_for_error(error)).map_err(|_| ()),
        };
        if result.is_err() {
            debug!("update receiver dropped, stopping session runner");
            return session;
        }
    }

    let _ = update_tx.send(SessionUpdate::SessionClosed);
    session
}

fn send_all(update_tx: &UnboundedSender<SessionUpdate>, updates: Vec<SessionUpdate>) -> Result<(), ()> {
    for update in updates {
        update_tx.send(update).map_err(|_| ())?;
    }
    Ok(())
}

fn update_for_error(error: EngineError) -> SessionUpdate {
    match error {
        EngineError::WorkflowDivergence { iterations } => SessionUpdate::EvaluationDiverged { iterations },
        EngineError::LookupFailed { field, message } => SessionUpdate::LookupFailed { key: field, message },
    }
}
