//! Stage worker: consumes bus messages and drives the orchestrator.
//!
//! Each message is handled on its own blocking task, so one release's
//! pipeline never serializes behind another's, and stage handlers share
//! nothing in process: they open their own DB connection and read
//! everything else from storage.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::bus::{BusMessage, MessageBus};
use super::tracker::RunTracker;
use crate::db::Database;
use crate::models::{PipelineRun, RunStatus};
use crate::pipeline::evaluation::ReleaseEvaluator;

/// Consumer seam for `notifications.send`. The real sender (WhatsApp/email)
/// lives outside this crate; the default implementation just logs.
pub trait NotificationSink: Send + Sync {
    fn send(&self, user_ids: &[Uuid], message_text: &str);
}

pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn send(&self, user_ids: &[Uuid], message_text: &str) {
        tracing::info!(recipients = user_ids.len(), message_text, "Notification trigger");
    }
}

/// Everything a stage handler needs, shared via `Arc`.
pub struct WorkerDeps {
    pub db: Database,
    pub evaluator: Arc<ReleaseEvaluator>,
    pub tracker: Arc<RunTracker>,
    pub bus: MessageBus,
    pub sink: Arc<dyn NotificationSink>,
}

/// Start the worker loop. It ends when every `MessageBus` clone is dropped.
pub fn spawn_worker(
    deps: Arc<WorkerDeps>,
    mut rx: mpsc::UnboundedReceiver<BusMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Stage worker started");
        while let Some(message) = rx.recv().await {
            let deps = deps.clone();
            // Stage bodies are blocking (rusqlite + HTTP), so each runs on
            // its own blocking task.
            tokio::spawn(async move {
                let topic = message.topic();
                if let Err(e) =
                    tokio::task::spawn_blocking(move || handle_message(&deps, message)).await
                {
                    tracing::error!(topic, error = %e, "Stage handler panicked");
                }
            });
        }
        tracing::info!("Stage worker shutting down");
    })
}

fn handle_message(deps: &WorkerDeps, message: BusMessage) {
    match message {
        BusMessage::CreateVectors { release_id } => handle_create_vectors(deps, release_id),
        BusMessage::CreateCheckTree { release_id } => handle_create_check_tree(deps, release_id),
        BusMessage::SendNotification { user_ids, message_text } => {
            deps.sink.send(&user_ids, &message_text)
        }
    }
}

/// Stage 1: PROCESSING. Extract, chunk, anonymize, index; then chain the
/// evaluation stage. Any failure here is fatal for the run, no retry.
fn handle_create_vectors(deps: &WorkerDeps, release_id: Uuid) {
    let Some(run) = run_for_release(deps, &release_id) else {
        return;
    };

    if let Err(e) = deps.tracker.transition(
        &run.id,
        RunStatus::Processing,
        "extracting and anonymizing document",
    ) {
        tracing::error!(release_id = %release_id, error = %e, "Could not enter PROCESSING");
        return;
    }

    let conn = match deps.db.open() {
        Ok(conn) => conn,
        Err(e) => {
            deps.tracker.fail(&run.id, &e.to_string());
            return;
        }
    };

    match deps.evaluator.vectorize(&conn, &release_id) {
        Ok(outcome) => {
            tracing::info!(
                release_id = %release_id,
                chunks = outcome.chunk_count,
                "Vectorize stage finished, chaining evaluation"
            );
            deps.bus.publish(BusMessage::CreateCheckTree { release_id });
        }
        Err(e) => deps.tracker.fail(&run.id, &e.to_string()),
    }
}

/// Stage 2: EVALUATING. Snapshot, retrieve, batch-evaluate, persist,
/// summarize; then COMPLETED and the downstream notification trigger.
fn handle_create_check_tree(deps: &WorkerDeps, release_id: Uuid) {
    let Some(run) = run_for_release(deps, &release_id) else {
        return;
    };

    if let Err(e) = deps
        .tracker
        .transition(&run.id, RunStatus::Evaluating, "evaluating criteria")
    {
        tracing::error!(release_id = %release_id, error = %e, "Could not enter EVALUATING");
        return;
    }

    let conn = match deps.db.open() {
        Ok(conn) => conn,
        Err(e) => {
            deps.tracker.fail(&run.id, &e.to_string());
            return;
        }
    };

    let tracker = deps.tracker.clone();
    let run_id = run.id;
    let progress = move |done: usize, total: usize| {
        // Progress updates are best-effort; a failed write must not abort
        // the evaluation.
        let _ = tracker.transition(
            &run_id,
            RunStatus::Evaluating,
            &format!("evaluating criteria {done}/{total}"),
        );
    };

    match deps.evaluator.evaluate(&conn, &release_id, &progress) {
        Ok(report) => {
            let completed = deps.tracker.transition(
                &run.id,
                RunStatus::Completed,
                &format!("evaluation complete: {} criteria", report.branch_count),
            );
            if let Err(e) = completed {
                tracing::error!(release_id = %release_id, error = %e, "Could not enter COMPLETED");
                return;
            }

            let user_ids = recipient_ids(deps, &release_id);
            deps.bus.publish(BusMessage::SendNotification {
                user_ids,
                message_text: format!(
                    "Document release evaluation finished: {} criteria evaluated",
                    report.branch_count
                ),
            });
        }
        Err(e) => deps.tracker.fail(&run.id, &e.to_string()),
    }
}

fn run_for_release(deps: &WorkerDeps, release_id: &Uuid) -> Option<PipelineRun> {
    match deps.tracker.run_for_release(release_id) {
        Ok(Some(run)) => Some(run),
        Ok(None) => {
            tracing::warn!(release_id = %release_id, "Bus message for release without a run");
            None
        }
        Err(e) => {
            tracing::error!(release_id = %release_id, error = %e, "Run lookup failed");
            None
        }
    }
}

fn recipient_ids(deps: &WorkerDeps, release_id: &Uuid) -> Vec<Uuid> {
    deps.db
        .open()
        .ok()
        .and_then(|conn| crate::db::repository::get_release(&conn, release_id).ok().flatten())
        .and_then(|release| release.created_by)
        .into_iter()
        .collect()
}
