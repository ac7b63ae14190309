use std::sync::Arc;

use shared_types::{Appointment, AppointmentSnapshot};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use super::orchestrator::{SyncOrchestrator, SyncOutcome};
use super::resolver::SessionActor;

/// One unit of calendar work, produced by a completed appointment mutation.
#[derive(Debug, Clone)]
pub enum SyncJob {
    Created {
        appointment: Appointment,
    },
    Updated {
        previous: AppointmentSnapshot,
        current: Appointment,
    },
    Deleted {
        snapshot: AppointmentSnapshot,
    },
    /// Operator-requested re-run of the update path against the stored state.
    Resync {
        appointment: Appointment,
    },
}

impl SyncJob {
    pub fn appointment_id(&self) -> Uuid {
        match self {
            SyncJob::Created { appointment } | SyncJob::Resync { appointment } => appointment.id,
            SyncJob::Updated { current, .. } => current.id,
            SyncJob::Deleted { snapshot } => snapshot.appointment_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncJob::Created { .. } => "created",
            SyncJob::Updated { .. } => "updated",
            SyncJob::Deleted { .. } => "deleted",
            SyncJob::Resync { .. } => "resync",
        }
    }
}

/// Runs sync jobs as detached tokio tasks.
///
/// Each job is attempted exactly once. There is no retry, no queue and no
/// ordering between jobs for the same appointment; the last write-back wins.
/// Callers may drop the returned handle.
#[derive(Clone)]
pub struct SyncDispatcher {
    orchestrator: Arc<SyncOrchestrator>,
}

impl SyncDispatcher {
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn submit(&self, job: SyncJob, session: SessionActor) -> JoinHandle<SyncOutcome> {
        let orchestrator = self.orchestrator.clone();
        let span = tracing::info_span!(
            "calendar_sync",
            appointment_id = %job.appointment_id(),
            kind = job.kind()
        );

        tokio::spawn(
            async move {
                let outcome = run(&orchestrator, &job, &session).await;
                match &outcome {
                    SyncOutcome::Failed => tracing::warn!("calendar sync failed, not retrying"),
                    other => tracing::info!(outcome = ?other, "calendar sync finished"),
                }
                outcome
            }
            .instrument(span),
        )
    }
}

async fn run(orchestrator: &SyncOrchestrator, job: &SyncJob, session: &SessionActor) -> SyncOutcome {
    match job {
        SyncJob::Created { appointment } => orchestrator.on_created(appointment, session).await,
        SyncJob::Updated { previous, current } => {
            orchestrator.on_updated(previous, current, session).await
        }
        SyncJob::Deleted { snapshot } => orchestrator.on_deleted(snapshot, session).await,
        SyncJob::Resync { appointment } => {
            orchestrator
                .on_updated(&appointment.snapshot(), appointment, session)
                .await
        }
    }
}
