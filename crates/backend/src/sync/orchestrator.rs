//! Decides which calendar calls an appointment mutation needs and keeps the
//! stored event reference in step with the result.
//!
//! The stored reference always ends up either pointing at an event the
//! current owner holds, or empty. Nothing here returns an error: every
//! failure is logged and reduced to a [`SyncOutcome`].
//!
//! Credentials are brought up to date once per owner before any calendar
//! call, so a pass that needs two calls on one calendar exchanges at most
//! one token.

use std::sync::Arc;

use shared_types::{Appointment, AppointmentSnapshot, Client};
use uuid::Uuid;

use super::credentials::{CredentialRefresher, OwnerCredentials};
use super::ports::AppointmentStore;
use super::resolver::{OwnerResolver, SessionActor};
use super::transport::CalendarTransport;

/// What a sync pass did, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No usable owner, so no remote call was made.
    NotConfigured,
    /// A new event was created and its id stored.
    Linked { event_ref: String },
    /// The existing event was updated in place.
    Updated,
    /// The stored reference was cleared.
    Unlinked,
    /// The remote delete was attempted.
    Deleted { removed: bool },
    /// The token refresh or remote call failed and the stored reference was
    /// left as it was.
    Failed,
    /// Nothing to do.
    Noop,
}

pub struct SyncOrchestrator {
    transport: Arc<dyn CalendarTransport>,
    store: Arc<dyn AppointmentStore>,
    resolver: OwnerResolver,
    refresher: CredentialRefresher,
}

impl SyncOrchestrator {
    pub fn new(
        transport: Arc<dyn CalendarTransport>,
        store: Arc<dyn AppointmentStore>,
        resolver: OwnerResolver,
        refresher: CredentialRefresher,
    ) -> Self {
        Self {
            transport,
            store,
            resolver,
            refresher,
        }
    }

    /// An appointment was just persisted without a remote reference.
    pub async fn on_created(&self, appointment: &Appointment, session: &SessionActor) -> SyncOutcome {
        let owner = match self.resolver.sync_owner(appointment.staff_id, session).await {
            Ok(owner) => owner,
            Err(e) => {
                tracing::debug!("skipping calendar create: {}", e);
                return SyncOutcome::NotConfigured;
            }
        };
        let Some(owner) = self.fresh(owner).await else {
            return SyncOutcome::Failed;
        };

        let client = self.load_client(appointment.client_id).await;
        self.create_and_store(&owner, appointment, client.as_ref(), false)
            .await
    }

    /// Reconcile the remote event after an update.
    ///
    /// `previous` is the snapshot taken before the update was applied. A
    /// reference that belonged to a different owner is never reused: its event
    /// is removed from the old calendar when possible and a new one created
    /// for the current owner. A reference the provider no longer recognises is
    /// replaced by a fresh event.
    pub async fn on_updated(
        &self,
        previous: &AppointmentSnapshot,
        current: &Appointment,
        session: &SessionActor,
    ) -> SyncOutcome {
        let owner_changed = previous.staff_id != current.staff_id;
        let previous_ref = previous
            .remote_event_ref
            .as_deref()
            .filter(|r| !r.is_empty());

        if owner_changed {
            if let Some(event_ref) = previous_ref {
                self.remove_from_previous_owner(previous, event_ref, session)
                    .await;
            }
        }

        // Only a reference inherited from another owner has to go when the
        // new owner cannot take the event.
        let discard_previous = owner_changed && previous_ref.is_some();

        let owner = match self.resolver.sync_owner(current.staff_id, session).await {
            Ok(owner) => owner,
            Err(e) => {
                tracing::debug!("skipping calendar update: {}", e);
                if discard_previous {
                    self.write_ref(current.id, None).await;
                    return SyncOutcome::Unlinked;
                }
                return SyncOutcome::NotConfigured;
            }
        };
        let Some(owner) = self.fresh(owner).await else {
            if discard_previous {
                self.write_ref(current.id, None).await;
                return SyncOutcome::Unlinked;
            }
            return SyncOutcome::Failed;
        };

        let client = self.load_client(current.client_id).await;

        match previous_ref {
            Some(event_ref) if !owner_changed => {
                if self
                    .transport
                    .update_event(&owner, event_ref, current, client.as_ref())
                    .await
                {
                    return SyncOutcome::Updated;
                }

                tracing::info!(
                    "calendar event {} could not be updated, creating a replacement",
                    event_ref
                );
                self.create_and_store(&owner, current, client.as_ref(), true)
                    .await
            }
            _ => {
                self.create_and_store(&owner, current, client.as_ref(), discard_previous)
                    .await
            }
        }
    }

    /// Remove the remote event of an appointment that is being deleted.
    /// `snapshot` must be captured before the row goes.
    pub async fn on_deleted(&self, snapshot: &AppointmentSnapshot, session: &SessionActor) -> SyncOutcome {
        let Some(event_ref) = snapshot
            .remote_event_ref
            .as_deref()
            .filter(|r| !r.is_empty())
        else {
            return SyncOutcome::Noop;
        };

        let owner = match self.resolver.sync_owner(snapshot.staff_id, session).await {
            Ok(owner) => owner,
            Err(e) => {
                tracing::debug!("skipping calendar delete: {}", e);
                return SyncOutcome::NotConfigured;
            }
        };
        let Some(owner) = self.fresh(owner).await else {
            return SyncOutcome::Failed;
        };

        let removed = self.transport.delete_event(&owner, event_ref).await;
        SyncOutcome::Deleted { removed }
    }

    async fn remove_from_previous_owner(
        &self,
        previous: &AppointmentSnapshot,
        event_ref: &str,
        session: &SessionActor,
    ) {
        let prev_owner = match self.resolver.cleanup_owner(previous.staff_id, session).await {
            Ok(prev_owner) => prev_owner,
            Err(e) => {
                tracing::info!(
                    "event {} left on previous owner's calendar: {}",
                    event_ref,
                    e
                );
                return;
            }
        };
        let Some(prev_owner) = self.fresh(prev_owner).await else {
            tracing::info!("event {} left on previous owner's calendar", event_ref);
            return;
        };

        let removed = self.transport.delete_event(&prev_owner, event_ref).await;
        tracing::debug!(
            previous_owner = %prev_owner.owner_id,
            removed,
            "removed event {} from previous owner",
            event_ref
        );
    }

    /// Credentials valid for the rest of this pass, or `None` when the
    /// token could not be refreshed.
    async fn fresh(&self, owner: OwnerCredentials) -> Option<OwnerCredentials> {
        match self.refresher.ensure_fresh_credentials(&owner).await {
            Ok(creds) => Some(creds),
            Err(e) => {
                tracing::warn!(
                    owner_id = %owner.owner_id,
                    "calendar credentials could not be refreshed: {}",
                    e
                );
                None
            }
        }
    }

    /// Create an event and store its id. With `clear_on_failure` a failed
    /// create empties the stored reference instead of leaving it in place.
    async fn create_and_store(
        &self,
        owner: &OwnerCredentials,
        appointment: &Appointment,
        client: Option<&Client>,
        clear_on_failure: bool,
    ) -> SyncOutcome {
        match self.transport.create_event(owner, appointment, client).await {
            Some(event_ref) => {
                self.write_ref(appointment.id, Some(&event_ref)).await;
                SyncOutcome::Linked { event_ref }
            }
            None if clear_on_failure => {
                self.write_ref(appointment.id, None).await;
                SyncOutcome::Unlinked
            }
            None => SyncOutcome::Failed,
        }
    }

    async fn load_client(&self, client_id: Uuid) -> Option<Client> {
        match self.store.load_client(client_id).await {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(%client_id, "failed to load client for calendar event: {:#}", e);
                None
            }
        }
    }

    async fn write_ref(&self, appointment_id: Uuid, event_ref: Option<&str>) {
        if let Err(e) = self.store.write_event_ref(appointment_id, event_ref).await {
            tracing::warn!(
                %appointment_id,
                "failed to store calendar event reference: {:#}",
                e
            );
        }
    }
}
