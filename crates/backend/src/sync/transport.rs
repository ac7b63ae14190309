use async_trait::async_trait;
use shared_types::{Appointment, Client};

use super::credentials::OwnerCredentials;

/// Remote calendar operations, performed under one staff member's account.
///
/// Implementations absorb every network, serialization and authorization
/// error: callers only ever see the event id, `true`, or the failure value.
#[async_trait]
pub trait CalendarTransport: Send + Sync {
    /// Returns the provider's event id, or `None` on any failure.
    async fn create_event(
        &self,
        owner: &OwnerCredentials,
        appointment: &Appointment,
        client: Option<&Client>,
    ) -> Option<String>;

    /// `false` means the update did not land, most often because the event
    /// no longer exists remotely.
    async fn update_event(
        &self,
        owner: &OwnerCredentials,
        event_id: &str,
        appointment: &Appointment,
        client: Option<&Client>,
    ) -> bool;

    /// `false` for an event that is already gone.
    async fn delete_event(&self, owner: &OwnerCredentials, event_id: &str) -> bool;
}
