//! Collaborators the sync engine consumes.
//!
//! Production implementations live in `crate::repository`; tests use the
//! in-memory versions in `super::testing`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{AppointmentSnapshot, Client, StaffMember};
use uuid::Uuid;

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get_snapshot(&self, appointment_id: Uuid)
        -> anyhow::Result<Option<AppointmentSnapshot>>;

    /// Plain column write. Must never schedule another sync.
    async fn write_event_ref(
        &self,
        appointment_id: Uuid,
        event_ref: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn load_client(&self, client_id: Uuid) -> anyhow::Result<Option<Client>>;
}

#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    async fn load_owner(&self, staff_id: Uuid) -> anyhow::Result<Option<StaffMember>>;

    /// Last write wins; concurrent refreshers are not serialized.
    async fn persist_refreshed_token(
        &self,
        staff_id: Uuid,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}
