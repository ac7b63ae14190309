use std::sync::Arc;

use shared_types::StaffMember;
use uuid::Uuid;

use super::credentials::OwnerCredentials;
use super::error::SyncError;
use super::ports::OwnerDirectory;

/// The staff member acting in the request that triggered a sync, captured
/// when the request was handled.
#[derive(Debug, Clone, Default)]
pub struct SessionActor {
    owner: Option<StaffMember>,
}

impl SessionActor {
    pub fn new(owner: Option<StaffMember>) -> Self {
        Self { owner }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn current_session_owner(&self) -> Option<&StaffMember> {
        self.owner.as_ref()
    }
}

/// Works out whose calendar an appointment belongs in.
pub struct OwnerResolver {
    directory: Arc<dyn OwnerDirectory>,
}

impl OwnerResolver {
    pub fn new(directory: Arc<dyn OwnerDirectory>) -> Self {
        Self { directory }
    }

    /// The assigned staff member if there is one, otherwise the session actor.
    ///
    /// When the assigned staff member is also the session actor the session
    /// copy is used, as it carries the most recent tokens.
    pub async fn resolve(
        &self,
        staff_id: Option<Uuid>,
        session: &SessionActor,
    ) -> Option<StaffMember> {
        let session_owner = session.current_session_owner();

        let Some(staff_id) = staff_id else {
            return session_owner.cloned();
        };

        if let Some(owner) = session_owner.filter(|o| o.id == staff_id) {
            return Some(owner.clone());
        }

        match self.directory.load_owner(staff_id).await {
            Ok(owner) => owner,
            Err(e) => {
                tracing::warn!(%staff_id, "failed to load calendar owner: {:#}", e);
                None
            }
        }
    }

    /// Credentials of the owner whose calendar should hold the event.
    /// Requires a connected calendar with sync enabled.
    pub async fn sync_owner(
        &self,
        staff_id: Option<Uuid>,
        session: &SessionActor,
    ) -> Result<OwnerCredentials, SyncError> {
        let owner = self
            .resolve(staff_id, session)
            .await
            .ok_or_else(|| SyncError::NotConfigured("no owner".to_string()))?;

        if !owner.calendar_sync_active() {
            return Err(SyncError::NotConfigured(format!(
                "staff {} calendar not connected or sync disabled",
                owner.id
            )));
        }

        credentials_of(&owner)
    }

    /// Credentials able to remove an event a previous owner still holds.
    /// Only a connected calendar is required, the sync flag is ignored.
    pub async fn cleanup_owner(
        &self,
        staff_id: Option<Uuid>,
        session: &SessionActor,
    ) -> Result<OwnerCredentials, SyncError> {
        let owner = self
            .resolve(staff_id, session)
            .await
            .ok_or_else(|| SyncError::NotConfigured("no previous owner".to_string()))?;

        if !owner.calendar_connected {
            return Err(SyncError::NotConfigured(format!(
                "staff {} has no calendar connected",
                owner.id
            )));
        }

        credentials_of(&owner)
    }
}

fn credentials_of(owner: &StaffMember) -> Result<OwnerCredentials, SyncError> {
    OwnerCredentials::for_owner(owner).ok_or_else(|| {
        SyncError::NotConfigured(format!("staff {} has no stored calendar tokens", owner.id))
    })
}
