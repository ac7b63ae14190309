use std::sync::Arc;

use crate::auth::AuthConfig;
use crate::db::DbPool;
use crate::sync::{AppointmentStore, SyncDispatcher};

/// Shared by every handler. Cloned per request; all fields are handles.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub auth: AuthConfig,
    pub dispatcher: SyncDispatcher,
    pub store: Arc<dyn AppointmentStore>,
}
