use thiserror::Error;

/// Failure classes inside the calendar sync layer.
///
/// None of these escape to API callers. The transport reduces them to
/// `bool`/`Option` results and the orchestrator logs them.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Owner missing, not connected, sync disabled, or no stored tokens.
    #[error("Calendar sync not configured: {0}")]
    NotConfigured(String),

    /// Provider rejected the access token.
    #[error("Calendar authorization expired")]
    AuthExpired,

    /// The referenced remote event does not exist (404/410).
    #[error("Remote calendar event not found")]
    RemoteNotFound,

    #[error("Calendar transport failure: {0}")]
    TransportFailure(String),
}

impl SyncError {
    pub fn transport(message: impl Into<String>) -> Self {
        SyncError::TransportFailure(message.into())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::TransportFailure(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::TransportFailure(format!("invalid provider payload: {}", err))
    }
}
