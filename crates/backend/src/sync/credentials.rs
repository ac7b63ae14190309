//! Calendar credentials and the explicit refresh step that runs before every
//! transport call.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared_types::StaffMember;
use uuid::Uuid;

use super::error::SyncError;
use super::ports::OwnerDirectory;

/// Tokens are treated as expired this long before their stated expiry.
pub const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Credentials {
    /// `None` when the staff record holds neither an access nor a refresh token.
    pub fn from_owner(owner: &StaffMember) -> Option<Self> {
        let access_token = owner
            .calendar_access_token
            .clone()
            .filter(|t| !t.is_empty());
        let refresh_token = owner
            .calendar_refresh_token
            .clone()
            .filter(|t| !t.is_empty());

        if access_token.is_none() && refresh_token.is_none() {
            return None;
        }

        Some(Self {
            access_token: access_token.unwrap_or_default(),
            refresh_token,
            expires_at: owner.calendar_token_expires_at,
        })
    }

    /// A missing access token counts as expired; a missing expiry does not.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return true;
        }
        match self.expires_at {
            Some(exp) => now > exp - Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }
}

/// Credentials tagged with the staff member they belong to, so a refreshed
/// token can be written back to the right record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerCredentials {
    pub owner_id: Uuid,
    pub credentials: Credentials,
    /// Set once a token exchange produced these credentials. Another
    /// exchange for the same owner is not attempted while it is set.
    pub refreshed: bool,
}

impl OwnerCredentials {
    pub fn for_owner(owner: &StaffMember) -> Option<Self> {
        Credentials::from_owner(owner).map(|credentials| Self {
            owner_id: owner.id,
            credentials,
            refreshed: false,
        })
    }

    pub fn access_token(&self) -> &str {
        &self.credentials.access_token
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// OAuth2 refresh-token grant.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, SyncError>;
}

/// Google's token endpoint.
pub struct GoogleTokenExchange {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl GoogleTokenExchange {
    pub fn new(
        http: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
    grant_type: &'static str,
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[async_trait]
impl TokenExchange for GoogleTokenExchange {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, SyncError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&RefreshRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                refresh_token,
                grant_type: "refresh_token",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::transport(format!(
                "token refresh rejected ({}): {}",
                status, body
            )));
        }

        let tokens: TokenResponse = serde_json::from_str(&response.text().await?)?;
        if tokens.access_token.is_empty() {
            return Err(SyncError::transport("token refresh returned empty access token"));
        }

        // Google issues one-hour tokens when expires_in is omitted.
        let expires_at = Utc::now() + Duration::seconds(tokens.expires_in.unwrap_or(3600));

        Ok(RefreshedToken {
            access_token: tokens.access_token,
            expires_at,
        })
    }
}

/// Keeps an owner's access token usable ahead of each calendar call.
#[derive(Clone)]
pub struct CredentialRefresher {
    exchange: Arc<dyn TokenExchange>,
    directory: Arc<dyn OwnerDirectory>,
}

impl CredentialRefresher {
    pub fn new(exchange: Arc<dyn TokenExchange>, directory: Arc<dyn OwnerDirectory>) -> Self {
        Self {
            exchange,
            directory,
        }
    }

    /// Return credentials that are not expired, refreshing first if needed.
    pub async fn ensure_fresh_credentials(
        &self,
        creds: &OwnerCredentials,
    ) -> Result<OwnerCredentials, SyncError> {
        if !creds.credentials.is_expired(Utc::now()) {
            return Ok(creds.clone());
        }

        tracing::debug!(owner_id = %creds.owner_id, "calendar access token expired, refreshing");
        self.refresh(creds).await
    }

    /// Exchange the refresh token unconditionally and write the new access
    /// token back to the owner's record.
    pub async fn refresh(&self, creds: &OwnerCredentials) -> Result<OwnerCredentials, SyncError> {
        let refresh_token = creds
            .credentials
            .refresh_token
            .as_deref()
            .ok_or(SyncError::AuthExpired)?;

        let refreshed = self.exchange.refresh(refresh_token).await?;

        if let Err(e) = self
            .directory
            .persist_refreshed_token(creds.owner_id, &refreshed.access_token, refreshed.expires_at)
            .await
        {
            tracing::warn!(
                owner_id = %creds.owner_id,
                "failed to persist refreshed calendar token: {:#}",
                e
            );
        }

        Ok(OwnerCredentials {
            owner_id: creds.owner_id,
            credentials: Credentials {
                access_token: refreshed.access_token,
                refresh_token: creds.credentials.refresh_token.clone(),
                expires_at: Some(refreshed.expires_at),
            },
            refreshed: true,
        })
    }
}
