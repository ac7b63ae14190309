//! Google Calendar implementation of [`CalendarTransport`].
//!
//! Talks to the Calendar v3 REST API with the staff member's own bearer
//! token. Every call runs `ensure_fresh_credentials` first; a 401 from the
//! provider forces one refresh and a single retry, unless the token was
//! already exchanged during this sync pass.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use shared_types::{Appointment, Client};

use super::credentials::{CredentialRefresher, OwnerCredentials};
use super::error::SyncError;
use super::transport::CalendarTransport;

const LOCAL_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S";

/// Event body sent to the Calendar API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: EventDateTime,
    pub end: EventDateTime,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<Attendee>,
    pub extended_properties: ExtendedProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: String,
    pub time_zone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedProperties {
    pub private: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

fn event_date_time(at: NaiveDateTime, tz: Tz) -> EventDateTime {
    EventDateTime {
        date_time: at.format(LOCAL_DATE_TIME).to_string(),
        time_zone: tz.name().to_string(),
    }
}

/// Build the remote event for an appointment.
pub fn build_event(appointment: &Appointment, client: Option<&Client>, tz: Tz) -> GoogleEvent {
    let summary = match client {
        Some(c) => format!("{} - {}", appointment.label, c.name),
        None => appointment.label.clone(),
    };

    let mut lines = Vec::new();
    if let Some(notes) = appointment.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        lines.push(notes.trim().to_string());
        lines.push(String::new());
    }
    if let Some(c) = client {
        lines.push(format!("Client: {}", c.name));
        if let Some(email) = &c.email {
            lines.push(format!("Email: {}", email));
        }
        if let Some(phone) = &c.phone {
            lines.push(format!("Phone: {}", phone));
        }
    }
    let description = if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n").trim_end().to_string())
    };

    let attendees = client
        .and_then(|c| {
            c.email
                .as_ref()
                .filter(|e| !e.is_empty())
                .map(|email| Attendee {
                    email: email.clone(),
                    display_name: Some(c.name.clone()),
                })
        })
        .into_iter()
        .collect();

    let mut private = BTreeMap::new();
    private.insert("clinic_appointment_id".to_string(), appointment.id.to_string());

    GoogleEvent {
        summary,
        description,
        start: event_date_time(appointment.starts_at(), tz),
        end: event_date_time(appointment.ends_at(), tz),
        attendees,
        extended_properties: ExtendedProperties { private },
    }
}

pub struct GoogleCalendarTransport {
    http: reqwest::Client,
    api_base: String,
    calendar_id: String,
    time_zone: Tz,
    refresher: CredentialRefresher,
}

impl GoogleCalendarTransport {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        calendar_id: impl Into<String>,
        time_zone: Tz,
        refresher: CredentialRefresher,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            calendar_id: calendar_id.into(),
            time_zone,
            refresher,
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }

    /// Send a request built for the current access token, retrying once with
    /// a forcibly refreshed token if the provider answers 401. A token that
    /// was just exchanged is not exchanged again.
    async fn send_authorized<F>(
        &self,
        owner: &OwnerCredentials,
        build: F,
    ) -> Result<Response, SyncError>
    where
        F: Fn(&str) -> RequestBuilder + Send + Sync,
    {
        let creds = self.refresher.ensure_fresh_credentials(owner).await?;
        let response = build(creds.access_token()).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return classify(response).await;
        }
        if creds.refreshed {
            return Err(SyncError::AuthExpired);
        }

        tracing::debug!(owner_id = %owner.owner_id, "calendar rejected access token, refreshing");
        let creds = self.refresher.refresh(&creds).await?;
        let response = build(creds.access_token()).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(SyncError::AuthExpired);
        }
        classify(response).await
    }

    async fn insert(
        &self,
        owner: &OwnerCredentials,
        event: &GoogleEvent,
    ) -> Result<String, SyncError> {
        let url = self.events_url();
        let response = self
            .send_authorized(owner, |token| {
                self.http.post(&url).bearer_auth(token).json(event)
            })
            .await?;

        let created: CreatedEvent = serde_json::from_str(&response.text().await?)?;
        Ok(created.id)
    }

    async fn replace(
        &self,
        owner: &OwnerCredentials,
        event_id: &str,
        event: &GoogleEvent,
    ) -> Result<(), SyncError> {
        let url = self.event_url(event_id);
        self.send_authorized(owner, |token| {
            self.http.put(&url).bearer_auth(token).json(event)
        })
        .await?;
        Ok(())
    }

    async fn remove(&self, owner: &OwnerCredentials, event_id: &str) -> Result<(), SyncError> {
        let url = self.event_url(event_id);
        self.send_authorized(owner, |token| self.http.delete(&url).bearer_auth(token))
            .await?;
        Ok(())
    }
}

async fn classify(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return Err(SyncError::RemoteNotFound);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SyncError::transport(format!(
        "calendar API returned {}: {}",
        status,
        body.chars().take(200).collect::<String>()
    )))
}

#[async_trait]
impl CalendarTransport for GoogleCalendarTransport {
    async fn create_event(
        &self,
        owner: &OwnerCredentials,
        appointment: &Appointment,
        client: Option<&Client>,
    ) -> Option<String> {
        let event = build_event(appointment, client, self.time_zone);
        match self.insert(owner, &event).await {
            Ok(event_id) => {
                tracing::info!(
                    appointment_id = %appointment.id,
                    owner_id = %owner.owner_id,
                    "created calendar event {}",
                    event_id
                );
                Some(event_id)
            }
            Err(e) => {
                tracing::warn!(
                    appointment_id = %appointment.id,
                    owner_id = %owner.owner_id,
                    "calendar event create failed: {}",
                    e
                );
                None
            }
        }
    }

    async fn update_event(
        &self,
        owner: &OwnerCredentials,
        event_id: &str,
        appointment: &Appointment,
        client: Option<&Client>,
    ) -> bool {
        let event = build_event(appointment, client, self.time_zone);
        match self.replace(owner, event_id, &event).await {
            Ok(()) => true,
            Err(SyncError::RemoteNotFound) => {
                tracing::info!(
                    appointment_id = %appointment.id,
                    "calendar event {} no longer exists",
                    event_id
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    appointment_id = %appointment.id,
                    owner_id = %owner.owner_id,
                    "calendar event update failed: {}",
                    e
                );
                false
            }
        }
    }

    async fn delete_event(&self, owner: &OwnerCredentials, event_id: &str) -> bool {
        match self.remove(owner, event_id).await {
            Ok(()) => true,
            Err(SyncError::RemoteNotFound) => {
                tracing::debug!("calendar event {} already removed", event_id);
                false
            }
            Err(e) => {
                tracing::warn!(
                    owner_id = %owner.owner_id,
                    "calendar event delete failed: {}",
                    e
                );
                false
            }
        }
    }
}
