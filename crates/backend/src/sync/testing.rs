//! In-memory fakes for the sync ports.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use shared_types::{Appointment, AppointmentSnapshot, Client, StaffMember};
use uuid::Uuid;

use super::credentials::{OwnerCredentials, RefreshedToken, TokenExchange};
use super::error::SyncError;
use super::ports::{AppointmentStore, OwnerDirectory};
use super::transport::CalendarTransport;

pub fn staff_member(connected: bool, enabled: bool) -> StaffMember {
    let id = Uuid::new_v4();
    StaffMember {
        id,
        name: "Dr. Okafor".to_string(),
        email: format!("{}@clinic.test", id.simple()),
        calendar_connected: connected,
        sync_enabled: enabled,
        calendar_access_token: Some(format!("access-{}", id.simple())),
        calendar_refresh_token: Some(format!("refresh-{}", id.simple())),
        calendar_token_expires_at: Some(Utc::now() + Duration::hours(1)),
        calendar_email: Some("okafor@gmail.test".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// A 45 minute consultation on 2026-05-04 at 09:30.
pub fn appointment(staff_id: Option<Uuid>, event_ref: Option<&str>) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        client_id: Uuid::new_v4(),
        staff_id,
        date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
        time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        duration_minutes: 45,
        label: "Consultation".to_string(),
        notes: None,
        remote_event_ref: event_ref.map(str::to_string),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn client() -> Client {
    Client {
        id: Uuid::new_v4(),
        name: "Ada Lovelace".to_string(),
        email: Some("ada@example.com".to_string()),
        phone: Some("+44 20 7946 0000".to_string()),
        created_at: Utc::now(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Create { owner_id: Uuid, appointment_id: Uuid },
    Update { owner_id: Uuid, event_ref: String },
    Delete { owner_id: Uuid, event_ref: String },
}

/// Records every call. Results come from the scripted queues, falling back
/// to success (`evt_auto_N` for creates) once a queue is empty.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    clients: Mutex<Vec<Option<Uuid>>>,
    creates: Mutex<VecDeque<Option<String>>>,
    updates: Mutex<VecDeque<bool>>,
    deletes: Mutex<VecDeque<bool>>,
    generated: AtomicUsize,
}

impl RecordingTransport {
    pub fn script_create(&self, result: Option<&str>) {
        self.creates
            .lock()
            .unwrap()
            .push_back(result.map(str::to_string));
    }

    pub fn script_update(&self, result: bool) {
        self.updates.lock().unwrap().push_back(result);
    }

    pub fn script_delete(&self, result: bool) {
        self.deletes.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clients_seen(&self) -> Vec<Option<Uuid>> {
        self.clients.lock().unwrap().clone()
    }

    pub fn count_creates(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Create { .. }))
    }

    pub fn count_updates(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Update { .. }))
    }

    pub fn count_deletes(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Delete { .. }))
    }

    fn count(&self, pred: impl Fn(&TransportCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl CalendarTransport for RecordingTransport {
    async fn create_event(
        &self,
        owner: &OwnerCredentials,
        appointment: &Appointment,
        client: Option<&Client>,
    ) -> Option<String> {
        self.calls.lock().unwrap().push(TransportCall::Create {
            owner_id: owner.owner_id,
            appointment_id: appointment.id,
        });
        self.clients.lock().unwrap().push(client.map(|c| c.id));

        let scripted = self.creates.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            let n = self.generated.fetch_add(1, Ordering::SeqCst);
            Some(format!("evt_auto_{}", n))
        })
    }

    async fn update_event(
        &self,
        owner: &OwnerCredentials,
        event_id: &str,
        _appointment: &Appointment,
        client: Option<&Client>,
    ) -> bool {
        self.calls.lock().unwrap().push(TransportCall::Update {
            owner_id: owner.owner_id,
            event_ref: event_id.to_string(),
        });
        self.clients.lock().unwrap().push(client.map(|c| c.id));
        self.updates.lock().unwrap().pop_front().unwrap_or(true)
    }

    async fn delete_event(&self, owner: &OwnerCredentials, event_id: &str) -> bool {
        self.calls.lock().unwrap().push(TransportCall::Delete {
            owner_id: owner.owner_id,
            event_ref: event_id.to_string(),
        });
        self.deletes.lock().unwrap().pop_front().unwrap_or(true)
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    snapshots: Mutex<HashMap<Uuid, AppointmentSnapshot>>,
    clients: Mutex<HashMap<Uuid, Client>>,
    writes: Mutex<Vec<(Uuid, Option<String>)>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn insert(&self, appointment: &Appointment) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(appointment.id, appointment.snapshot());
    }

    pub fn insert_client(&self, client: &Client) {
        self.clients.lock().unwrap().insert(client.id, client.clone());
    }

    pub fn event_ref(&self, appointment_id: Uuid) -> Option<String> {
        self.snapshots
            .lock()
            .unwrap()
            .get(&appointment_id)
            .and_then(|s| s.remote_event_ref.clone())
    }

    pub fn writes(&self) -> Vec<(Uuid, Option<String>)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn get_snapshot(
        &self,
        appointment_id: Uuid,
    ) -> anyhow::Result<Option<AppointmentSnapshot>> {
        Ok(self.snapshots.lock().unwrap().get(&appointment_id).cloned())
    }

    async fn write_event_ref(
        &self,
        appointment_id: Uuid,
        event_ref: Option<&str>,
    ) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("store unavailable");
        }
        self.writes
            .lock()
            .unwrap()
            .push((appointment_id, event_ref.map(str::to_string)));
        if let Some(snapshot) = self.snapshots.lock().unwrap().get_mut(&appointment_id) {
            snapshot.remote_event_ref = event_ref.map(str::to_string);
        }
        Ok(())
    }

    async fn load_client(&self, client_id: Uuid) -> anyhow::Result<Option<Client>> {
        Ok(self.clients.lock().unwrap().get(&client_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    members: Mutex<HashMap<Uuid, StaffMember>>,
    persisted: Mutex<Vec<(Uuid, String, DateTime<Utc>)>>,
    loads: AtomicUsize,
    fail_loads: AtomicBool,
}

impl InMemoryDirectory {
    pub fn with_members(members: Vec<StaffMember>) -> Self {
        let directory = Self::default();
        {
            let mut map = directory.members.lock().unwrap();
            for m in members {
                map.insert(m.id, m);
            }
        }
        directory
    }

    pub fn persisted_tokens(&self) -> Vec<(Uuid, String, DateTime<Utc>)> {
        self.persisted.lock().unwrap().clone()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn fail_loads(&self) {
        self.fail_loads.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OwnerDirectory for InMemoryDirectory {
    async fn load_owner(&self, staff_id: Uuid) -> anyhow::Result<Option<StaffMember>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            anyhow::bail!("directory unavailable");
        }
        Ok(self.members.lock().unwrap().get(&staff_id).cloned())
    }

    async fn persist_refreshed_token(
        &self,
        staff_id: Uuid,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.persisted
            .lock()
            .unwrap()
            .push((staff_id, access_token.to_string(), expires_at));
        if let Some(member) = self.members.lock().unwrap().get_mut(&staff_id) {
            member.calendar_access_token = Some(access_token.to_string());
            member.calendar_token_expires_at = Some(expires_at);
        }
        Ok(())
    }
}

/// Token exchange with a fixed answer.
pub struct StaticTokenExchange {
    token: Option<String>,
    calls: AtomicUsize,
}

impl StaticTokenExchange {
    pub fn succeeding(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            token: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenExchange for StaticTokenExchange {
    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedToken, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.token {
            Some(token) => Ok(RefreshedToken {
                access_token: token.clone(),
                expires_at: Utc::now() + Duration::hours(1),
            }),
            None => Err(SyncError::transport("invalid_grant")),
        }
    }
}
