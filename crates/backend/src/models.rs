// Database models for Diesel
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use shared_types::{CreateAppointmentRequest, UpdateAppointmentRequest};
use uuid::Uuid;

/// Insertable struct for new appointments
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::appointments)]
pub struct NewAppointment {
    pub client_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub duration_minutes: i32,
    pub label: String,
    pub notes: Option<String>,
}

impl From<CreateAppointmentRequest> for NewAppointment {
    fn from(req: CreateAppointmentRequest) -> Self {
        NewAppointment {
            client_id: req.client_id,
            staff_id: req.staff_id,
            appointment_date: req.date,
            appointment_time: req.time,
            duration_minutes: req.duration_minutes,
            label: req.label,
            notes: req.notes,
        }
    }
}

/// Partial update for an appointment row. `remote_event_ref` is absent on
/// purpose: only the sync write-back touches that column.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = crate::schema::appointments)]
pub struct AppointmentChanges {
    pub client_id: Option<Uuid>,
    pub staff_id: Option<Option<Uuid>>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub label: Option<String>,
    pub notes: Option<Option<String>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<UpdateAppointmentRequest> for AppointmentChanges {
    fn from(req: UpdateAppointmentRequest) -> Self {
        AppointmentChanges {
            client_id: req.client_id,
            staff_id: req.staff_id,
            appointment_date: req.date,
            appointment_time: req.time,
            duration_minutes: req.duration_minutes,
            label: req.label,
            notes: req.notes.map(|n| if n.is_empty() { None } else { Some(n) }),
            updated_at: Some(Utc::now()),
        }
    }
}
