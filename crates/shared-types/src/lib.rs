use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Appointment struct matching database column order exactly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct Appointment {
    pub id: Uuid,
    pub client_id: Uuid,
    /// Staff member responsible for the appointment. `None` means the
    /// appointment falls to whoever is acting in the current session.
    pub staff_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: i32,
    pub label: String,
    pub notes: Option<String>,
    /// Opaque event id returned by the calendar provider.
    pub remote_event_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at() + chrono::Duration::minutes(i64::from(self.duration_minutes.max(0)))
    }

    pub fn calendar_link(&self) -> CalendarLink {
        CalendarLink::from_ref(self.remote_event_ref.as_deref())
    }

    pub fn snapshot(&self) -> AppointmentSnapshot {
        AppointmentSnapshot {
            appointment_id: self.id,
            staff_id: self.staff_id,
            remote_event_ref: self.remote_event_ref.clone(),
        }
    }
}

/// The parts of an appointment that decide which remote event it owns,
/// captured before a mutation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentSnapshot {
    pub appointment_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub remote_event_ref: Option<String>,
}

/// Linkage between an appointment and its remote calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CalendarLink {
    Unsynced,
    Linked { event_ref: String },
}

impl CalendarLink {
    pub fn from_ref(event_ref: Option<&str>) -> Self {
        match event_ref {
            Some(r) if !r.is_empty() => CalendarLink::Linked {
                event_ref: r.to_string(),
            },
            _ => CalendarLink::Unsynced,
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self, CalendarLink::Linked { .. })
    }
}

/// Staff account, including the calendar credentials stored on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct StaffMember {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub calendar_connected: bool,
    pub sync_enabled: bool,
    #[serde(skip_serializing)]
    pub calendar_access_token: Option<String>,
    #[serde(skip_serializing)]
    pub calendar_refresh_token: Option<String>,
    pub calendar_token_expires_at: Option<DateTime<Utc>>,
    pub calendar_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StaffMember {
    /// Whether appointments owned by this staff member should reach their calendar.
    pub fn calendar_sync_active(&self) -> bool {
        self.calendar_connected && self.sync_enabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(diesel::Queryable))]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

// API Request/Response types for appointment management
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub client_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: i32,
    pub label: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub client_id: Option<Uuid>,
    /// `Some(None)` unassigns the appointment, `None` leaves it untouched.
    #[serde(
        default,
        with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub staff_id: Option<Option<Uuid>>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub label: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarLinkResponse {
    pub appointment_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub link: CalendarLink,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResyncResponse {
    pub appointment_id: Uuid,
    pub queued: bool,
}

// Staff calendar settings (tokens never leave the server)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffCalendarResponse {
    pub staff_id: Uuid,
    pub name: String,
    pub calendar_connected: bool,
    pub sync_enabled: bool,
    pub calendar_email: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

impl From<StaffMember> for StaffCalendarResponse {
    fn from(staff: StaffMember) -> Self {
        StaffCalendarResponse {
            staff_id: staff.id,
            name: staff.name,
            calendar_connected: staff.calendar_connected,
            sync_enabled: staff.sync_enabled,
            calendar_email: staff.calendar_email,
            token_expires_at: staff.calendar_token_expires_at,
        }
    }
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T: Serialize, S: Serializer>(
        value: &Option<Option<T>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T: Deserialize<'de>, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<T>>, D::Error> {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment() -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            staff_id: None,
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            time: NaiveTime::from_hms_opt(23, 30, 0).unwrap(),
            duration_minutes: 45,
            label: "Follow-up".to_string(),
            notes: None,
            remote_event_ref: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_end_time_crosses_midnight() {
        let appt = appointment();
        assert_eq!(
            appt.ends_at(),
            NaiveDate::from_ymd_opt(2026, 3, 15)
                .unwrap()
                .and_hms_opt(0, 15, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_calendar_link_states() {
        let mut appt = appointment();
        assert_eq!(appt.calendar_link(), CalendarLink::Unsynced);

        appt.remote_event_ref = Some(String::new());
        assert_eq!(appt.calendar_link(), CalendarLink::Unsynced);

        appt.remote_event_ref = Some("evt_1".to_string());
        assert!(appt.calendar_link().is_linked());

        let json = serde_json::to_value(appt.calendar_link()).unwrap();
        assert_eq!(json["state"], "linked");
        assert_eq!(json["event_ref"], "evt_1");
    }

    #[test]
    fn test_update_request_distinguishes_unassign_from_absent() {
        let absent: UpdateAppointmentRequest = serde_json::from_str(r#"{"label":"x"}"#).unwrap();
        assert_eq!(absent.staff_id, None);

        let cleared: UpdateAppointmentRequest =
            serde_json::from_str(r#"{"staff_id":null}"#).unwrap();
        assert_eq!(cleared.staff_id, Some(None));

        let id = Uuid::new_v4();
        let set: UpdateAppointmentRequest =
            serde_json::from_str(&format!(r#"{{"staff_id":"{}"}}"#, id)).unwrap();
        assert_eq!(set.staff_id, Some(Some(id)));
    }

    #[test]
    fn test_update_request_round_trip_keeps_staff_untouched() {
        let req = UpdateAppointmentRequest {
            label: Some("Renamed".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("staff_id"));

        let back: UpdateAppointmentRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.staff_id, None);
        assert_eq!(back.label.as_deref(), Some("Renamed"));

        let unassign = UpdateAppointmentRequest {
            staff_id: Some(None),
            ..Default::default()
        };
        let back: UpdateAppointmentRequest =
            serde_json::from_str(&serde_json::to_string(&unassign).unwrap()).unwrap();
        assert_eq!(back.staff_id, Some(None));

        let id = Uuid::new_v4();
        let assign = UpdateAppointmentRequest {
            staff_id: Some(Some(id)),
            ..Default::default()
        };
        let back: UpdateAppointmentRequest =
            serde_json::from_str(&serde_json::to_string(&assign).unwrap()).unwrap();
        assert_eq!(back.staff_id, Some(Some(id)));
    }

    #[test]
    fn test_staff_tokens_are_not_serialized() {
        let staff = StaffMember {
            id: Uuid::new_v4(),
            name: "Dr. Rivera".to_string(),
            email: "rivera@clinic.test".to_string(),
            calendar_connected: true,
            sync_enabled: true,
            calendar_access_token: Some("secret-access".to_string()),
            calendar_refresh_token: Some("secret-refresh".to_string()),
            calendar_token_expires_at: None,
            calendar_email: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&staff).unwrap();
        assert!(!json.contains("secret-access"));
        assert!(!json.contains("secret-refresh"));
        assert!(staff.calendar_sync_active());
    }
}
