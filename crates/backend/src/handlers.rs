use axum::{
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use shared_types::{
    Appointment, CalendarLinkResponse, CreateAppointmentRequest, ResyncResponse,
    StaffCalendarResponse, UpdateAppointmentRequest,
};
use uuid::Uuid;

use crate::auth::extract_session_actor;
use crate::db::{appointments, staff};
use crate::error::{ApiError, ApiResult};
use crate::models::{AppointmentChanges, NewAppointment};
use crate::state::AppState;
use crate::sync::{SessionActor, SyncJob};

// Appointment handlers

pub async fn list_appointments(State(state): State<AppState>) -> ApiResult<Json<Vec<Appointment>>> {
    let mut conn = state.pool.get().await?;
    let items = appointments::list_all(&mut conn).await?;
    Ok(Json(items))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Appointment>> {
    let mut conn = state.pool.get().await?;
    let appointment = appointments::get_by_id(&mut conn, id).await?;
    Ok(Json(appointment))
}

pub async fn create_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateAppointmentRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_create(&payload)?;
    let session = extract_session_actor(&headers, &state.auth, &state.pool).await?;

    let mut conn = state.pool.get().await?;
    let appointment = appointments::create(&mut conn, NewAppointment::from(payload)).await?;
    tracing::info!(appointment_id = %appointment.id, "appointment created");

    state.dispatcher.submit(
        SyncJob::Created {
            appointment: appointment.clone(),
        },
        session,
    );

    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn update_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAppointmentRequest>,
) -> ApiResult<Json<Appointment>> {
    validate_update(&payload)?;
    let session = extract_session_actor(&headers, &state.auth, &state.pool).await?;

    // The owner and event reference must be read before the row changes.
    let previous = state
        .store
        .get_snapshot(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment"))?;

    let mut conn = state.pool.get().await?;
    let current = appointments::update(&mut conn, id, AppointmentChanges::from(payload)).await?;

    state.dispatcher.submit(
        SyncJob::Updated {
            previous,
            current: current.clone(),
        },
        session,
    );

    Ok(Json(current))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let session = extract_session_actor(&headers, &state.auth, &state.pool).await?;

    let snapshot = state
        .store
        .get_snapshot(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment"))?;

    let mut conn = state.pool.get().await?;
    if !appointments::delete(&mut conn, id).await? {
        return Err(ApiError::not_found("Appointment"));
    }

    state
        .dispatcher
        .submit(SyncJob::Deleted { snapshot }, session);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_appointment_calendar(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CalendarLinkResponse>> {
    let mut conn = state.pool.get().await?;
    let appointment = appointments::get_by_id(&mut conn, id).await?;

    Ok(Json(CalendarLinkResponse {
        appointment_id: appointment.id,
        staff_id: appointment.staff_id,
        link: appointment.calendar_link(),
    }))
}

/// Run the update path again against the stored state. Useful after a sync
/// failed, since failed jobs are never retried on their own.
pub async fn resync_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let session = extract_session_actor(&headers, &state.auth, &state.pool).await?;

    let mut conn = state.pool.get().await?;
    let appointment = appointments::find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment"))?;

    state
        .dispatcher
        .submit(SyncJob::Resync { appointment }, session);

    Ok((
        StatusCode::ACCEPTED,
        Json(ResyncResponse {
            appointment_id: id,
            queued: true,
        }),
    ))
}

// Staff calendar settings

pub async fn list_staff_calendars(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<StaffCalendarResponse>>> {
    let mut conn = state.pool.get().await?;
    let members = staff::list_all(&mut conn).await?;
    Ok(Json(members.into_iter().map(Into::into).collect()))
}

pub async fn toggle_staff_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(staff_id): Path<Uuid>,
) -> ApiResult<Json<StaffCalendarResponse>> {
    let actor = extract_session_actor(&headers, &state.auth, &state.pool).await?;
    require_actor(&actor)?;

    let mut conn = state.pool.get().await?;
    let member = staff::toggle_sync(&mut conn, staff_id).await?;
    tracing::info!(%staff_id, sync_enabled = member.sync_enabled, "calendar sync toggled");

    Ok(Json(member.into()))
}

/// Forget the staff member's calendar tokens. Events already created stay on
/// their calendar; appointments keep their references until next synced.
pub async fn disconnect_staff_calendar(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(staff_id): Path<Uuid>,
) -> ApiResult<Json<StaffCalendarResponse>> {
    let actor = extract_session_actor(&headers, &state.auth, &state.pool).await?;
    require_actor(&actor)?;

    let mut conn = state.pool.get().await?;
    let member = staff::disconnect_calendar(&mut conn, staff_id).await?;
    tracing::info!(%staff_id, "calendar disconnected");

    Ok(Json(member.into()))
}

fn require_actor(actor: &SessionActor) -> ApiResult<()> {
    actor
        .current_session_owner()
        .map(|_| ())
        .ok_or_else(|| ApiError::Unauthorized("Sign in to change calendar settings".to_string()))
}

fn validate_duration(minutes: i32) -> ApiResult<()> {
    if minutes <= 0 {
        return Err(ApiError::bad_request("duration_minutes must be positive"));
    }
    Ok(())
}

fn validate_label(label: &str) -> ApiResult<()> {
    if label.trim().is_empty() {
        return Err(ApiError::bad_request("label must not be empty"));
    }
    Ok(())
}

fn validate_create(req: &CreateAppointmentRequest) -> ApiResult<()> {
    validate_duration(req.duration_minutes)?;
    validate_label(&req.label)
}

fn validate_update(req: &UpdateAppointmentRequest) -> ApiResult<()> {
    if let Some(minutes) = req.duration_minutes {
        validate_duration(minutes)?;
    }
    if let Some(label) = &req.label {
        validate_label(label)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn create_request() -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            client_id: Uuid::new_v4(),
            staff_id: None,
            date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 30,
            label: "Check-up".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_validate_create() {
        assert!(validate_create(&create_request()).is_ok());

        let mut req = create_request();
        req.duration_minutes = 0;
        assert!(matches!(validate_create(&req), Err(ApiError::BadRequest(_))));

        let mut req = create_request();
        req.label = "   ".to_string();
        assert!(matches!(validate_create(&req), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_validate_update_only_checks_present_fields() {
        assert!(validate_update(&UpdateAppointmentRequest::default()).is_ok());

        let req = UpdateAppointmentRequest {
            duration_minutes: Some(-15),
            ..Default::default()
        };
        assert!(validate_update(&req).is_err());
    }

    #[test]
    fn test_require_actor() {
        assert!(matches!(
            require_actor(&SessionActor::anonymous()),
            Err(ApiError::Unauthorized(_))
        ));
        let actor = SessionActor::new(Some(crate::sync::testing::staff_member(true, true)));
        assert!(require_actor(&actor).is_ok());
    }
}
