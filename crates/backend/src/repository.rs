//! Postgres-backed implementations of the sync ports.
//!
//! Each call checks a connection out of the shared pool for the duration of
//! a single query, so background sync tasks never hold one across a remote
//! calendar request.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{AppointmentSnapshot, Client, StaffMember};
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::sync::{AppointmentStore, OwnerDirectory};

#[derive(Clone)]
pub struct PgAppointmentStore {
    pool: DbPool,
}

impl PgAppointmentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AppointmentStore for PgAppointmentStore {
    async fn get_snapshot(
        &self,
        appointment_id: Uuid,
    ) -> anyhow::Result<Option<AppointmentSnapshot>> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        let appointment = db::appointments::find_by_id(&mut conn, appointment_id)
            .await
            .context("Failed to load appointment snapshot")?;

        Ok(appointment.map(|a| a.snapshot()))
    }

    async fn write_event_ref(
        &self,
        appointment_id: Uuid,
        event_ref: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        db::appointments::set_remote_event_ref(&mut conn, appointment_id, event_ref)
            .await
            .context("Failed to write calendar event reference")
    }

    async fn load_client(&self, client_id: Uuid) -> anyhow::Result<Option<Client>> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        db::clients::find_by_id(&mut conn, client_id)
            .await
            .context("Failed to load client")
    }
}

#[derive(Clone)]
pub struct PgOwnerDirectory {
    pool: DbPool,
}

impl PgOwnerDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OwnerDirectory for PgOwnerDirectory {
    async fn load_owner(&self, staff_id: Uuid) -> anyhow::Result<Option<StaffMember>> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        db::staff::find_by_id(&mut conn, staff_id)
            .await
            .context("Failed to load staff member")
    }

    async fn persist_refreshed_token(
        &self,
        staff_id: Uuid,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get database connection")?;

        db::staff::update_access_token(&mut conn, staff_id, access_token, expires_at)
            .await
            .context("Failed to store refreshed calendar token")?;

        tracing::debug!(%staff_id, "stored refreshed calendar token");
        Ok(())
    }
}
