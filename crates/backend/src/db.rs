use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager, ManagerConfig},
    AsyncPgConnection, RunQueryDsl,
};
use shared_types::{Appointment, Client, StaffMember};
use uuid::Uuid;

use crate::models::{AppointmentChanges, NewAppointment};

pub type DbPool = Pool<AsyncPgConnection>;

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    AsyncPgConnection::try_from(client).await
}

/// Build the connection pool. Connections are opened lazily on first use.
pub fn establish_connection_pool(database_url: &str, use_tls: bool) -> anyhow::Result<DbPool> {
    let config = if use_tls {
        let mut manager_config = ManagerConfig::default();
        manager_config.custom_setup =
            Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));
        AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
            database_url,
            manager_config,
        )
    } else {
        AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url)
    };

    let pool = Pool::builder(config).max_size(10).build()?;

    Ok(pool)
}

// Appointment database operations
pub mod appointments {
    use super::*;

    pub async fn list_all(conn: &mut AsyncPgConnection) -> anyhow::Result<Vec<Appointment>> {
        use crate::schema::appointments::dsl::*;

        let items = appointments
            .order_by((appointment_date.asc(), appointment_time.asc()))
            .load::<Appointment>(conn)
            .await?;

        Ok(items)
    }

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        appointment_id: Uuid,
    ) -> Result<Appointment, diesel::result::Error> {
        use crate::schema::appointments::dsl::*;

        appointments
            .filter(id.eq(appointment_id))
            .first::<Appointment>(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        appointment_id: Uuid,
    ) -> anyhow::Result<Option<Appointment>> {
        use crate::schema::appointments::dsl::*;

        let item = appointments
            .filter(id.eq(appointment_id))
            .first::<Appointment>(conn)
            .await
            .optional()?;

        Ok(item)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_appointment: NewAppointment,
    ) -> Result<Appointment, diesel::result::Error> {
        use crate::schema::appointments::dsl::*;

        diesel::insert_into(appointments)
            .values(&new_appointment)
            .get_result::<Appointment>(conn)
            .await
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        appointment_id: Uuid,
        changes: AppointmentChanges,
    ) -> Result<Appointment, diesel::result::Error> {
        use crate::schema::appointments::dsl::*;

        diesel::update(appointments.filter(id.eq(appointment_id)))
            .set(&changes)
            .get_result::<Appointment>(conn)
            .await
    }

    /// Returns whether a row was removed.
    pub async fn delete(
        conn: &mut AsyncPgConnection,
        appointment_id: Uuid,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::appointments::dsl::*;

        let removed = diesel::delete(appointments.filter(id.eq(appointment_id)))
            .execute(conn)
            .await?;

        Ok(removed > 0)
    }

    /// Store the calendar event reference without touching `updated_at`.
    pub async fn set_remote_event_ref(
        conn: &mut AsyncPgConnection,
        appointment_id: Uuid,
        event_ref: Option<&str>,
    ) -> anyhow::Result<()> {
        use crate::schema::appointments::dsl::*;

        diesel::update(appointments.filter(id.eq(appointment_id)))
            .set(remote_event_ref.eq(event_ref))
            .execute(conn)
            .await?;

        Ok(())
    }
}

// Staff database operations
pub mod staff {
    use super::*;

    pub async fn list_all(conn: &mut AsyncPgConnection) -> anyhow::Result<Vec<StaffMember>> {
        use crate::schema::staff::dsl::*;

        let members = staff
            .order_by(name.asc())
            .load::<StaffMember>(conn)
            .await?;

        Ok(members)
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        staff_id: Uuid,
    ) -> anyhow::Result<Option<StaffMember>> {
        use crate::schema::staff::dsl::*;

        let member = staff
            .filter(id.eq(staff_id))
            .first::<StaffMember>(conn)
            .await
            .optional()?;

        Ok(member)
    }

    pub async fn update_access_token(
        conn: &mut AsyncPgConnection,
        staff_id: Uuid,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        use crate::schema::staff::dsl::*;

        diesel::update(staff.filter(id.eq(staff_id)))
            .set((
                calendar_access_token.eq(Some(access_token)),
                calendar_token_expires_at.eq(Some(expires_at)),
                updated_at.eq(Utc::now()),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn toggle_sync(
        conn: &mut AsyncPgConnection,
        staff_id: Uuid,
    ) -> Result<StaffMember, diesel::result::Error> {
        use crate::schema::staff::dsl::*;

        diesel::update(staff.filter(id.eq(staff_id)))
            .set((sync_enabled.eq(diesel::dsl::not(sync_enabled)), updated_at.eq(Utc::now())))
            .get_result::<StaffMember>(conn)
            .await
    }

    pub async fn disconnect_calendar(
        conn: &mut AsyncPgConnection,
        staff_id: Uuid,
    ) -> Result<StaffMember, diesel::result::Error> {
        use crate::schema::staff::dsl::*;

        diesel::update(staff.filter(id.eq(staff_id)))
            .set((
                calendar_connected.eq(false),
                calendar_access_token.eq(None::<String>),
                calendar_refresh_token.eq(None::<String>),
                calendar_token_expires_at.eq(None::<DateTime<Utc>>),
                calendar_email.eq(None::<String>),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<StaffMember>(conn)
            .await
    }
}

// Client database operations
pub mod clients {
    use super::*;

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        client_id: Uuid,
    ) -> anyhow::Result<Option<Client>> {
        use crate::schema::clients::dsl::*;

        let client = clients
            .filter(id.eq(client_id))
            .first::<Client>(conn)
            .await
            .optional()?;

        Ok(client)
    }
}
