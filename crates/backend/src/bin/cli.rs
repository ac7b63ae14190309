use anyhow::Context;
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared_types::{
    Appointment, CalendarLink, CalendarLinkResponse, CreateAppointmentRequest, ResyncResponse,
    StaffCalendarResponse, UpdateAppointmentRequest,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "clinic-cli")]
#[command(about = "CLI for managing appointments and staff calendar sync via the backend API")]
#[command(
    long_about = "A command-line interface for the clinic scheduling backend.\n\n\
    Supports creating, listing, updating, and cancelling appointments, inspecting\n\
    their calendar link, and re-running calendar sync for a single appointment."
)]
struct Cli {
    /// Backend server URL to connect to.
    #[arg(
        short,
        long,
        default_value = "http://localhost:3000",
        env = "CLINIC_API_URL"
    )]
    base_url: String,

    /// Session token sent as a bearer token.
    ///
    /// Calendar sync uses the signed-in staff member for appointments
    /// without an assigned owner. Generate one with `backend issue-token`.
    #[arg(short, long, env = "CLINIC_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage appointments
    Appointments {
        #[command(subcommand)]
        action: AppointmentAction,
    },
    /// Staff calendar connection settings
    Staff {
        #[command(subcommand)]
        action: StaffAction,
    },
}

#[derive(Subcommand)]
enum AppointmentAction {
    /// List all appointments in date order
    ///
    /// A ● marks appointments linked to a calendar event, ○ those that are not.
    List,

    /// Show one appointment in full
    Show { id: Uuid },

    /// Schedule a new appointment
    Create {
        /// Client (patient) UUID.
        #[arg(long, value_name = "UUID")]
        client: Uuid,

        /// Staff member responsible. Defaults to the signed-in staff member
        /// for calendar purposes.
        #[arg(long, value_name = "UUID")]
        staff: Option<Uuid>,

        /// Date as YYYY-MM-DD.
        #[arg(long)]
        date: NaiveDate,

        /// Start time as HH:MM or HH:MM:SS.
        #[arg(long, value_parser = parse_time)]
        time: NaiveTime,

        /// Length in minutes.
        #[arg(long, default_value_t = 30)]
        duration: i32,

        /// Short description shown as the calendar event title.
        #[arg(short, long)]
        label: String,

        #[arg(short, long, value_name = "TEXT")]
        notes: Option<String>,
    },

    /// Reschedule, reassign, or edit an appointment
    ///
    /// Only specified fields are changed.
    Update {
        id: Uuid,

        #[arg(long, value_name = "UUID")]
        client: Option<Uuid>,

        /// New responsible staff member.
        #[arg(long, value_name = "UUID", conflicts_with = "unassign")]
        staff: Option<Uuid>,

        /// Remove the assigned staff member.
        #[arg(long)]
        unassign: bool,

        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long, value_parser = parse_time)]
        time: Option<NaiveTime>,

        #[arg(long)]
        duration: Option<i32>,

        #[arg(short, long)]
        label: Option<String>,

        /// Use empty string "" to clear the notes.
        #[arg(short, long, value_name = "TEXT")]
        notes: Option<String>,
    },

    /// Cancel an appointment and remove its calendar event
    Delete { id: Uuid },

    /// Show whether an appointment is linked to a calendar event
    Calendar { id: Uuid },

    /// Run calendar sync again for one appointment
    ///
    /// Sync failures are never retried automatically; use this after a
    /// calendar outage or reconnecting a staff calendar.
    Resync { id: Uuid },
}

#[derive(Subcommand)]
enum StaffAction {
    /// List staff calendar connections
    Calendars,

    /// Turn calendar sync on or off for a staff member
    ToggleSync { id: Uuid },

    /// Disconnect a staff member's calendar and forget its tokens
    Disconnect { id: Uuid },
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| format!("invalid time '{}', expected HH:MM", value))
}

struct Api {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl Api {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> anyhow::Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .context("Failed to reach backend")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Request failed ({}): {}", status, body);
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> anyhow::Result<T> {
        self.send(request)
            .await?
            .json()
            .await
            .context("Failed to parse response")
    }
}

fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn print_appointment(appt: &Appointment) {
    let marker = if appt.calendar_link().is_linked() {
        "●"
    } else {
        "○"
    };
    println!(
        "{} [{}] {} {} ({} min) {}",
        marker,
        short_id(&appt.id),
        appt.date,
        appt.time.format("%H:%M"),
        appt.duration_minutes,
        appt.label
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let api = Api {
        client: Client::new(),
        base_url: cli.base_url,
        token: cli.token,
    };

    match cli.command {
        Commands::Appointments { action } => handle_appointments(&api, action).await?,
        Commands::Staff { action } => handle_staff(&api, action).await?,
    }

    Ok(())
}

async fn handle_appointments(api: &Api, action: AppointmentAction) -> anyhow::Result<()> {
    let url = api.url("/api/appointments");

    match action {
        AppointmentAction::List => {
            let items: Vec<Appointment> = api.json(api.client.get(&url)).await?;
            if items.is_empty() {
                println!("No appointments found.");
            } else {
                for appt in &items {
                    print_appointment(appt);
                }
            }
        }
        AppointmentAction::Show { id } => {
            let appt: Appointment = api.json(api.client.get(format!("{}/{}", url, id))).await?;
            print_appointment(&appt);
            println!("    Client: {}", appt.client_id);
            match appt.staff_id {
                Some(staff) => println!("    Staff: {}", staff),
                None => println!("    Staff: (unassigned)"),
            }
            if let Some(notes) = &appt.notes {
                println!("    Notes: {}", notes);
            }
            if let Some(event_ref) = &appt.remote_event_ref {
                println!("    Calendar event: {}", event_ref);
            }
        }
        AppointmentAction::Create {
            client,
            staff,
            date,
            time,
            duration,
            label,
            notes,
        } => {
            let req = CreateAppointmentRequest {
                client_id: client,
                staff_id: staff,
                date,
                time,
                duration_minutes: duration,
                label,
                notes,
            };
            let appt: Appointment = api.json(api.client.post(&url).json(&req)).await?;
            println!("Created appointment: [{}] {}", short_id(&appt.id), appt.label);
            println!("    Calendar sync queued.");
        }
        AppointmentAction::Update {
            id,
            client,
            staff,
            unassign,
            date,
            time,
            duration,
            label,
            notes,
        } => {
            let staff_id = if unassign { Some(None) } else { staff.map(Some) };
            let req = UpdateAppointmentRequest {
                client_id: client,
                staff_id,
                date,
                time,
                duration_minutes: duration,
                label,
                notes,
            };
            let appt: Appointment = api
                .json(api.client.put(format!("{}/{}", url, id)).json(&req))
                .await?;
            println!("Updated appointment: [{}] {}", short_id(&appt.id), appt.label);
        }
        AppointmentAction::Delete { id } => {
            api.send(api.client.delete(format!("{}/{}", url, id)))
                .await?;
            println!("Deleted appointment: {}", id);
        }
        AppointmentAction::Calendar { id } => {
            let link: CalendarLinkResponse = api
                .json(api.client.get(format!("{}/{}/calendar", url, id)))
                .await?;
            match link.link {
                CalendarLink::Linked { event_ref } => {
                    println!("[{}] linked to event {}", short_id(&link.appointment_id), event_ref)
                }
                CalendarLink::Unsynced => {
                    println!("[{}] not synced", short_id(&link.appointment_id))
                }
            }
        }
        AppointmentAction::Resync { id } => {
            let resp: ResyncResponse = api
                .json(api.client.post(format!("{}/{}/resync", url, id)))
                .await?;
            if resp.queued {
                println!("Resync queued for [{}]", short_id(&resp.appointment_id));
            }
        }
    }

    Ok(())
}

async fn handle_staff(api: &Api, action: StaffAction) -> anyhow::Result<()> {
    match action {
        StaffAction::Calendars => {
            let members: Vec<StaffCalendarResponse> =
                api.json(api.client.get(api.url("/api/staff/calendars"))).await?;
            if members.is_empty() {
                println!("No staff found.");
            }
            for m in members {
                let state = match (m.calendar_connected, m.sync_enabled) {
                    (true, true) => "syncing",
                    (true, false) => "connected, sync off",
                    (false, _) => "not connected",
                };
                println!(
                    "[{}] {} ({}) {}",
                    short_id(&m.staff_id),
                    m.name,
                    state,
                    m.calendar_email.as_deref().unwrap_or("")
                );
            }
        }
        StaffAction::ToggleSync { id } => {
            let m: StaffCalendarResponse = api
                .json(
                    api.client
                        .post(api.url(&format!("/api/staff/{}/calendar/toggle", id))),
                )
                .await?;
            println!(
                "Calendar sync for {} is now {}",
                m.name,
                if m.sync_enabled { "on" } else { "off" }
            );
        }
        StaffAction::Disconnect { id } => {
            let m: StaffCalendarResponse = api
                .json(
                    api.client
                        .delete(api.url(&format!("/api/staff/{}/calendar", id))),
                )
                .await?;
            println!("Disconnected calendar for {}", m.name);
        }
    }

    Ok(())
}
