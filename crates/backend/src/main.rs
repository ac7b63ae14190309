use axum::{
    http::{header, Method, StatusCode},
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod repository;
mod schema;
mod state;
mod sync;

use auth::AuthConfig;
use config::AppConfig;
use repository::{PgAppointmentStore, PgOwnerDirectory};
use state::AppState;
use sync::{
    CredentialRefresher, GoogleCalendarTransport, GoogleTokenExchange, OwnerResolver,
    SyncDispatcher, SyncOrchestrator,
};

#[derive(Parser)]
#[command(name = "backend")]
#[command(about = "Clinic scheduling API with calendar sync")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Print a session token for a staff member
    IssueToken {
        #[arg(long)]
        staff_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("backend=debug,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(AppConfig::from_env()?).await,
        Command::IssueToken { staff_id } => {
            let secret = std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;
            let token = auth::jwt::create_token(&AuthConfig::new(secret), staff_id)?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    // Establish database connection pool
    let pool = db::establish_connection_pool(&config.database_url, config.database_tls)?;

    let store = Arc::new(PgAppointmentStore::new(pool.clone()));
    let directory = Arc::new(PgOwnerDirectory::new(pool.clone()));

    let http = reqwest::Client::new();
    let calendar = &config.calendar;
    let refresher = CredentialRefresher::new(
        Arc::new(GoogleTokenExchange::new(
            http.clone(),
            calendar.token_url.clone(),
            calendar.google_client_id.clone(),
            calendar.google_client_secret.clone(),
        )),
        directory.clone(),
    );
    let transport = Arc::new(GoogleCalendarTransport::new(
        http,
        calendar.api_base.clone(),
        calendar.calendar_id.clone(),
        calendar.time_zone,
        refresher.clone(),
    ));

    let orchestrator = SyncOrchestrator::new(
        transport,
        store.clone(),
        OwnerResolver::new(directory),
        refresher,
    );
    tracing::info!(
        calendar_id = %calendar.calendar_id,
        time_zone = %calendar.time_zone,
        "calendar sync enabled"
    );

    let state = AppState {
        pool,
        auth: AuthConfig::new(config.jwt_secret.clone()),
        dispatcher: SyncDispatcher::new(Arc::new(orchestrator)),
        store,
    };

    let app = build_router(state, config.cors_allowed_origins.as_deref());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState, cors_allowed_origins: Option<&str>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Appointment routes
        .route(
            "/api/appointments",
            get(handlers::list_appointments).post(handlers::create_appointment),
        )
        .route(
            "/api/appointments/:id",
            get(handlers::get_appointment)
                .put(handlers::update_appointment)
                .delete(handlers::delete_appointment),
        )
        .route(
            "/api/appointments/:id/calendar",
            get(handlers::get_appointment_calendar),
        )
        .route(
            "/api/appointments/:id/resync",
            post(handlers::resync_appointment),
        )
        // Staff calendar routes
        .route("/api/staff/calendars", get(handlers::list_staff_calendars))
        .route(
            "/api/staff/:id/calendar/toggle",
            post(handlers::toggle_staff_sync),
        )
        .route(
            "/api/staff/:id/calendar",
            axum::routing::delete(handlers::disconnect_staff_calendar),
        )
        .layer(build_cors_layer(cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Build CORS layer from the configured origin list.
///
/// If CORS_ALLOWED_ORIGINS is set, only those origins are allowed.
/// If not set, defaults to permissive CORS (for development only).
fn build_cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    match allowed_origins {
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                tracing::warn!(
                    "CORS_ALLOWED_ORIGINS is set but empty, using permissive CORS (not recommended for production)"
                );
                CorsLayer::permissive()
            } else {
                tracing::info!("CORS configured for origins: {:?}", origins);
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PUT,
                        Method::DELETE,
                        Method::OPTIONS,
                    ])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                    .allow_credentials(true)
            }
        }
        None => {
            tracing::warn!(
                "CORS_ALLOWED_ORIGINS not set, using permissive CORS (not recommended for production)"
            );
            CorsLayer::permissive()
        }
    }
}
